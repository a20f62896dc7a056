// SPDX-License-Identifier: MIT

//! Result aggregation - folds per-section outputs into one [`AnalysisResult`]

use serde::{Deserialize, Serialize};

use super::schema::{
    CertificateEntry, EducationEntry, ExperienceEntry, ExtractionItem, InferredCharacteristic,
    InterestEntry, JobAlignment, PersonalInfo, ProjectEntry, SkillEntry,
};
use super::state::WorkflowState;
use crate::adk::usage::UsageSummary;
use crate::cvsense::document::SectionKind;

/// Section kept as text because no contract applies to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeTextSection {
    pub kind: SectionKind,
    pub heading: Option<String>,
    pub text: String,
}

/// Terminal aggregate of one workflow run. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub run_id: String,
    pub source_ref: Option<String>,
    pub personal_info: PersonalInfo,
    pub education: Vec<EducationEntry>,
    pub experience: Vec<ExperienceEntry>,
    pub skills: Vec<SkillEntry>,
    pub projects: Vec<ProjectEntry>,
    pub certificates: Vec<CertificateEntry>,
    pub interests: Vec<InterestEntry>,
    pub other_sections: Vec<FreeTextSection>,
    pub characteristics: Vec<InferredCharacteristic>,
    pub summary: Option<String>,
    pub keywords: Vec<String>,
    pub job_alignment: Option<JobAlignment>,
    pub low_confidence_sections: Vec<SectionKind>,
    pub usage: UsageSummary,
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    let blank = slot.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true);
    if blank {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            *slot = Some(v);
        }
    }
}

/// Merge contact details; the first non-empty value of each field wins
fn merge_personal(target: &mut PersonalInfo, info: PersonalInfo) {
    fill(&mut target.full_name, info.full_name);
    fill(&mut target.email, info.email);
    fill(&mut target.phone_number, info.phone_number);
    fill(&mut target.linkedin_url, info.linkedin_url);
    fill(&mut target.github_url, info.github_url);
    fill(&mut target.portfolio_url, info.portfolio_url);
    fill(&mut target.address, info.address);
    for url in info.other_urls {
        if !target.other_urls.contains(&url) {
            target.other_urls.push(url);
        }
    }
}

/// Build the result from everything the run produced so far.
///
/// Items are taken in section order, list fields concatenate, and usage is
/// the run meter's summary at this point.
pub fn aggregate(state: &WorkflowState) -> AnalysisResult {
    let mut result = AnalysisResult {
        run_id: state.run_id().to_string(),
        source_ref: state.request().source_ref.clone(),
        ..Default::default()
    };

    for extraction in state.extractions() {
        for item in &extraction.items {
            match item.clone() {
                ExtractionItem::PersonalInfo(info) => merge_personal(&mut result.personal_info, info),
                ExtractionItem::Education(e) => result.education.push(e),
                ExtractionItem::Experience(e) => result.experience.push(e),
                ExtractionItem::Skill(s) => result.skills.push(s),
                ExtractionItem::Project(p) => result.projects.push(p),
                ExtractionItem::Certificate(c) => result.certificates.push(c),
                ExtractionItem::Interest(i) => result.interests.push(i),
            }
        }
    }

    result.other_sections = state
        .sections()
        .iter()
        .filter(|s| matches!(s.kind, SectionKind::Summary | SectionKind::Other))
        .map(|s| FreeTextSection {
            kind: s.kind,
            heading: s.heading.clone(),
            text: s.text.trim().to_string(),
        })
        .collect();

    if let Some(inference) = state.inference() {
        result.characteristics = inference.characteristics.clone();
        result.summary = inference.summary.clone().filter(|s| !s.trim().is_empty());
        result.keywords = inference.keywords.clone();
        result.job_alignment = inference.job_alignment.clone();
    }

    result.low_confidence_sections = state.low_confidence_sections();
    result.usage = state.usage().summary();
    result
}
