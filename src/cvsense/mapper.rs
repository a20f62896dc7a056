// SPDX-License-Identifier: MIT

//! Mapper from [`AnalysisResult`] to the storage/API-facing [`ExternalRecord`]
//!
//! The mapping is one-way and total: every well-formed result maps to a
//! record, with absent fields falling back to empty strings, empty lists
//! or `None`.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cvsense::document::SectionKind;
use crate::cvsense::workflow::AnalysisResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalEducation {
    pub degree: String,
    pub institution: String,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalExperience {
    pub title: String,
    pub company: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Responsibilities joined with "; "
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalProject {
    pub title: String,
    pub tech_stack: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalCertification {
    pub name: String,
    pub issuer: Option<String>,
    pub time_period: Option<NaiveDate>,
    pub description: Option<String>,
}

/// Flattened CV record as stored and served
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalRecord {
    pub source_ref: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub summary: Option<String>,
    pub education: Vec<ExternalEducation>,
    pub experience: Vec<ExternalExperience>,
    pub skills: Vec<String>,
    pub projects: Vec<ExternalProject>,
    pub certifications: Vec<ExternalCertification>,
    pub interests: Vec<String>,
    pub keywords: Vec<String>,
    pub job_alignment_score: Option<u32>,
}

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

const ONGOING: &[&str] = &["present", "current", "now", "ongoing", "today"];

/// Parse the date shapes CVs commonly use. Unknown shapes give `None`.
pub fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?.trim();
    if value.is_empty() || ONGOING.contains(&value.to_lowercase().as_str()) {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("01/{}", value), "%d/%m/%Y") {
        return Some(date);
    }
    for format in ["%d %b %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("1 {}", value), format) {
            return Some(date);
        }
    }
    if value.len() == 4 {
        if let Ok(year) = value.parse::<i32>() {
            return NaiveDate::from_ymd_opt(year, 1, 1);
        }
    }
    None
}

/// Year of a date string, falling back to the first plausible year in it
pub fn extract_year(value: Option<&str>) -> Option<i32> {
    if let Some(date) = parse_date(value) {
        return Some(date.year());
    }
    YEAR.find(value?).and_then(|m| m.as_str().parse().ok())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn to_external(result: &AnalysisResult) -> ExternalRecord {
    let info = &result.personal_info;

    // inferred summary first, then the CV's own summary section
    let summary = non_blank(&result.summary).or_else(|| {
        result
            .other_sections
            .iter()
            .find(|s| s.kind == SectionKind::Summary && !s.text.trim().is_empty())
            .map(|s| s.text.trim().to_string())
    });

    ExternalRecord {
        source_ref: result.source_ref.clone(),
        name: non_blank(&info.full_name).unwrap_or_default(),
        email: non_blank(&info.email).unwrap_or_default(),
        phone: non_blank(&info.phone_number),
        summary,
        education: result
            .education
            .iter()
            .map(|e| ExternalEducation {
                degree: non_blank(&e.degree_name).unwrap_or_default(),
                institution: e.institution_name.trim().to_string(),
                start_year: extract_year(e.graduation_date.as_deref()),
                end_year: extract_year(e.graduation_date.as_deref()),
                description: non_blank(&e.description),
            })
            .collect(),
        experience: result
            .experience
            .iter()
            .map(|w| ExternalExperience {
                title: w.job_title.trim().to_string(),
                company: w.company_name.trim().to_string(),
                start_date: parse_date(w.start_date.as_deref()),
                end_date: parse_date(w.end_date.as_deref()),
                description: if w.responsibilities_achievements.is_empty() {
                    None
                } else {
                    Some(w.responsibilities_achievements.join("; "))
                },
            })
            .collect(),
        skills: result
            .skills
            .iter()
            .map(|s| s.skill_name.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        projects: result
            .projects
            .iter()
            .map(|p| ExternalProject {
                title: p.project_name.trim().to_string(),
                tech_stack: p.technologies_used.clone(),
                description: non_blank(&p.description),
            })
            .collect(),
        certifications: result
            .certificates
            .iter()
            .map(|c| ExternalCertification {
                name: c.certificate_name.trim().to_string(),
                issuer: non_blank(&c.issuing_organization),
                time_period: parse_date(c.issue_date.as_deref()),
                description: None,
            })
            .collect(),
        interests: result
            .interests
            .iter()
            .map(|i| i.interest_name.trim().to_string())
            .collect(),
        keywords: result.keywords.clone(),
        job_alignment_score: result.job_alignment.as_ref().map(|a| a.score),
    }
}
