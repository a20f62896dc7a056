// SPDX-License-Identifier: MIT

//! Prompt builders for extraction and inference calls

use crate::cvsense::document::SectionKind;

pub const EXTRACTION_SYSTEM: &str = "You extract structured data from one section of a CV. \
Use only facts stated in the text. Leave optional fields null when the text does not state them. \
Never invent values. Answer with JSON only.";

pub const INFERENCE_SYSTEM: &str = "You analyse structured CV data and infer higher-level \
characteristics such as soft skills, seniority, work style and role fit. Every characteristic \
must cite evidence from the data. Answer with JSON only.";

fn section_focus(kind: SectionKind) -> &'static str {
    match kind {
        SectionKind::PersonalInfo => {
            "Extract the candidate's contact details as a single item: name, email, phone, profile URLs and address."
        }
        SectionKind::Education => {
            "Extract one item per degree, diploma or school attended."
        }
        SectionKind::WorkExperience => {
            "Extract one item per position held, with responsibilities and achievements as separate list entries."
        }
        SectionKind::Skills => {
            "Extract one item per distinct skill, tool or language, with a category where evident."
        }
        SectionKind::Projects => "Extract one item per project.",
        SectionKind::Certificates => "Extract one item per certificate, licence or course.",
        SectionKind::Interests => "Extract one item per interest or hobby.",
        SectionKind::Summary | SectionKind::Other => "Extract nothing.",
    }
}

pub fn extraction_prompt(kind: SectionKind, section_text: &str) -> String {
    format!(
        "Section type: {}\n{}\nReturn an object of the form {{\"items\": [...]}}.\n\n--- SECTION ---\n{}\n--- END ---",
        kind,
        section_focus(kind),
        section_text
    )
}

pub fn inference_prompt(extracted_json: &str, job_description: Option<&str>) -> String {
    let mut prompt = format!(
        "Structured CV data:\n{}\n\nInfer the candidate's characteristics, write a two or three sentence summary, \
and list up to 15 keywords.",
        extracted_json
    );
    if let Some(jd) = job_description {
        prompt.push_str(&format!(
            "\n\nAlso fill job_alignment with a 0-100 score against this job description, the skills it asks for \
that the candidate has, and those the candidate lacks:\n{}",
            jd
        ));
    } else {
        prompt.push_str("\n\nLeave job_alignment null.");
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_prompt_names_section() {
        let prompt = extraction_prompt(SectionKind::Skills, "Rust, Go");
        assert!(prompt.starts_with("Section type: skills"));
        assert!(prompt.contains("Rust, Go"));
    }

    #[test]
    fn test_inference_prompt_job_description() {
        assert!(inference_prompt("{}", None).contains("job_alignment null"));
        assert!(inference_prompt("{}", Some("Senior Rust engineer")).contains("Senior Rust engineer"));
    }
}
