// SPDX-License-Identifier: MIT

//! Section segmentation
//!
//! Splits cleaned document text into labelled, contiguous sections by
//! recognising heading lines. Section spans tile the input exactly:
//! concatenating every section's text in order gives back the input.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of a document section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    PersonalInfo,
    Summary,
    Education,
    WorkExperience,
    Skills,
    Projects,
    Certificates,
    Interests,
    Other,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersonalInfo => "personal_info",
            Self::Summary => "summary",
            Self::Education => "education",
            Self::WorkExperience => "work_experience",
            Self::Skills => "skills",
            Self::Projects => "projects",
            Self::Certificates => "certificates",
            Self::Interests => "interests",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labelled contiguous slice of the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    /// Heading line as written, if the section started at one
    pub heading: Option<String>,
    /// Byte offsets into the segmented text, end exclusive
    pub span: (usize, usize),
    pub order: usize,
    pub text: String,
}

impl Section {
    pub fn len(&self) -> usize {
        self.span.1 - self.span.0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length in characters, the unit every configured budget uses
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

const HEADINGS: &[(SectionKind, &[&str])] = &[
    (
        SectionKind::PersonalInfo,
        &[
            "contact",
            "contacts",
            "contact information",
            "contact details",
            "personal information",
            "personal details",
            "personal info",
        ],
    ),
    (
        SectionKind::Summary,
        &[
            "summary",
            "profile",
            "professional summary",
            "career summary",
            "about",
            "about me",
            "objective",
            "career objective",
        ],
    ),
    (
        SectionKind::Education,
        &[
            "education",
            "academic background",
            "academic history",
            "education and training",
            "qualifications",
        ],
    ),
    (
        SectionKind::WorkExperience,
        &[
            "experience",
            "work experience",
            "professional experience",
            "employment",
            "employment history",
            "work history",
            "career history",
        ],
    ),
    (
        SectionKind::Skills,
        &[
            "skills",
            "technical skills",
            "core skills",
            "key skills",
            "competencies",
            "core competencies",
            "skills and tools",
            "technologies",
        ],
    ),
    (
        SectionKind::Projects,
        &[
            "projects",
            "personal projects",
            "selected projects",
            "key projects",
            "side projects",
        ],
    ),
    (
        SectionKind::Certificates,
        &[
            "certificates",
            "certifications",
            "certifications and courses",
            "courses",
            "licenses",
            "licenses and certifications",
        ],
    ),
    (
        SectionKind::Interests,
        &["interests", "hobbies", "hobbies and interests", "activities"],
    ),
    (
        SectionKind::Other,
        &[
            "languages",
            "awards",
            "honors",
            "publications",
            "references",
            "volunteering",
            "volunteer experience",
        ],
    ),
];

static HEADING_DECORATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[#=*\-\s]*(?P<title>[^:#=*]+?)[\s:#=*\-]*$").unwrap());

/// Heading-based section segmenter
#[derive(Debug, Clone)]
pub struct SectionSegmenter {
    /// Lines longer than this are never treated as headings
    max_heading_chars: usize,
}

impl Default for SectionSegmenter {
    fn default() -> Self {
        Self {
            max_heading_chars: 48,
        }
    }
}

impl SectionSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a single line as a heading, if it is one.
    ///
    /// A line counts when, ignoring markdown/underline decoration and case,
    /// it equals a known heading, or it is `Heading: inline content`.
    pub fn classify_heading(&self, line: &str) -> Option<SectionKind> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let candidate = match line.split_once(':') {
            Some((head, _)) => head,
            None if line.chars().count() <= self.max_heading_chars => line,
            None => return None,
        };

        let title = HEADING_DECORATION
            .captures(candidate)
            .and_then(|c| c.name("title"))
            .map(|m| m.as_str())?;
        let normalised = title
            .to_lowercase()
            .replace('&', "and")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        HEADINGS
            .iter()
            .find(|(_, names)| names.contains(&normalised.as_str()))
            .map(|(kind, _)| *kind)
    }

    /// Split text into sections.
    ///
    /// Text before the first heading becomes a `personal_info` section; if it
    /// is only whitespace it is folded into the first heading's section.
    pub fn segment(&self, text: &str) -> Vec<Section> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut boundaries: Vec<(usize, Option<(SectionKind, String)>)> = Vec::new();
        let mut offset = 0;
        for line in text.split_inclusive('\n') {
            let trimmed = line.trim_end_matches('\n');
            if let Some(kind) = self.classify_heading(trimmed) {
                boundaries.push((offset, Some((kind, trimmed.trim().to_string()))));
            }
            offset += line.len();
        }

        match boundaries.first().map(|(start, _)| *start) {
            None => boundaries.push((0, None)),
            Some(first) if first > 0 => {
                if text[..first].trim().is_empty() {
                    boundaries[0].0 = 0;
                } else {
                    boundaries.insert(0, (0, None));
                }
            }
            Some(_) => {}
        }

        let mut sections = Vec::with_capacity(boundaries.len());
        for (order, (start, label)) in boundaries.iter().enumerate() {
            let end = boundaries
                .get(order + 1)
                .map(|(next, _)| *next)
                .unwrap_or(text.len());
            let (kind, heading) = match label {
                Some((kind, heading)) => (*kind, Some(heading.clone())),
                None => (SectionKind::PersonalInfo, None),
            };
            sections.push(Section {
                kind,
                heading,
                span: (*start, end),
                order,
                text: text[*start..end].to_string(),
            });
        }

        log::debug!(
            "Segmented {} chars into {} sections: {:?}",
            text.len(),
            sections.len(),
            sections.iter().map(|s| s.kind).collect::<Vec<_>>()
        );
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CV: &str = "Jane Doe\njane@example.com\n\nEducation\nMIT, BSc Computer Science, 2019\n\n## Work Experience\nAcme Corp - Engineer (2019-2023)\nBuilt things\n\nSKILLS:\nRust, Go, SQL\n\nHobbies\nChess";

    #[test]
    fn test_classify_heading_variants() {
        let seg = SectionSegmenter::new();
        assert_eq!(seg.classify_heading("EDUCATION"), Some(SectionKind::Education));
        assert_eq!(
            seg.classify_heading("## Work Experience"),
            Some(SectionKind::WorkExperience)
        );
        assert_eq!(seg.classify_heading("Skills:"), Some(SectionKind::Skills));
        assert_eq!(
            seg.classify_heading("Skills: Rust, Go"),
            Some(SectionKind::Skills)
        );
        assert_eq!(
            seg.classify_heading("Skills & Tools"),
            Some(SectionKind::Skills)
        );
        assert_eq!(
            seg.classify_heading("=== Certifications ==="),
            Some(SectionKind::Certificates)
        );
        assert_eq!(seg.classify_heading("Languages"), Some(SectionKind::Other));
        assert_eq!(seg.classify_heading("Built a distributed cache"), None);
        assert_eq!(seg.classify_heading(""), None);
    }

    #[test]
    fn test_segment_labels_in_order() {
        let sections = SectionSegmenter::new().segment(CV);
        let kinds: Vec<SectionKind> = sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::PersonalInfo,
                SectionKind::Education,
                SectionKind::WorkExperience,
                SectionKind::Skills,
                SectionKind::Interests,
            ]
        );
        for (i, section) in sections.iter().enumerate() {
            assert_eq!(section.order, i);
        }
        assert_eq!(sections[1].heading.as_deref(), Some("Education"));
        assert!(sections[1].text.starts_with("Education\nMIT"));
    }

    #[test]
    fn test_segments_concatenate_to_input() {
        let seg = SectionSegmenter::new();
        let inputs = [
            CV,
            "",
            "no headings at all\njust text",
            "\n\nEducation\nMIT",
            "Skills\nRust\nSkills\nGo",
            "Education",
        ];
        for input in inputs {
            let sections = seg.segment(input);
            let joined: String = sections.iter().map(|s| s.text.as_str()).collect();
            assert_eq!(joined, input);

            let mut cursor = 0;
            for section in &sections {
                assert_eq!(section.span.0, cursor);
                cursor = section.span.1;
            }
            assert_eq!(cursor, input.len());
        }
    }

    #[test]
    fn test_whitespace_preamble_folds_into_first_section() {
        let sections = SectionSegmenter::new().segment("\n\nEducation\nMIT");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].kind, SectionKind::Education);
        assert_eq!(sections[0].span, (0, 15));
    }

    #[test]
    fn test_no_headings_is_single_personal_section() {
        let sections = SectionSegmenter::new().segment("Jane Doe\nEngineer");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].kind, SectionKind::PersonalInfo);
        assert!(sections[0].heading.is_none());
    }
}
