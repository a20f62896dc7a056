// SPDX-License-Identifier: MIT

//! Workflow state threaded through one extraction run
//!
//! A [`WorkflowState`] is owned by exactly one run. Each node writes only
//! its own fields through the setters below; earlier contributions are
//! never overwritten and the error trail only grows.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::aggregate::AnalysisResult;
use super::schema::{ExtractionItem, InferenceOutput};
use crate::adk::trail::{ErrorEntry, ErrorTrail};
use crate::adk::usage::UsageMeter;
use crate::cvsense::document::{Section, SectionKind};

/// Immutable input to a workflow run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub document_text: String,
    #[serde(default)]
    pub source_ref: Option<String>,
    /// Optional job description to align the candidate against
    #[serde(default)]
    pub job_description: Option<String>,
}

impl AnalysisRequest {
    pub fn new(document_text: impl Into<String>) -> Self {
        Self {
            document_text: document_text.into(),
            ..Default::default()
        }
    }

    pub fn with_source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    pub fn with_job_description(mut self, job_description: impl Into<String>) -> Self {
        self.job_description = Some(job_description.into());
        self
    }
}

/// Extraction route chosen after segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionRoute {
    Direct,
    ChunkAndMerge,
}

/// States of the extraction graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    InputReceived,
    Segmented,
    Extracting(ExtractionRoute),
    Inferring,
    Aggregated,
    Done,
    Failed,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InputReceived => "input_received",
            Self::Segmented => "segmented",
            Self::Extracting(_) => "extracting",
            Self::Inferring => "inferring",
            Self::Aggregated => "aggregated",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Validated output for one section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionExtraction {
    pub order: usize,
    pub kind: SectionKind,
    pub items: Vec<ExtractionItem>,
    /// Output could not be validated; items are empty or partial
    pub low_confidence: bool,
    pub attempts: u32,
}

/// Mutable context of one run
#[derive(Debug)]
pub struct WorkflowState {
    run_id: String,
    request: AnalysisRequest,
    text: String,
    sections: Vec<Section>,
    extractions: BTreeMap<usize, SectionExtraction>,
    inference: Option<InferenceOutput>,
    usage: UsageMeter,
    errors: ErrorTrail,
    retries: HashMap<String, u32>,
    visited: Vec<&'static str>,
    result: Option<AnalysisResult>,
}

impl WorkflowState {
    pub fn new(run_id: impl Into<String>, request: AnalysisRequest) -> Self {
        Self {
            run_id: run_id.into(),
            request,
            text: String::new(),
            sections: Vec::new(),
            extractions: BTreeMap::new(),
            inference: None,
            usage: UsageMeter::new(),
            errors: ErrorTrail::new(),
            retries: HashMap::new(),
            visited: Vec::new(),
            result: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn request(&self) -> &AnalysisRequest {
        &self.request
    }

    /// Cleaned document text the sections index into
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: String) {
        self.text = text;
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn set_sections(&mut self, sections: Vec<Section>) {
        self.sections = sections;
    }

    /// Per-section results in section order
    pub fn extractions(&self) -> impl Iterator<Item = &SectionExtraction> {
        self.extractions.values()
    }

    pub fn extraction(&self, order: usize) -> Option<&SectionExtraction> {
        self.extractions.get(&order)
    }

    /// First write wins; a section is extracted at most once per run
    pub fn insert_extraction(&mut self, extraction: SectionExtraction) {
        self.extractions
            .entry(extraction.order)
            .or_insert(extraction);
    }

    pub fn low_confidence_sections(&self) -> Vec<SectionKind> {
        self.extractions
            .values()
            .filter(|e| e.low_confidence)
            .map(|e| e.kind)
            .collect()
    }

    pub fn inference(&self) -> Option<&InferenceOutput> {
        self.inference.as_ref()
    }

    pub fn set_inference(&mut self, inference: InferenceOutput) {
        self.inference = Some(inference);
    }

    pub fn usage(&self) -> &UsageMeter {
        &self.usage
    }

    pub fn usage_mut(&mut self) -> &mut UsageMeter {
        &mut self.usage
    }

    pub fn errors(&self) -> &ErrorTrail {
        &self.errors
    }

    pub fn record_error(&mut self, entry: ErrorEntry) {
        self.errors.record(entry);
    }

    pub fn errors_mut(&mut self) -> &mut ErrorTrail {
        &mut self.errors
    }

    /// Remember how many retries a node call used
    pub fn note_retries(&mut self, node: impl Into<String>, attempts: u32) {
        let retries = attempts.saturating_sub(1);
        if retries > 0 {
            *self.retries.entry(node.into()).or_insert(0) += retries;
        }
    }

    pub fn retries(&self) -> &HashMap<String, u32> {
        &self.retries
    }

    pub fn visit(&mut self, stage: Stage) {
        self.visited.push(stage.name());
    }

    pub fn visited(&self) -> &[&'static str] {
        &self.visited
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn set_result(&mut self, result: AnalysisResult) {
        self.result = Some(result);
    }

    pub fn take_result(&mut self) -> Option<AnalysisResult> {
        self.result.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::PipelineError;

    fn extraction(order: usize, low_confidence: bool) -> SectionExtraction {
        SectionExtraction {
            order,
            kind: SectionKind::Skills,
            items: Vec::new(),
            low_confidence,
            attempts: 1,
        }
    }

    #[test]
    fn test_extraction_first_write_wins() {
        let mut state = WorkflowState::new("run", AnalysisRequest::new("text"));
        state.insert_extraction(extraction(1, false));
        state.insert_extraction(extraction(1, true));
        assert!(!state.extraction(1).unwrap().low_confidence);
    }

    #[test]
    fn test_extractions_iterate_in_section_order() {
        let mut state = WorkflowState::new("run", AnalysisRequest::new("text"));
        state.insert_extraction(extraction(3, true));
        state.insert_extraction(extraction(0, false));
        let orders: Vec<usize> = state.extractions().map(|e| e.order).collect();
        assert_eq!(orders, vec![0, 3]);
        assert_eq!(state.low_confidence_sections(), vec![SectionKind::Skills]);
    }

    #[test]
    fn test_retries_accumulate() {
        let mut state = WorkflowState::new("run", AnalysisRequest::new("text"));
        state.note_retries("extracting:skills", 1);
        state.note_retries("extracting:skills", 3);
        assert_eq!(state.retries().get("extracting:skills"), Some(&2));
    }

    #[test]
    fn test_errors_survive_later_writes() {
        let mut state = WorkflowState::new("run", AnalysisRequest::new("text"));
        state.errors_mut().record_error(
            "extracting",
            None,
            &PipelineError::SchemaValidation("bad".into()),
            3,
        );
        state.set_inference(InferenceOutput::default());
        assert_eq!(state.errors().len(), 1);
    }
}
