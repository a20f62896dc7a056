// SPDX-License-Identifier: MIT

//! Workflow engine - CV extraction as an explicit state machine
//!
//! ```text
//! input_received -> segmented -> extracting(direct | chunk_and_merge)
//!                -> inferring -> aggregated -> done
//! ```
//!
//! Each call to [`WorkflowEngine::step`] runs the node that leaves the
//! current state and returns the next one. Fatal errors move to `failed`;
//! recoverable ones are recorded in the state's error trail and the run
//! continues with a partial result.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::aggregate::{aggregate, AnalysisResult};
use super::extractor::StructuredExtractor;
use super::prompts::{inference_prompt, INFERENCE_SYSTEM};
use super::schema::{inference_schema, validate_inference, ExtractionItem, SchemaContract};
use super::state::{AnalysisRequest, ExtractionRoute, SectionExtraction, Stage, WorkflowState};
use crate::adk::cancel::CancellationFlag;
use crate::adk::client::{LlmClient, ValidatedCallError};
use crate::adk::error::PipelineError;
use crate::adk::trail::{ErrorEntry, ErrorKind, RunStatus};
use crate::adk::usage::UsageSummary;
use crate::cvsense::config::WorkflowConfig;
use crate::cvsense::document::{clean_text, Section, SectionSegmenter, TextExtractor};

/// What a workflow run hands back to its caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub run_id: String,
    pub status: RunStatus,
    pub result: Option<AnalysisResult>,
    pub errors: Vec<ErrorEntry>,
    pub usage: UsageSummary,
    /// States visited, in order
    pub stages: Vec<String>,
}

/// Runs the extraction graph
pub struct WorkflowEngine {
    client: LlmClient,
    config: WorkflowConfig,
    segmenter: SectionSegmenter,
    extractor: StructuredExtractor,
    text_extractor: Arc<dyn TextExtractor>,
}

impl WorkflowEngine {
    pub fn new(
        client: LlmClient,
        config: WorkflowConfig,
        text_extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        let extractor = StructuredExtractor::new(client.clone(), config.retry_policy());
        Self {
            client,
            config,
            segmenter: SectionSegmenter::new(),
            extractor,
            text_extractor,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Reject input the graph must never see
    fn check_input(&self, request: &AnalysisRequest) -> Result<(), PipelineError> {
        if request.document_text.trim().is_empty() {
            return Err(PipelineError::Input("document text is empty".into()));
        }
        let chars = request.document_text.chars().count();
        if chars > self.config.max_input_chars {
            return Err(PipelineError::Input(format!(
                "document has {} characters, limit is {}",
                chars, self.config.max_input_chars
            )));
        }
        Ok(())
    }

    /// Analyse already-extracted text
    pub async fn run(
        &self,
        request: AnalysisRequest,
        cancel: &CancellationFlag,
    ) -> Result<AnalysisOutcome, PipelineError> {
        self.check_input(&request)?;
        let run_id = uuid::Uuid::new_v4().to_string();
        let state = WorkflowState::new(run_id, request);
        Ok(self.drive(state, cancel).await)
    }

    /// Extract text from document bytes, then analyse it.
    ///
    /// A document that yields no text ends the run as `failed` with an
    /// extraction entry rather than an `Err`.
    pub async fn run_document(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
        job_description: Option<String>,
        cancel: &CancellationFlag,
    ) -> Result<AnalysisOutcome, PipelineError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut request = AnalysisRequest {
            document_text: String::new(),
            source_ref: file_name.map(str::to_string),
            job_description,
        };

        match self.text_extractor.extract_text(bytes, file_name) {
            Ok(text) => {
                request.document_text = text;
                self.check_input(&request)?;
                let state = WorkflowState::new(run_id, request);
                Ok(self.drive(state, cancel).await)
            }
            Err(err) => {
                log::error!("Workflow {} text extraction failed: {}", run_id, err);
                let mut state = WorkflowState::new(run_id, request);
                state.visit(Stage::InputReceived);
                state.errors_mut().record_error(
                    Stage::InputReceived.name(),
                    file_name.map(str::to_string),
                    &PipelineError::Extraction(err.to_string()),
                    1,
                );
                state.visit(Stage::Failed);
                Ok(Self::finish(state, Stage::Failed))
            }
        }
    }

    async fn drive(&self, mut state: WorkflowState, cancel: &CancellationFlag) -> AnalysisOutcome {
        let mut stage = Stage::InputReceived;
        log::info!("Workflow {} started", state.run_id());

        while !stage.is_terminal() {
            state.visit(stage);
            if cancel.is_cancelled() {
                state.errors_mut().record_error(
                    stage.name(),
                    None,
                    &PipelineError::Cancelled(stage.name().to_string()),
                    0,
                );
                stage = Stage::Failed;
                break;
            }
            log::info!("Workflow {} stage {}", state.run_id(), stage.name());
            stage = self.step(stage, &mut state, cancel).await;
        }
        state.visit(stage);

        Self::finish(state, stage)
    }

    /// Run the node that leaves `stage`
    pub async fn step(
        &self,
        stage: Stage,
        state: &mut WorkflowState,
        cancel: &CancellationFlag,
    ) -> Stage {
        match stage {
            Stage::InputReceived => self.segment(state),
            Stage::Segmented => self.route(state),
            Stage::Extracting(route) => self.extract_sections(route, state, cancel).await,
            Stage::Inferring => self.infer(state).await,
            Stage::Aggregated => {
                let result = aggregate(state);
                state.set_result(result);
                Stage::Done
            }
            Stage::Done | Stage::Failed => stage,
        }
    }

    fn segment(&self, state: &mut WorkflowState) -> Stage {
        let text = clean_text(&state.request().document_text);
        if text.is_empty() {
            state.errors_mut().record_error(
                Stage::InputReceived.name(),
                None,
                &PipelineError::Extraction("document has no readable text".into()),
                1,
            );
            return Stage::Failed;
        }
        let sections = self.segmenter.segment(&text);
        state.set_text(text);
        state.set_sections(sections);
        Stage::Segmented
    }

    /// Enforce the section cap and choose the extraction route
    fn route(&self, state: &mut WorkflowState) -> Stage {
        let total = state.sections().len();
        if total > self.config.max_sections {
            state.errors_mut().record_error(
                Stage::Segmented.name(),
                None,
                &PipelineError::BudgetExceeded(format!(
                    "{} sections found, only the first {} are extracted",
                    total, self.config.max_sections
                )),
                0,
            );
        }

        let threshold = self.config.chunk.threshold_chars;
        let oversized = self
            .budgeted_sections(state)
            .iter()
            .any(|s| SchemaContract::for_section(s.kind).is_some() && s.char_count() > threshold);

        let route = if oversized {
            ExtractionRoute::ChunkAndMerge
        } else {
            ExtractionRoute::Direct
        };
        log::debug!("Workflow {} route {:?}", state.run_id(), route);
        Stage::Extracting(route)
    }

    fn budgeted_sections(&self, state: &WorkflowState) -> Vec<Section> {
        state
            .sections()
            .iter()
            .take(self.config.max_sections)
            .cloned()
            .collect()
    }

    fn token_budget_spent(&self, state: &WorkflowState) -> bool {
        self.config
            .max_total_tokens
            .is_some_and(|limit| state.usage().total_tokens() >= limit)
    }

    async fn extract_sections(
        &self,
        route: ExtractionRoute,
        state: &mut WorkflowState,
        cancel: &CancellationFlag,
    ) -> Stage {
        let stage_name = Stage::Extracting(route).name();

        for section in self.budgeted_sections(state) {
            let Some(contract) = SchemaContract::for_section(section.kind) else {
                continue;
            };

            if cancel.is_cancelled() {
                state.errors_mut().record_error(
                    stage_name,
                    Some(section.kind.to_string()),
                    &PipelineError::Cancelled(format!("section {}", section.order)),
                    0,
                );
                return Stage::Failed;
            }

            if self.token_budget_spent(state) {
                state.errors_mut().record_error(
                    stage_name,
                    Some(section.kind.to_string()),
                    &PipelineError::BudgetExceeded(format!(
                        "token budget of {} spent before section {}",
                        self.config.max_total_tokens.unwrap_or_default(),
                        section.order
                    )),
                    0,
                );
                return Stage::Aggregated;
            }

            let chunked = route == ExtractionRoute::ChunkAndMerge
                && section.char_count() > self.config.chunk.threshold_chars;
            let extraction = if chunked {
                self.extract_chunked(&section, contract, state).await
            } else {
                self.extract_direct(&section, contract, state).await
            };

            state.note_retries(
                format!("{}:{}#{}", stage_name, section.kind, section.order),
                extraction.attempts,
            );
            state.insert_extraction(extraction);
        }

        if self.config.infer_characteristics {
            Stage::Inferring
        } else {
            Stage::Aggregated
        }
    }

    async fn extract_direct(
        &self,
        section: &Section,
        contract: &SchemaContract,
        state: &mut WorkflowState,
    ) -> SectionExtraction {
        match self
            .extractor
            .extract(&section.text, contract, state.usage_mut())
            .await
        {
            Ok(extracted) => SectionExtraction {
                order: section.order,
                kind: section.kind,
                items: extracted.items,
                low_confidence: false,
                attempts: extracted.attempts,
            },
            Err(err) => {
                let attempts = err.attempts();
                record_call_failure(state, section, err);
                SectionExtraction {
                    order: section.order,
                    kind: section.kind,
                    items: Vec::new(),
                    low_confidence: true,
                    attempts,
                }
            }
        }
    }

    async fn extract_chunked(
        &self,
        section: &Section,
        contract: &SchemaContract,
        state: &mut WorkflowState,
    ) -> SectionExtraction {
        let outcome = self
            .extractor
            .extract_chunked(
                &section.text,
                contract,
                self.config.chunk.chunk_chars,
                self.config.chunk.merge,
                state.usage_mut(),
            )
            .await;

        let low_confidence = !outcome.failures.is_empty();
        if low_confidence {
            let failed: Vec<String> = outcome
                .failures
                .iter()
                .map(|(index, err)| format!("chunk {}: {}", index, err))
                .collect();
            let kind = if outcome
                .failures
                .iter()
                .all(|(_, e)| matches!(e, ValidatedCallError::Schema { .. }))
            {
                ErrorKind::SchemaValidation
            } else {
                ErrorKind::ModelCall
            };
            state.record_error(ErrorEntry {
                kind,
                stage: Stage::Extracting(ExtractionRoute::ChunkAndMerge)
                    .name()
                    .to_string(),
                scope: Some(section.kind.to_string()),
                message: format!(
                    "{} of {} chunks failed: {}",
                    outcome.failures.len(),
                    outcome.chunks,
                    failed.join("; ")
                ),
                attempts: outcome.attempts,
            });
        }

        SectionExtraction {
            order: section.order,
            kind: section.kind,
            items: outcome.items,
            low_confidence,
            attempts: outcome.attempts,
        }
    }

    /// Non-critical: failure is recorded and aggregation proceeds without it
    async fn infer(&self, state: &mut WorkflowState) -> Stage {
        let items: Vec<&ExtractionItem> = state.extractions().flat_map(|e| &e.items).collect();
        if items.is_empty() {
            log::info!(
                "Workflow {} has no extracted items, skipping inference",
                state.run_id()
            );
            return Stage::Aggregated;
        }

        let extracted_json = serde_json::to_string_pretty(&items).unwrap_or_default();
        let prompt = inference_prompt(
            &extracted_json,
            state.request().job_description.as_deref(),
        );

        let outcome = self
            .client
            .invoke_validated(
                Stage::Inferring.name(),
                INFERENCE_SYSTEM,
                &prompt,
                inference_schema(),
                self.config.retry_policy(),
                state.usage_mut(),
                validate_inference,
            )
            .await;

        match outcome {
            Ok((inference, attempts)) => {
                state.note_retries(Stage::Inferring.name(), attempts);
                state.set_inference(inference);
            }
            Err(err) => {
                state.note_retries(Stage::Inferring.name(), err.attempts());
                let entry = call_failure_entry(Stage::Inferring.name(), None, err);
                state.record_error(entry);
            }
        }
        Stage::Aggregated
    }

    fn finish(mut state: WorkflowState, stage: Stage) -> AnalysisOutcome {
        let status = if stage == Stage::Failed || state.errors().has_fatal() {
            RunStatus::Failed
        } else if !state.errors().is_empty() || !state.low_confidence_sections().is_empty() {
            RunStatus::Partial
        } else {
            RunStatus::Complete
        };

        let result = match status {
            RunStatus::Failed => None,
            _ => state.take_result(),
        };

        log::info!(
            "Workflow {} finished: {:?} ({} errors, {} tokens)",
            state.run_id(),
            status,
            state.errors().len(),
            state.usage().total_tokens()
        );

        AnalysisOutcome {
            run_id: state.run_id().to_string(),
            status,
            result,
            errors: state.errors().entries().to_vec(),
            usage: state.usage().summary(),
            stages: state.visited().iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn call_failure_entry(stage: &str, scope: Option<String>, err: ValidatedCallError) -> ErrorEntry {
    let attempts = err.attempts();
    let error = match err {
        ValidatedCallError::Schema { violation, .. } => {
            PipelineError::SchemaValidation(violation.0)
        }
        ValidatedCallError::Model { error, .. } => PipelineError::ModelCall(error.to_string()),
    };
    ErrorEntry {
        kind: ErrorKind::from(&error),
        stage: stage.to_string(),
        scope,
        message: error.to_string(),
        attempts,
    }
}

fn record_call_failure(state: &mut WorkflowState, section: &Section, err: ValidatedCallError) {
    let entry = call_failure_entry(
        Stage::Extracting(ExtractionRoute::Direct).name(),
        Some(section.kind.to_string()),
        err,
    );
    state.record_error(entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::ModelError;
    use crate::adk::model::{Content, GenerationConfig, Model, ModelResponse};
    use crate::adk::usage::TokenUsage;
    use crate::cvsense::document::{FileTextExtractor, SectionKind};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock model answering by section type found in the prompt
    struct SectionModel {
        calls: AtomicUsize,
        broken_skills: bool,
    }

    impl SectionModel {
        fn new(broken_skills: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                broken_skills,
            }
        }
    }

    #[async_trait]
    impl Model for SectionModel {
        fn name(&self) -> &str {
            "section-mock"
        }

        async fn generate_content(
            &self,
            history: &[Content],
            _config: Option<&GenerationConfig>,
        ) -> Result<ModelResponse, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = history[1].text();
            let reply = if prompt.starts_with("Section type: personal_info") {
                r#"{"items": [{"full_name": "Jane Doe", "email": "jane@example.com"}]}"#
            } else if prompt.starts_with("Section type: education") {
                r#"{"items": [{"institution_name": "MIT", "degree_name": "BSc"}]}"#
            } else if prompt.starts_with("Section type: skills") {
                if self.broken_skills {
                    r#"{"items": [{"category": "languages"}]}"#
                } else {
                    r#"{"items": [{"skill_name": "Rust"}]}"#
                }
            } else if prompt.starts_with("Structured CV data") {
                r#"{"characteristics": [], "summary": "Engineer", "keywords": ["rust"]}"#
            } else {
                r#"{"items": []}"#
            };
            Ok(ModelResponse {
                content: Content::model(reply),
                usage: TokenUsage::new(10, 4),
            })
        }
    }

    fn engine(model: Arc<SectionModel>, config: WorkflowConfig) -> WorkflowEngine {
        WorkflowEngine::new(
            LlmClient::new(model),
            config,
            Arc::new(FileTextExtractor::new()),
        )
    }

    fn fast_config() -> WorkflowConfig {
        WorkflowConfig {
            retry_backoff_ms: 1,
            ..Default::default()
        }
    }

    const CV: &str = "Jane Doe\njane@example.com\n\nEducation\nMIT BSc 2019\n\nSkills\nRust";

    #[tokio::test]
    async fn test_complete_run_visits_every_stage() {
        let model = Arc::new(SectionModel::new(false));
        let outcome = engine(model.clone(), fast_config())
            .run(AnalysisRequest::new(CV), &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Complete);
        assert_eq!(
            outcome.stages,
            vec![
                "input_received",
                "segmented",
                "extracting",
                "inferring",
                "aggregated",
                "done"
            ]
        );
        let result = outcome.result.unwrap();
        assert_eq!(result.personal_info.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(result.education[0].institution_name, "MIT");
        assert_eq!(result.skills[0].skill_name, "Rust");
        assert_eq!(result.summary.as_deref(), Some("Engineer"));
        // three sections plus inference
        assert_eq!(outcome.usage.calls, 4);
        assert_eq!(model.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_permanent_validation_failure_is_isolated() {
        let model = Arc::new(SectionModel::new(true));
        let outcome = engine(model, fast_config())
            .run(AnalysisRequest::new(CV), &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Partial);
        let schema_errors: Vec<&ErrorEntry> = outcome
            .errors
            .iter()
            .filter(|e| e.kind == ErrorKind::SchemaValidation)
            .collect();
        assert_eq!(schema_errors.len(), 1);
        assert_eq!(schema_errors[0].scope.as_deref(), Some("skills"));
        assert_eq!(schema_errors[0].attempts, 3);

        let result = outcome.result.unwrap();
        assert!(result.skills.is_empty());
        assert_eq!(result.education.len(), 1);
        assert_eq!(result.low_confidence_sections, vec![SectionKind::Skills]);
    }

    #[tokio::test]
    async fn test_oversized_input_rejected_before_graph() {
        let model = Arc::new(SectionModel::new(false));
        let config = WorkflowConfig {
            max_input_chars: 10,
            ..fast_config()
        };
        let err = engine(model.clone(), config)
            .run(AnalysisRequest::new(CV), &CancellationFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_section_cap_truncates_and_flags() {
        let model = Arc::new(SectionModel::new(false));
        let config = WorkflowConfig {
            max_sections: 2,
            ..fast_config()
        };
        let outcome = engine(model, config)
            .run(AnalysisRequest::new(CV), &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Partial);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, ErrorKind::BudgetExceeded);
        let result = outcome.result.unwrap();
        assert!(result.skills.is_empty());
        assert_eq!(result.education.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_before_first_node() {
        let model = Arc::new(SectionModel::new(false));
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let outcome = engine(model.clone(), fast_config())
            .run(AnalysisRequest::new(CV), &cancel)
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(outcome.result.is_none());
        assert_eq!(outcome.errors[0].kind, ErrorKind::Cancelled);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreadable_document_fails_run() {
        let model = Arc::new(SectionModel::new(false));
        let outcome = engine(model, fast_config())
            .run_document(b"PK\x03\x04", Some("cv.docx"), None, &CancellationFlag::new())
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.errors[0].kind, ErrorKind::Extraction);
        assert_eq!(outcome.stages, vec!["input_received", "failed"]);
    }

    #[tokio::test]
    async fn test_oversized_section_takes_chunk_route() {
        let model = Arc::new(SectionModel::new(false));
        let config = WorkflowConfig {
            chunk: crate::cvsense::config::ChunkPolicy {
                threshold_chars: 12,
                chunk_chars: 12,
                ..Default::default()
            },
            infer_characteristics: false,
            ..fast_config()
        };
        let text = "Skills\nRust\nGo\nSQL\nDocker\nKubernetes";
        let outcome = engine(model.clone(), config)
            .run(AnalysisRequest::new(text), &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Complete);
        assert!(model.calls.load(Ordering::SeqCst) > 1);
        // every chunk answers "Rust"; dedup keeps one
        assert_eq!(outcome.result.unwrap().skills.len(), 1);
    }

    #[tokio::test]
    async fn test_route_threshold_counts_chars() {
        let model = Arc::new(SectionModel::new(false));
        let config = WorkflowConfig {
            chunk: crate::cvsense::config::ChunkPolicy {
                threshold_chars: 170,
                chunk_chars: 20,
                ..Default::default()
            },
            infer_characteristics: false,
            ..fast_config()
        };
        let text = format!("Skills\n{}", "Lập trình Rust\n".repeat(10));
        // under the threshold in chars, over it in bytes
        assert!(text.chars().count() < 170);
        assert!(text.len() > 170);

        let outcome = engine(model.clone(), config)
            .run(AnalysisRequest::new(text), &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Complete);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    /// Mock model that cancels the run from inside its first call
    struct CancellingModel {
        cancel: CancellationFlag,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Model for CancellingModel {
        fn name(&self) -> &str {
            "cancelling-mock"
        }

        async fn generate_content(
            &self,
            _history: &[Content],
            _config: Option<&GenerationConfig>,
        ) -> Result<ModelResponse, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.cancel.cancel();
            Ok(ModelResponse {
                content: Content::model(r#"{"items": [{"full_name": "Jane Doe"}]}"#),
                usage: TokenUsage::new(10, 4),
            })
        }
    }

    #[tokio::test]
    async fn test_cancel_during_run_stops_at_next_boundary() {
        let cancel = CancellationFlag::new();
        let model = Arc::new(CancellingModel {
            cancel: cancel.clone(),
            calls: AtomicUsize::new(0),
        });
        let engine = WorkflowEngine::new(
            LlmClient::new(model.clone()),
            fast_config(),
            Arc::new(FileTextExtractor::new()),
        );

        let outcome = engine
            .run(AnalysisRequest::new(CV), &cancel)
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(outcome.result.is_none());
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            outcome.stages,
            vec!["input_received", "segmented", "extracting", "failed"]
        );
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, ErrorKind::Cancelled);
        assert_eq!(outcome.errors[0].scope.as_deref(), Some("education"));
        // the call that finished before the flag was seen is still metered
        assert_eq!(outcome.usage.calls, 1);
    }

    #[tokio::test]
    async fn test_token_budget_stops_extraction() {
        let model = Arc::new(SectionModel::new(false));
        let config = WorkflowConfig {
            max_total_tokens: Some(10),
            ..fast_config()
        };
        let outcome = engine(model.clone(), config)
            .run(AnalysisRequest::new(CV), &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Partial);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert!(outcome
            .errors
            .iter()
            .any(|e| e.kind == ErrorKind::BudgetExceeded));
        assert!(!outcome.stages.contains(&"inferring".to_string()));
    }
}
