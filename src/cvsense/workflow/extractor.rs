// SPDX-License-Identifier: MIT

//! Structured extractor - one schema-constrained model call per section

use crate::adk::client::{LlmClient, RetryPolicy, ValidatedCallError};
use crate::adk::usage::UsageMeter;

use super::chunking::{merge_chunk_items, split_into_chunks};
use super::prompts::{extraction_prompt, EXTRACTION_SYSTEM};
use super::schema::{ExtractionItem, SchemaContract};
use crate::cvsense::config::MergeStrategy;

/// Validated items and how many attempts they took
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub items: Vec<ExtractionItem>,
    pub attempts: u32,
}

/// Outcome of a chunked extraction; failed chunks are listed, successful
/// chunks are merged
#[derive(Debug)]
pub struct ChunkedExtraction {
    pub items: Vec<ExtractionItem>,
    pub attempts: u32,
    pub failures: Vec<(usize, ValidatedCallError)>,
    pub chunks: usize,
}

/// Turns section text into validated items. Reads nothing but its inputs.
#[derive(Clone)]
pub struct StructuredExtractor {
    client: LlmClient,
    policy: RetryPolicy,
}

impl StructuredExtractor {
    pub fn new(client: LlmClient, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Extract one section (or chunk) under `contract`
    pub async fn extract(
        &self,
        section_text: &str,
        contract: &SchemaContract,
        meter: &mut UsageMeter,
    ) -> Result<Extracted, ValidatedCallError> {
        let stage = format!("extracting:{}", contract.kind());
        let prompt = extraction_prompt(contract.kind(), section_text);

        let (items, attempts) = self
            .client
            .invoke_validated(
                &stage,
                EXTRACTION_SYSTEM,
                &prompt,
                contract.schema(),
                self.policy,
                meter,
                |raw| contract.validate(raw),
            )
            .await?;

        log::debug!(
            "[{}] {} items after {} attempt(s)",
            stage,
            items.len(),
            attempts
        );
        Ok(Extracted { items, attempts })
    }

    /// Extract an oversized section chunk by chunk and merge the results
    pub async fn extract_chunked(
        &self,
        section_text: &str,
        contract: &SchemaContract,
        chunk_chars: usize,
        merge: MergeStrategy,
        meter: &mut UsageMeter,
    ) -> ChunkedExtraction {
        let chunks = split_into_chunks(section_text, chunk_chars);
        log::info!(
            "Section {} split into {} chunks",
            contract.kind(),
            chunks.len()
        );

        let mut per_chunk = Vec::with_capacity(chunks.len());
        let mut failures = Vec::new();
        let mut attempts = 0;

        for (index, chunk) in chunks.iter().enumerate() {
            match self.extract(chunk, contract, meter).await {
                Ok(extracted) => {
                    attempts += extracted.attempts;
                    per_chunk.push(extracted.items);
                }
                Err(err) => {
                    attempts += err.attempts();
                    failures.push((index, err));
                }
            }
        }

        ChunkedExtraction {
            items: merge_chunk_items(per_chunk, merge),
            attempts,
            failures,
            chunks: chunks.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::ModelError;
    use crate::adk::model::{Content, GenerationConfig, Model, ModelResponse};
    use crate::adk::usage::TokenUsage;
    use crate::cvsense::document::SectionKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Mock model that lists every line mentioning a skill keyword
    struct LineSkillModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Model for LineSkillModel {
        fn name(&self) -> &str {
            "line-skills"
        }

        async fn generate_content(
            &self,
            history: &[Content],
            _config: Option<&GenerationConfig>,
        ) -> Result<ModelResponse, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = history[1].text();
            let body = prompt
                .split("--- SECTION ---")
                .nth(1)
                .unwrap_or_default()
                .replace("--- END ---", "");
            let items: Vec<serde_json::Value> = body
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && *l != "Skills")
                .map(|l| serde_json::json!({"skill_name": l}))
                .collect();
            Ok(ModelResponse {
                content: Content::model(serde_json::json!({ "items": items }).to_string()),
                usage: TokenUsage::new(5, 5),
            })
        }
    }

    fn extractor(model: Arc<LineSkillModel>) -> StructuredExtractor {
        StructuredExtractor::new(
            LlmClient::new(model),
            RetryPolicy::new(2, Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn test_identical_input_gives_equivalent_output() {
        let model = Arc::new(LineSkillModel {
            calls: AtomicUsize::new(0),
        });
        let extractor = extractor(model.clone());
        let contract = SchemaContract::for_section(SectionKind::Skills).unwrap();
        let text = "Skills\nRust\nPostgreSQL";

        let mut meter = UsageMeter::new();
        let first = extractor.extract(text, contract, &mut meter).await.unwrap();
        let second = extractor.extract(text, contract, &mut meter).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.items.len(), 2);
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_chunked_extraction_merges_in_order() {
        let model = Arc::new(LineSkillModel {
            calls: AtomicUsize::new(0),
        });
        let extractor = extractor(model.clone());
        let contract = SchemaContract::for_section(SectionKind::Skills).unwrap();
        let text = "Skills\nRust\nGo\nrust\nSQL\n";

        let mut meter = UsageMeter::new();
        let chunked = extractor
            .extract_chunked(text, contract, 8, MergeStrategy::ConcatenateDedup, &mut meter)
            .await;

        assert!(chunked.failures.is_empty());
        assert!(chunked.chunks > 1);
        assert_eq!(model.calls.load(Ordering::SeqCst), chunked.chunks);
        let names: Vec<String> = chunked
            .items
            .iter()
            .map(|item| match item {
                ExtractionItem::Skill(s) => s.skill_name.clone(),
                other => panic!("unexpected item {:?}", other),
            })
            .collect();
        assert_eq!(names, vec!["Rust", "Go", "SQL"]);
        assert_eq!(meter.summary().calls, chunked.chunks);
    }
}
