// SPDX-License-Identifier: MIT

//! Application configuration - YAML file loading with env overrides
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::adk::client::RetryPolicy;
use crate::adk::error::CvError;
use crate::adk::usage::Pricing;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelSettings,
    pub pricing: Pricing,
    pub workflow: WorkflowConfig,
    pub rag: RagConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// openai, anthropic or gemini; inferred from the model name when unset
    pub provider: Option<String>,
    pub model_name: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// Deadline for a single model call
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: None,
            model_name: None,
            temperature: Some(0.0),
            max_output_tokens: Some(4096),
            timeout_secs: 60,
        }
    }
}

/// How chunk outputs of an oversized section are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Keep every item in chunk order
    Concatenate,
    /// Keep chunk order, drop repeats of an item already seen
    #[default]
    ConcatenateDedup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkPolicy {
    /// Sections longer than this take the chunk-and-merge route
    pub threshold_chars: usize,
    /// Target chunk size, split on line boundaries
    pub chunk_chars: usize,
    pub merge: MergeStrategy,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            threshold_chars: 6_000,
            chunk_chars: 3_000,
            merge: MergeStrategy::ConcatenateDedup,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub max_input_chars: usize,
    pub max_sections: usize,
    /// Attempts after the first, per node call
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_total_tokens: Option<u64>,
    pub chunk: ChunkPolicy,
    pub infer_characteristics: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 60_000,
            max_sections: 24,
            max_retries: 2,
            retry_backoff_ms: 500,
            max_total_tokens: None,
            chunk: ChunkPolicy::default(),
            infer_characteristics: true,
        }
    }
}

impl WorkflowConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_backoff_ms))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingKind {
    /// Local feature hashing, no network
    #[default]
    Hashing,
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub kind: EmbeddingKind,
    pub dimensions: usize,
    pub model: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            kind: EmbeddingKind::Hashing,
            dimensions: 384,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub top_k: usize,
    /// Hard cap on decide/retrieve cycles
    pub max_iterations: u32,
    /// Passages scoring below this are not considered relevant
    pub min_score: f32,
    pub max_retrieval_retries: u32,
    pub retrieval_backoff_ms: u64,
    pub chunk_chars: usize,
    pub embedding: EmbeddingSettings,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_iterations: 4,
            min_score: 0.1,
            max_retrieval_retries: 2,
            retrieval_backoff_ms: 200,
            chunk_chars: 800,
            embedding: EmbeddingSettings::default(),
        }
    }
}

impl RagConfig {
    pub fn retrieval_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retrieval_retries,
            Duration::from_millis(self.retrieval_backoff_ms),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Loads [`AppConfig`] from YAML files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from a YAML file and apply env overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<AppConfig, CvError> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::parse_yaml(&content)?;
        Self::apply_env(&mut config);
        Ok(config)
    }

    /// Load from an optional path; defaults plus env overrides when absent
    pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig, CvError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let mut config = AppConfig::default();
                Self::apply_env(&mut config);
                Ok(config)
            }
        }
    }

    /// Parse a configuration from a YAML string
    pub fn parse_yaml(content: &str) -> Result<AppConfig, CvError> {
        if content.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        let config: AppConfig = serde_yaml::from_str(content)?;
        Self::check(&config)?;
        Ok(config)
    }

    fn check(config: &AppConfig) -> Result<(), CvError> {
        if config.workflow.chunk.chunk_chars == 0 {
            return Err(CvError::config("workflow.chunk.chunk_chars must be positive"));
        }
        if config.rag.max_iterations == 0 {
            return Err(CvError::config("rag.max_iterations must be at least 1"));
        }
        if config.rag.embedding.dimensions == 0 {
            return Err(CvError::config("rag.embedding.dimensions must be positive"));
        }
        Ok(())
    }

    /// Environment values for deployment-specific settings. Provider and
    /// model name only fill in what the file left unset.
    pub fn apply_env(config: &mut AppConfig) {
        if config.model.provider.is_none() {
            config.model.provider = env::var("MODEL_PROVIDER").ok();
        }
        if config.model.model_name.is_none() {
            config.model.model_name = env::var("MODEL_NAME").ok();
        }
        if let Some(limit) = env::var("CVSENSE_MAX_INPUT_CHARS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.workflow.max_input_chars = limit;
        }
        if let Some(limit) = env::var("CVSENSE_MAX_SECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.workflow.max_sections = limit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config_keeps_defaults() {
        let yaml = r#"
model:
  provider: anthropic
  model_name: claude-3-5-haiku-latest
workflow:
  max_sections: 10
  chunk:
    threshold_chars: 4000
    merge: concatenate
rag:
  top_k: 3
"#;
        let config = ConfigLoader::parse_yaml(yaml).unwrap();
        assert_eq!(config.model.provider.as_deref(), Some("anthropic"));
        assert_eq!(config.model.timeout_secs, 60);
        assert_eq!(config.workflow.max_sections, 10);
        assert_eq!(config.workflow.max_retries, 2);
        assert_eq!(config.workflow.chunk.threshold_chars, 4000);
        assert_eq!(config.workflow.chunk.chunk_chars, 3000);
        assert_eq!(config.workflow.chunk.merge, MergeStrategy::Concatenate);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.rag.max_iterations, 4);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = ConfigLoader::parse_yaml("").unwrap();
        assert_eq!(config.workflow.max_input_chars, 60_000);
        assert!((config.pricing.input_per_million - 0.40).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_zero_iterations() {
        let err = ConfigLoader::parse_yaml("rag:\n  max_iterations: 0\n").unwrap_err();
        assert!(matches!(err, CvError::Config(_)));
    }

    #[test]
    fn test_parse_invalid_yaml() {
        assert!(ConfigLoader::parse_yaml("workflow: [unclosed").is_err());
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = WorkflowConfig {
            max_retries: 3,
            retry_backoff_ms: 10,
            ..Default::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.backoff, Duration::from_millis(10));
    }
}
