// SPDX-License-Identifier: MIT

//! Typed error handling for cvsense-rs
//!
//! One thiserror enum per concern, wrapped by [`CvError`] at the
//! application edge.

use thiserror::Error;

/// Top-level error type for cvsense-rs
#[derive(Debug, Error)]
pub enum CvError {
    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Provider name not recognised
    #[error("Unknown model provider: {0}")]
    UnsupportedProvider(String),

    /// Transport-level failure
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status from the provider
    #[error("API error from {provider} ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// A single call exceeded its deadline
    #[error("Model call timed out after {0} ms")]
    Timeout(u64),
}

impl ModelError {
    pub fn api(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited { .. } | Self::Timeout(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::InvalidResponse(_) => true,
            Self::ApiKeyMissing(_) | Self::UnsupportedProvider(_) => false,
        }
    }
}

/// Pipeline errors surfaced by the workflow engine and retrieval agent
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or oversized input, rejected before the graph starts
    #[error("Invalid input: {0}")]
    Input(String),

    /// Document could not be turned into text
    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// Model output never conformed to its schema
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    /// Vector store call failed
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// Iteration, token or length cap hit
    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    /// Caller abandoned the run
    #[error("Run cancelled before {0}")]
    Cancelled(String),

    /// Model call kept failing after retries
    #[error("Model call failed: {0}")]
    ModelCall(String),
}

/// Text extraction errors
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("Could not decode document text: {0}")]
    Decode(String),

    #[error("Document contains no text")]
    Empty,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Persistence and vector store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record '{0}' not found")]
    NotFound(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Raw model output did not match the declared contract
#[derive(Debug, Clone, Error, PartialEq)]
#[error("schema violation: {0}")]
pub struct SchemaViolation(pub String);

impl SchemaViolation {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl CvError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<&str> for CvError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for CvError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ModelError::Timeout(100).is_transient());
        assert!(ModelError::RateLimited {
            retry_after_secs: None
        }
        .is_transient());
        assert!(ModelError::api("openai", 503, "overloaded").is_transient());
        assert!(!ModelError::api("openai", 400, "bad request").is_transient());
        assert!(!ModelError::ApiKeyMissing("gemini".into()).is_transient());
    }

    #[test]
    fn test_error_wrapping() {
        let err: CvError = PipelineError::Input("empty".into()).into();
        assert_eq!(err.to_string(), "Invalid input: empty");

        let err: CvError = StoreError::NotFound("abc".into()).into();
        assert!(err.to_string().contains("abc"));
    }
}
