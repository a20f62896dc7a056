// SPDX-License-Identifier: MIT

//! Append-only error trail and run status shared by workflow runs and
//! agent cycles.

use serde::{Deserialize, Serialize};

use super::error::PipelineError;

/// Classification of a recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Input,
    Extraction,
    SchemaValidation,
    Retrieval,
    BudgetExceeded,
    Cancelled,
    ModelCall,
}

impl ErrorKind {
    /// Fatal kinds abort the run; everything else is absorbed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Input | Self::Extraction | Self::Cancelled)
    }
}

impl From<&PipelineError> for ErrorKind {
    fn from(err: &PipelineError) -> Self {
        match err {
            PipelineError::Input(_) => Self::Input,
            PipelineError::Extraction(_) => Self::Extraction,
            PipelineError::SchemaValidation(_) => Self::SchemaValidation,
            PipelineError::Retrieval(_) => Self::Retrieval,
            PipelineError::BudgetExceeded(_) => Self::BudgetExceeded,
            PipelineError::Cancelled(_) => Self::Cancelled,
            PipelineError::ModelCall(_) => Self::ModelCall,
        }
    }
}

/// One recorded failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub kind: ErrorKind,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub message: String,
    pub attempts: u32,
}

/// Error list that only ever grows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorTrail {
    entries: Vec<ErrorEntry>,
}

impl ErrorTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: ErrorEntry) {
        log::warn!(
            "[{}] {:?}{}: {}",
            entry.stage,
            entry.kind,
            entry
                .scope
                .as_deref()
                .map(|s| format!(" ({})", s))
                .unwrap_or_default(),
            entry.message
        );
        self.entries.push(entry);
    }

    /// Record a pipeline error raised at `stage`
    pub fn record_error(
        &mut self,
        stage: &str,
        scope: Option<String>,
        err: &PipelineError,
        attempts: u32,
    ) {
        self.record(ErrorEntry {
            kind: ErrorKind::from(err),
            stage: stage.to_string(),
            scope,
            message: err.to_string(),
            attempts,
        });
    }

    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn has_fatal(&self) -> bool {
        self.entries.iter().any(|e| e.kind.is_fatal())
    }

    pub fn into_entries(self) -> Vec<ErrorEntry> {
        self.entries
    }
}

/// User-visible completion status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Complete,
    Partial,
    Failed,
}
