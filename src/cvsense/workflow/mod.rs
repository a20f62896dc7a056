// SPDX-License-Identifier: MIT

//! CV extraction workflow
//!
//! Segmented sections are extracted under per-section schema contracts,
//! optionally enriched by an inference pass, and folded into one
//! [`AnalysisResult`].

pub mod aggregate;
pub mod chunking;
pub mod engine;
pub mod extractor;
pub mod prompts;
pub mod schema;
pub mod state;

pub use aggregate::{aggregate, AnalysisResult, FreeTextSection};
pub use engine::{AnalysisOutcome, WorkflowEngine};
pub use extractor::StructuredExtractor;
pub use schema::{ExtractionItem, InferenceOutput, SchemaContract};
pub use state::{AnalysisRequest, ExtractionRoute, Stage, WorkflowState};
