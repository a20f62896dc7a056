// SPDX-License-Identifier: MIT

//! Retrieval-augmented answering: embedders, knowledge base and the
//! retrieval agent loop

pub mod agent;
pub mod embedder;
pub mod knowledge;
pub mod prompts;

pub use agent::{AgentAnswer, AgentEvent, AgentState, CitedSource, RetrievalAgent};
pub use embedder::{Embedder, HashingEmbedder, OpenAIEmbedder};
pub use knowledge::{chunk_document, KbDocument, KnowledgeBase, Passage, Retriever};
