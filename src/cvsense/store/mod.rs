// SPDX-License-Identifier: MIT

//! Persistence and vector store boundaries with in-memory implementations

pub mod record;
pub mod vector;

pub use record::{InMemoryRecordStore, RecordStore};
pub use vector::{InMemoryVectorStore, VectorHit, VectorStore};
