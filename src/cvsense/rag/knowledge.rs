// SPDX-License-Identifier: MIT

//! Knowledge base - chunk, embed and index documents for retrieval

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::embedder::Embedder;
use crate::adk::error::{CvError, ModelError};
use crate::cvsense::store::VectorStore;

/// A document submitted for indexing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KbDocument {
    /// Generated when absent
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub doc_id: String,
    pub chunks: usize,
}

/// A retrieved chunk of an indexed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub score: f32,
    pub content: String,
    pub metadata: Value,
}

/// Ranked passage lookup used by the retrieval agent
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, CvError>;
}

/// Split text into chunks of at most `chunk_chars` characters, keeping
/// paragraphs together where they fit
pub fn chunk_document(text: &str, chunk_chars: usize) -> Vec<String> {
    let limit = chunk_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    let paragraphs = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty());

    for paragraph in paragraphs {
        let pieces = if paragraph.chars().count() > limit {
            split_long(paragraph, limit)
        } else {
            vec![paragraph.to_string()]
        };

        for piece in pieces {
            let needed = if current.is_empty() {
                piece.chars().count()
            } else {
                current.chars().count() + 2 + piece.chars().count()
            };
            if needed > limit && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&piece);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split one oversized paragraph on word boundaries
fn split_long(paragraph: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        let word_len = word.chars().count();
        if !current.is_empty() && current.chars().count() + 1 + word_len > limit {
            pieces.push(std::mem::take(&mut current));
        }
        if word_len > limit {
            let chars: Vec<char> = word.chars().collect();
            for slice in chars.chunks(limit) {
                pieces.push(slice.iter().collect());
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[derive(Clone)]
pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chunk_chars: usize,
}

impl KnowledgeBase {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, chunk_chars: usize) -> Self {
        Self {
            embedder,
            store,
            chunk_chars,
        }
    }

    /// Chunk, embed and upsert a document. Chunk ids are `{doc_id}:{n}`.
    pub async fn ingest(&self, document: KbDocument) -> Result<IngestReport, CvError> {
        let doc_id = document
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let chunks = chunk_document(&document.content, self.chunk_chars);
        if chunks.is_empty() {
            return Err(CvError::other(format!("document '{}' has no text", doc_id)));
        }

        let embeddings = self.embedder.embed_batch(&chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(ModelError::InvalidResponse(format!(
                "{} returned {} embeddings for {} chunks of '{}'",
                self.embedder.name(),
                embeddings.len(),
                chunks.len(),
                doc_id
            ))
            .into());
        }
        for (index, (chunk, embedding)) in chunks.iter().zip(embeddings).enumerate() {
            let metadata = json!({
                "doc_id": doc_id,
                "title": document.title,
                "chunk_index": index,
            });
            self.store
                .upsert(&format!("{}:{}", doc_id, index), embedding, chunk, metadata)
                .await?;
        }

        log::info!(
            "Indexed document {} as {} chunks in {}",
            doc_id,
            chunks.len(),
            self.store.name()
        );
        Ok(IngestReport {
            doc_id,
            chunks: chunks.len(),
        })
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, CvError> {
        let embedding = self.embedder.embed(query).await?;
        let hits = self.store.query(&embedding, top_k).await?;
        Ok(hits
            .into_iter()
            .map(|hit| Passage {
                id: hit.id,
                score: hit.score,
                content: hit.content,
                metadata: hit.metadata,
            })
            .collect())
    }
}

#[async_trait]
impl Retriever for KnowledgeBase {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, CvError> {
        self.search(query, top_k).await
    }
}
