// SPDX-License-Identifier: MIT

//! Vector store boundary: upsert by id, query by embedding

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::adk::error::StoreError;

/// One ranked query result
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    pub content: String,
    pub metadata: Value,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace the entry stored under `id`
    async fn upsert(
        &self,
        id: &str,
        embedding: Vec<f32>,
        content: &str,
        metadata: Value,
    ) -> Result<(), StoreError>;

    /// Best `top_k` entries by descending score
    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<VectorHit>, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
struct Entry {
    embedding: Vec<f32>,
    content: String,
    metadata: Value,
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Brute-force cosine store. The first upsert fixes the dimension.
#[derive(Clone, Default)]
pub struct InMemoryVectorStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    dimensions: Arc<RwLock<Option<usize>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn check_dimensions(&self, actual: usize) -> Result<(), StoreError> {
        match *self.dimensions.read().await {
            Some(expected) if expected != actual => {
                Err(StoreError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(
        &self,
        id: &str,
        embedding: Vec<f32>,
        content: &str,
        metadata: Value,
    ) -> Result<(), StoreError> {
        // held across the insert
        let mut dimensions = self.dimensions.write().await;
        let actual = embedding.len();
        match *dimensions {
            Some(expected) if expected != actual => {
                return Err(StoreError::DimensionMismatch { expected, actual });
            }
            _ => *dimensions = Some(actual),
        }

        let mut entries = self.entries.write().await;
        entries.insert(
            id.to_string(),
            Entry {
                embedding,
                content: content.to_string(),
                metadata,
            },
        );
        Ok(())
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<VectorHit>, StoreError> {
        self.check_dimensions(embedding.len()).await?;
        let entries = self.entries.read().await;
        if entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<VectorHit> = entries
            .iter()
            .map(|(id, entry)| VectorHit {
                id: id.clone(),
                score: cosine_similarity(embedding, &entry.embedding),
                content: entry.content.clone(),
                metadata: entry.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries.read().await.len())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_query_orders_by_score_then_id() {
        let store = InMemoryVectorStore::new();
        store.upsert("b", vec![1.0, 0.0], "b", json!({})).await.unwrap();
        store.upsert("a", vec![1.0, 0.0], "a", json!({})).await.unwrap();
        store.upsert("c", vec![0.0, 1.0], "c", json!({})).await.unwrap();

        let hits = store.query(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = InMemoryVectorStore::new();
        store.upsert("a", vec![1.0, 0.0], "old", json!({})).await.unwrap();
        store.upsert("a", vec![1.0, 0.0], "new", json!({})).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(store.query(&[1.0, 0.0], 1).await.unwrap()[0].content, "new");
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let store = InMemoryVectorStore::new();
        store.upsert("a", vec![1.0, 0.0], "a", json!({})).await.unwrap();
        let err = store
            .upsert("b", vec![1.0, 0.0, 0.0], "b", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_upserts_agree_on_dimension() {
        for _ in 0..20 {
            let store = InMemoryVectorStore::new();
            let (a, b) = tokio::join!(
                {
                    let store = store.clone();
                    tokio::spawn(async move { store.upsert("a", vec![1.0, 0.0], "a", json!({})).await })
                },
                {
                    let store = store.clone();
                    tokio::spawn(
                        async move { store.upsert("b", vec![1.0, 0.0, 0.0], "b", json!({})).await },
                    )
                }
            );
            let results = [a.unwrap(), b.unwrap()];
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert_eq!(store.len().await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let store = InMemoryVectorStore::new();
        assert!(store.query(&[1.0], 5).await.unwrap().is_empty());
    }
}
