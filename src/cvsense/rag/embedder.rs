// SPDX-License-Identifier: MIT

//! Text embedders for the knowledge base

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::env;

use crate::adk::error::ModelError;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;

    /// Embed several texts; the default embeds one at a time
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize;

    fn name(&self) -> &str;
}

/// Deterministic feature-hashing embedder. Needs no network or model files.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn fnv1a(token: &str) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let tokens = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() > 1);

        for token in tokens {
            let hash = Self::fnv1a(token);
            let index = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// OpenAI `/embeddings` endpoint
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Requires `OPENAI_API_KEY`; honours `OPENAI_BASE_URL`
    pub fn new(model_name: String, dimensions: usize) -> Result<Self, ModelError> {
        let api_key =
            env::var("OPENAI_API_KEY").map_err(|_| ModelError::ApiKeyMissing("openai".into()))?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
            dimensions,
        })
    }

    fn parse_embeddings(
        response: &serde_json::Value,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, ModelError> {
        let data = response["data"]
            .as_array()
            .ok_or_else(|| ModelError::InvalidResponse("No data in embeddings response".into()))?;

        let mut indexed: Vec<(u64, Vec<f32>)> = Vec::with_capacity(data.len());
        for (position, entry) in data.iter().enumerate() {
            let vector = entry["embedding"]
                .as_array()
                .ok_or_else(|| ModelError::InvalidResponse("Embedding entry has no vector".into()))?
                .iter()
                .map(|v| v.as_f64().unwrap_or_default() as f32)
                .collect();
            let index = entry["index"].as_u64().unwrap_or(position as u64);
            indexed.push((index, vector));
        }
        if indexed.len() != expected {
            return Err(ModelError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                expected,
                indexed.len()
            )));
        }
        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, v)| v).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("Empty embeddings response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": self.model_name,
            "input": texts,
            "dimensions": self.dimensions,
        });

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ModelError::RateLimited {
                retry_after_secs: None,
            });
        }
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(ModelError::api("openai", status.as_u16(), text));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        Self::parse_embeddings(&resp_json, texts.len())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}
