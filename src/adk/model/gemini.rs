// SPDX-License-Identifier: MIT

//! Gemini Model - Google's Gemini API implementation

use super::{history_text, Content, GenerationConfig, Model, ModelResponse, Part};
use crate::adk::error::ModelError;
use crate::adk::usage::TokenUsage;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::env;

/// Google Gemini model implementation
pub struct GeminiModel {
    client: Client,
    api_key: String,
    model_name: String,
}

impl GeminiModel {
    /// Create a new GeminiModel
    ///
    /// Requires `GOOGLE_API_KEY` environment variable to be set.
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key =
            env::var("GOOGLE_API_KEY").map_err(|_| ModelError::ApiKeyMissing("gemini".into()))?;
        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
        })
    }

    /// Build the generateContent request body.
    ///
    /// System messages become `systemInstruction`; a response schema switches
    /// the output to JSON and is spelled out in the instruction, since
    /// Gemini's `responseSchema` rejects draft-07 keywords.
    fn build_body(history: &[Content], config: Option<&GenerationConfig>) -> serde_json::Value {
        let mut system_texts: Vec<String> = history
            .iter()
            .filter(|c| c.role == "system")
            .map(Content::text)
            .collect();

        let contents: Vec<serde_json::Value> = history
            .iter()
            .filter(|c| c.role != "system")
            .map(|c| {
                let parts: Vec<serde_json::Value> =
                    c.parts.iter().filter_map(part_to_gemini_json).collect();
                let role = if c.role == "model" { "model" } else { "user" };
                json!({ "role": role, "parts": parts })
            })
            .collect();

        let mut generation = serde_json::Map::new();
        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                generation.insert("temperature".into(), json!(temp));
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                generation.insert("maxOutputTokens".into(), json!(max_tokens));
            }
            if let Some(top_p) = cfg.top_p {
                generation.insert("topP".into(), json!(top_p));
            }
            if let Some(schema) = &cfg.response_schema {
                generation.insert("responseMimeType".into(), json!("application/json"));
                system_texts.push(format!(
                    "Respond with JSON matching this schema:\n{}",
                    schema
                ));
            }
        }

        let mut body = json!({ "contents": contents });
        if !system_texts.is_empty() {
            body["systemInstruction"] = json!({
                "parts": [{ "text": system_texts.join("\n\n") }]
            });
        }
        if !generation.is_empty() {
            body["generationConfig"] = serde_json::Value::Object(generation);
        }
        body
    }

    fn parse_gemini_response(
        resp_json: &serde_json::Value,
    ) -> Result<(Content, Option<TokenUsage>), ModelError> {
        let candidate = resp_json["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| ModelError::InvalidResponse("No candidates in response".into()))?;

        if let Some(finish_reason) = candidate.get("finishReason").and_then(|v| v.as_str()) {
            log::debug!("Gemini finish reason: {}", finish_reason);
            if finish_reason == "SAFETY" {
                return Err(ModelError::InvalidResponse(
                    "Gemini blocked response due to safety filters.".into(),
                ));
            }
        }

        let parts_json = candidate["content"]["parts"].as_array().ok_or_else(|| {
            log::error!("No parts in candidate. Full response: {}", resp_json);
            ModelError::InvalidResponse(format!("No content in Gemini response: {}", candidate))
        })?;

        let parts = parts_json.iter().flat_map(parse_gemini_part).collect();

        let meta = &resp_json["usageMetadata"];
        let usage = match (
            meta["promptTokenCount"].as_u64(),
            meta["candidatesTokenCount"].as_u64(),
        ) {
            (Some(input), Some(output)) => Some(TokenUsage::new(input, output)),
            (Some(input), None) => Some(TokenUsage::new(input, 0)),
            _ => None,
        };

        Ok((
            Content {
                role: "model".to_string(),
                parts,
            },
            usage,
        ))
    }
}

#[async_trait]
impl Model for GeminiModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<ModelResponse, ModelError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model_name, self.api_key
        );

        let body = Self::build_body(history, config);
        log::debug!(
            "Gemini request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self.client.post(&url).json(&body).send().await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ModelError::RateLimited {
                retry_after_secs: None,
            });
        }
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(ModelError::api("gemini", status.as_u16(), text));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("Gemini response: {}", resp_json);

        let (content, usage) = Self::parse_gemini_response(&resp_json)?;
        let usage =
            usage.unwrap_or_else(|| TokenUsage::estimate(&history_text(history), &content.text()));
        Ok(ModelResponse { content, usage })
    }
}

/// Serialize a Part to Gemini API JSON format
/// Returns None for parts that shouldn't be sent (e.g., Thinking)
pub fn part_to_gemini_json(part: &Part) -> Option<serde_json::Value> {
    match part {
        Part::Text(t) => Some(json!({ "text": t })),
        Part::Thinking(_) => None, // Thinking is internal, not sent to API
    }
}

/// Parse a Gemini API JSON part into Parts
pub fn parse_gemini_part(p: &serde_json::Value) -> Vec<Part> {
    let mut parts = Vec::new();

    if let Some(thought) = p.get("thought").and_then(|t| t.as_str()) {
        if !thought.is_empty() {
            parts.push(Part::Thinking(thought.to_string()));
        }
    }

    if let Some(text) = p["text"].as_str() {
        parts.push(Part::Text(text.to_string()));
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_thinking_part_returns_none() {
        let part = Part::Thinking("Internal reasoning".to_string());
        assert!(part_to_gemini_json(&part).is_none());
    }

    #[test]
    fn test_parse_empty_thought_ignored() {
        let json = json!({ "thought": "", "text": "Hello" });
        let parts = parse_gemini_part(&json);

        assert_eq!(parts.len(), 1);
        match &parts[0] {
            Part::Text(t) => assert_eq!(t, "Hello"),
            _ => panic!("Expected Text part"),
        }
    }

    #[test]
    fn test_body_moves_system_to_instruction() {
        let history = vec![Content::system("Extract skills"), Content::user("Rust, Go")];
        let config = GenerationConfig {
            temperature: Some(0.1),
            response_schema: Some(json!({"type": "object"})),
            ..Default::default()
        };
        let body = GeminiModel::build_body(&history, Some(&config));

        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["contents"][0]["role"], "user");
        let instruction = body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap();
        assert!(instruction.starts_with("Extract skills"));
        assert!(instruction.contains("\"type\":\"object\""));
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_parse_response_with_usage() {
        let response = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "{\"items\": []}"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 40, "candidatesTokenCount": 4}
        });
        let (content, usage) = GeminiModel::parse_gemini_response(&response).unwrap();
        assert_eq!(content.text(), "{\"items\": []}");
        assert_eq!(usage, Some(TokenUsage::new(40, 4)));
    }

    #[test]
    fn test_parse_safety_block() {
        let response = json!({
            "candidates": [{"finishReason": "SAFETY"}]
        });
        assert!(GeminiModel::parse_gemini_response(&response).is_err());
    }
}
