// SPDX-License-Identifier: MIT

//! Anthropic Model - Claude API implementation

use super::{history_text, Content, GenerationConfig, Model, ModelResponse, Part};
use crate::adk::error::ModelError;
use crate::adk::usage::TokenUsage;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::env;

/// Anthropic Claude model implementation
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl AnthropicModel {
    /// Create a new AnthropicModel
    ///
    /// Requires `ANTHROPIC_API_KEY` environment variable to be set.
    /// Optionally uses `ANTHROPIC_BASE_URL` for custom endpoints.
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ModelError::ApiKeyMissing("anthropic".into()))?;
        let base_url = env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        })
    }

    /// Extract system message from history
    fn extract_system_message(history: &[Content]) -> Option<String> {
        history
            .iter()
            .find(|c| c.role == "system")
            .map(Content::text)
            .filter(|t| !t.is_empty())
    }

    /// Anthropic has no native schema mode, so the schema rides in the system prompt
    fn system_with_schema(system: Option<String>, config: Option<&GenerationConfig>) -> Option<String> {
        let schema = config.and_then(|c| c.response_schema.as_ref());
        match (system, schema) {
            (sys, Some(schema)) => Some(format!(
                "{}\n\nRespond with a single JSON value matching this JSON schema, and nothing else:\n{}",
                sys.unwrap_or_default(),
                schema
            )),
            (sys, None) => sys,
        }
    }

    /// Convert internal Content to Anthropic message format
    fn content_to_anthropic_message(content: &Content) -> Option<serde_json::Value> {
        // Skip system messages (handled separately)
        if content.role == "system" {
            return None;
        }

        let role = match content.role.as_str() {
            "user" => "user",
            "model" => "assistant",
            other => other,
        };

        let message_content: Vec<serde_json::Value> = content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(t) => Some(json!({ "type": "text", "text": t })),
                Part::Thinking(_) => None,
            })
            .collect();

        if message_content.is_empty() {
            return None;
        }

        Some(json!({
            "role": role,
            "content": message_content
        }))
    }

    /// Parse Anthropic response into Content plus reported usage
    fn parse_anthropic_response(
        response: &serde_json::Value,
    ) -> Result<(Content, Option<TokenUsage>), ModelError> {
        let content_blocks = response["content"].as_array().ok_or_else(|| {
            ModelError::InvalidResponse("No content in Anthropic response".into())
        })?;

        let mut parts = Vec::new();
        for block in content_blocks {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(text) = block["text"].as_str() {
                        if !text.is_empty() {
                            parts.push(Part::Text(text.to_string()));
                        }
                    }
                }
                Some("thinking") => {
                    if let Some(thinking) = block["thinking"].as_str() {
                        if !thinking.is_empty() {
                            parts.push(Part::Thinking(thinking.to_string()));
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some(stop_reason) = response["stop_reason"].as_str() {
            log::debug!("Anthropic stop reason: {}", stop_reason);
        }

        let usage = match (
            response["usage"]["input_tokens"].as_u64(),
            response["usage"]["output_tokens"].as_u64(),
        ) {
            (Some(input), Some(output)) => Some(TokenUsage::new(input, output)),
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
impl Model for AnthropicModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<ModelResponse, ModelError> {
        let url = format!("{}/messages", self.base_url);

        let system = Self::system_with_schema(Self::extract_system_message(history), config);
        let messages: Vec<serde_json::Value> = history
            .iter()
            .filter_map(Self::content_to_anthropic_message)
            .collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages,
            "max_tokens": config.and_then(|c| c.max_output_tokens).unwrap_or(4096)
        });

        if let Some(sys) = system {
            body["system"] = json!(sys);
        }

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
        }

        log::debug!(
            "Anthropic request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ModelError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(ModelError::api("anthropic", status.as_u16(), text));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("Anthropic response: {}", resp_json);

        let (content, usage) = Self::parse_anthropic_response(&resp_json)?;
        let usage =
            usage.unwrap_or_else(|| TokenUsage::estimate(&history_text(history), &content.text()));
        Ok(ModelResponse { content, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_system_message() {
        let history = vec![Content::system("You are helpful"), Content::user("Hello")];
        let system = AnthropicModel::extract_system_message(&history);
        assert_eq!(system, Some("You are helpful".to_string()));
    }

    #[test]
    fn test_schema_appended_to_system() {
        let config = GenerationConfig {
            response_schema: Some(json!({"type": "object"})),
            ..Default::default()
        };
        let system =
            AnthropicModel::system_with_schema(Some("Extract".into()), Some(&config)).unwrap();
        assert!(system.starts_with("Extract"));
        assert!(system.contains("{\"type\":\"object\"}"));

        assert_eq!(
            AnthropicModel::system_with_schema(Some("Plain".into()), None),
            Some("Plain".to_string())
        );
    }

    #[test]
    fn test_content_to_anthropic_user_message() {
        let msg = AnthropicModel::content_to_anthropic_message(&Content::user("Hello")).unwrap();
        assert_eq!(msg["role"], "user");
        assert_eq!(msg["content"][0]["type"], "text");
        assert_eq!(msg["content"][0]["text"], "Hello");
    }

    #[test]
    fn test_content_to_anthropic_system_returns_none() {
        assert!(
            AnthropicModel::content_to_anthropic_message(&Content::system("System prompt"))
                .is_none()
        );
    }

    #[test]
    fn test_parse_anthropic_thinking_response() {
        let response = json!({
            "content": [
                {"type": "thinking", "thinking": "Let me think about this..."},
                {"type": "text", "text": "The answer is 42"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 30, "output_tokens": 9}
        });

        let (content, usage) = AnthropicModel::parse_anthropic_response(&response).unwrap();
        assert_eq!(content.parts.len(), 2);
        match &content.parts[0] {
            Part::Thinking(t) => assert_eq!(t, "Let me think about this..."),
            _ => panic!("Expected Thinking part"),
        }
        assert_eq!(content.text(), "The answer is 42");
        assert_eq!(usage, Some(TokenUsage::new(30, 9)));
    }
}
