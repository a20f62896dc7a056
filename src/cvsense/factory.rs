// SPDX-License-Identifier: MIT

//! Factory - builds models, clients and embedders from configuration

use std::sync::Arc;
use std::time::Duration;

use crate::adk::client::LlmClient;
use crate::adk::error::ModelError;
use crate::adk::model::anthropic::AnthropicModel;
use crate::adk::model::gemini::GeminiModel;
use crate::adk::model::openai::OpenAIModel;
use crate::adk::model::{GenerationConfig, Model};
use crate::cvsense::config::{AppConfig, EmbeddingKind, EmbeddingSettings, ModelSettings};
use crate::cvsense::rag::{Embedder, HashingEmbedder, OpenAIEmbedder};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Infer the provider from a model name prefix
pub fn infer_provider_from_model(model_name: &str) -> &'static str {
    let name_lower = model_name.to_lowercase();
    if name_lower.starts_with("gpt") || name_lower.starts_with("o1") {
        "openai"
    } else if name_lower.starts_with("claude") {
        "anthropic"
    } else {
        "gemini"
    }
}

/// Provider to use: explicit setting first, then the model name prefix.
/// `MODEL_PROVIDER` reaches here through the config loader.
pub fn resolve_provider(settings: &ModelSettings) -> (String, String) {
    let model_name = settings
        .model_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let provider = settings
        .provider
        .clone()
        .filter(|p| !p.trim().is_empty())
        .map(|p| p.to_lowercase())
        .unwrap_or_else(|| infer_provider_from_model(&model_name).to_string());
    (provider, model_name)
}

pub fn create_model(settings: &ModelSettings) -> Result<Arc<dyn Model>, ModelError> {
    let (provider, model_name) = resolve_provider(settings);
    log::debug!("Using provider '{}' with model '{}'", provider, model_name);

    match provider.as_str() {
        "gemini" | "google" => Ok(Arc::new(GeminiModel::new(model_name)?)),
        "openai" => Ok(Arc::new(OpenAIModel::new(model_name)?)),
        "anthropic" => Ok(Arc::new(AnthropicModel::new(model_name)?)),
        other => Err(ModelError::UnsupportedProvider(other.to_string())),
    }
}

/// Wrap a model in a client carrying the configured generation settings,
/// pricing and timeout
pub fn client_for(model: Arc<dyn Model>, config: &AppConfig) -> LlmClient {
    LlmClient::new(model)
        .with_generation(GenerationConfig {
            temperature: config.model.temperature,
            max_output_tokens: config.model.max_output_tokens,
            ..Default::default()
        })
        .with_pricing(config.pricing)
        .with_timeout(Duration::from_secs(config.model.timeout_secs))
}

pub fn create_client(config: &AppConfig) -> Result<LlmClient, ModelError> {
    Ok(client_for(create_model(&config.model)?, config))
}

pub fn create_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>, ModelError> {
    match settings.kind {
        EmbeddingKind::Hashing => Ok(Arc::new(HashingEmbedder::new(settings.dimensions))),
        EmbeddingKind::Openai => {
            let model = settings
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());
            Ok(Arc::new(OpenAIEmbedder::new(model, settings.dimensions)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_provider() {
        assert_eq!(infer_provider_from_model("gemini-2.0-flash"), "gemini");
        assert_eq!(infer_provider_from_model("GPT-4o-mini"), "openai");
        assert_eq!(infer_provider_from_model("o1-preview"), "openai");
        assert_eq!(infer_provider_from_model("claude-3-5-sonnet"), "anthropic");
        assert_eq!(infer_provider_from_model("something-else"), "gemini");
    }

    #[test]
    fn test_explicit_provider_wins() {
        let settings = ModelSettings {
            provider: Some("Anthropic".into()),
            model_name: Some("gpt-4o".into()),
            ..Default::default()
        };
        assert_eq!(
            resolve_provider(&settings),
            ("anthropic".to_string(), "gpt-4o".to_string())
        );
    }

    #[test]
    fn test_default_model() {
        let (provider, model) = resolve_provider(&ModelSettings::default());
        assert_eq!(provider, "gemini");
        assert_eq!(model, DEFAULT_MODEL);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let settings = ModelSettings {
            provider: Some("deepseek".into()),
            ..Default::default()
        };
        assert!(matches!(
            create_model(&settings),
            Err(ModelError::UnsupportedProvider(p)) if p == "deepseek"
        ));
    }

    #[test]
    fn test_hashing_embedder_from_settings() {
        let embedder = create_embedder(&EmbeddingSettings::default()).unwrap();
        assert_eq!(embedder.dimensions(), 384);
        assert_eq!(embedder.name(), "hashing");
    }
}
