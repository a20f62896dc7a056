// SPDX-License-Identifier: MIT

//! LLM client handle
//!
//! [`LlmClient`] bundles a model with its generation settings, pricing and
//! per-call timeout. It is built once and passed down explicitly to every
//! component that talks to a model. Calls return [`RawOutput`], which must
//! go through a validator before being treated as typed data.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::error::{ModelError, SchemaViolation};
use super::model::{Content, GenerationConfig, Model};
use super::usage::{Pricing, UsageMeter};

/// Unvalidated model output
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput(String);

impl RawOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }

    /// Parse as JSON after stripping markdown fences
    pub fn json(&self) -> Result<Value, SchemaViolation> {
        let cleaned = strip_json_fences(&self.0);
        serde_json::from_str(cleaned)
            .map_err(|e| SchemaViolation::new(format!("output is not valid JSON: {}", e)))
    }
}

/// Strip markdown code fences a model may wrap around JSON
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let body = if let Some(stripped) = text.strip_prefix("```json") {
        stripped
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
    } else {
        return text;
    };
    body.trim_start()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before attempt `attempt` (1-based, so attempt 2 waits `backoff`)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.backoff * 2u32.saturating_pow(attempt - 2)
    }
}

/// Why a validated call gave up
#[derive(Debug)]
pub enum ValidatedCallError {
    /// Output never conformed to the schema
    Schema {
        violation: SchemaViolation,
        attempts: u32,
    },
    /// The model call itself kept failing
    Model { error: ModelError, attempts: u32 },
}

impl ValidatedCallError {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Schema { attempts, .. } | Self::Model { attempts, .. } => *attempts,
        }
    }
}

impl std::fmt::Display for ValidatedCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schema {
                violation,
                attempts,
            } => write!(f, "{} (after {} attempts)", violation, attempts),
            Self::Model { error, attempts } => write!(f, "{} (after {} attempts)", error, attempts),
        }
    }
}

/// Explicitly constructed model handle
#[derive(Clone)]
pub struct LlmClient {
    model: Arc<dyn Model>,
    generation: GenerationConfig,
    pricing: Pricing,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            model,
            generation: GenerationConfig::default(),
            pricing: Pricing::default(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    /// One metered model call.
    ///
    /// Usage is recorded into `meter` whenever the provider answered, even if
    /// the caller later rejects the output.
    pub async fn invoke(
        &self,
        stage: &str,
        system: &str,
        prompt: &str,
        schema_hint: Option<&Value>,
        meter: &mut UsageMeter,
    ) -> Result<RawOutput, ModelError> {
        let history = vec![Content::system(system), Content::user(prompt)];
        let mut config = self.generation.clone();
        config.response_schema = schema_hint.cloned();

        log::debug!("[{}] invoking {}", stage, self.model.name());

        let response = tokio::time::timeout(
            self.timeout,
            self.model.generate_content(&history, Some(&config)),
        )
        .await
        .map_err(|_| ModelError::Timeout(self.timeout.as_millis() as u64))??;

        meter.record(stage, response.usage, &self.pricing);
        Ok(RawOutput::new(response.content.text()))
    }

    /// Call the model until `validate` accepts the output or the policy is
    /// exhausted.
    ///
    /// After a schema violation the next attempt carries a corrective note
    /// naming the violation. Transient model errors back off; permanent ones
    /// stop immediately.
    #[allow(clippy::too_many_arguments)]
    pub async fn invoke_validated<T, F>(
        &self,
        stage: &str,
        system: &str,
        prompt: &str,
        schema: &Value,
        policy: RetryPolicy,
        meter: &mut UsageMeter,
        validate: F,
    ) -> Result<(T, u32), ValidatedCallError>
    where
        F: Fn(&RawOutput) -> Result<T, SchemaViolation>,
    {
        let mut last_violation: Option<SchemaViolation> = None;
        let mut last_model_error: Option<ModelError> = None;

        for attempt in 1..=policy.max_attempts() {
            let delay = policy.delay_for(attempt);
            if last_model_error.is_some() && !delay.is_zero() {
                log::warn!(
                    "[{}] attempt {} failed, retrying after {}ms...",
                    stage,
                    attempt - 1,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let attempt_prompt = match &last_violation {
                Some(violation) => corrective_prompt(prompt, violation),
                None => prompt.to_string(),
            };

            match self
                .invoke(stage, system, &attempt_prompt, Some(schema), meter)
                .await
            {
                Ok(raw) => match validate(&raw) {
                    Ok(value) => return Ok((value, attempt)),
                    Err(violation) => {
                        log::warn!(
                            "[{}] attempt {}/{} rejected: {}",
                            stage,
                            attempt,
                            policy.max_attempts(),
                            violation
                        );
                        last_model_error = None;
                        last_violation = Some(violation);
                    }
                },
                Err(error) => {
                    log::warn!(
                        "[{}] attempt {}/{} model error: {}",
                        stage,
                        attempt,
                        policy.max_attempts(),
                        error
                    );
                    if !error.is_transient() {
                        return Err(ValidatedCallError::Model {
                            error,
                            attempts: attempt,
                        });
                    }
                    last_model_error = Some(error);
                }
            }
        }

        let attempts = policy.max_attempts();
        match (last_model_error, last_violation) {
            (Some(error), _) => Err(ValidatedCallError::Model { error, attempts }),
            (None, Some(violation)) => Err(ValidatedCallError::Schema {
                violation,
                attempts,
            }),
            (None, None) => Err(ValidatedCallError::Model {
                error: ModelError::InvalidResponse("no attempts were made".into()),
                attempts,
            }),
        }
    }
}

fn corrective_prompt(prompt: &str, violation: &SchemaViolation) -> String {
    format!(
        "{}\n\nYour previous answer was rejected: {}.\nReturn only JSON that satisfies the schema, with every required field filled.",
        prompt, violation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::{ModelResponse, Part};
    use crate::adk::usage::TokenUsage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock model replaying scripted results and capturing prompts
    struct ScriptedModel {
        script: Mutex<Vec<Result<String, ModelError>>>,
        prompts: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(script: Vec<Result<String, ModelError>>) -> Self {
            Self {
                script: Mutex::new(script),
                prompts: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Model for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate_content(
            &self,
            history: &[Content],
            _config: Option<&GenerationConfig>,
        ) -> Result<ModelResponse, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(history[1].text());
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() {
                    Ok("{}".to_string())
                } else {
                    script.remove(0)
                }
            };
            next.map(|text| ModelResponse {
                content: Content {
                    role: "model".to_string(),
                    parts: vec![Part::Text(text)],
                },
                usage: TokenUsage::new(10, 2),
            })
        }
    }

    /// Mock model whose first call hangs past any short timeout
    struct SlowFirstModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Model for SlowFirstModel {
        fn name(&self) -> &str {
            "slow-first"
        }

        async fn generate_content(
            &self,
            _history: &[Content],
            _config: Option<&GenerationConfig>,
        ) -> Result<ModelResponse, ModelError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(ModelResponse {
                content: Content::model("{\"name\": \"Linus\"}"),
                usage: TokenUsage::new(10, 2),
            })
        }
    }

    fn needs_name(raw: &RawOutput) -> Result<String, SchemaViolation> {
        let value = raw.json()?;
        value["name"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| SchemaViolation::new("missing name"))
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(1))
    }

    #[test]
    fn test_strip_json_fences() {
        assert_eq!(strip_json_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_json_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_retry_delays_double() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::ZERO);
        assert_eq!(policy.delay_for(2), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_invoke_meters_usage() {
        let model = Arc::new(ScriptedModel::new(vec![Ok("hello".into())]));
        let client = LlmClient::new(model);
        let mut meter = UsageMeter::new();

        let raw = client
            .invoke("answering", "sys", "prompt", None, &mut meter)
            .await
            .unwrap();
        assert_eq!(raw.text(), "hello");
        assert_eq!(meter.summary().calls, 1);
        assert_eq!(meter.total_tokens(), 12);
    }

    #[tokio::test]
    async fn test_validated_call_corrects_after_violation() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok("{\"name\": \"\"}".into()),
            Ok("```json\n{\"name\": \"Ada\"}\n```".into()),
        ]));
        let client = LlmClient::new(model.clone());
        let mut meter = UsageMeter::new();

        let (name, attempts) = client
            .invoke_validated(
                "extracting",
                "sys",
                "prompt",
                &serde_json::json!({}),
                fast_policy(),
                &mut meter,
                needs_name,
            )
            .await
            .unwrap();

        assert_eq!(name, "Ada");
        assert_eq!(attempts, 2);
        assert_eq!(meter.summary().calls, 2);
        let prompts = model.prompts.lock().unwrap();
        assert!(!prompts[0].contains("rejected"));
        assert!(prompts[1].contains("rejected: schema violation: missing name"));
    }

    #[tokio::test]
    async fn test_validated_call_exhausts_retries() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok("nope".into()),
            Ok("nope".into()),
            Ok("nope".into()),
        ]));
        let client = LlmClient::new(model.clone());
        let mut meter = UsageMeter::new();

        let err = client
            .invoke_validated(
                "extracting",
                "sys",
                "prompt",
                &serde_json::json!({}),
                fast_policy(),
                &mut meter,
                needs_name,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ValidatedCallError::Schema { attempts: 3, .. }));
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_model_error_stops_early() {
        let model = Arc::new(ScriptedModel::new(vec![Err(ModelError::api(
            "openai", 401, "bad key",
        ))]));
        let client = LlmClient::new(model.clone());
        let mut meter = UsageMeter::new();

        let err = client
            .invoke_validated(
                "extracting",
                "sys",
                "prompt",
                &serde_json::json!({}),
                fast_policy(),
                &mut meter,
                needs_name,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ValidatedCallError::Model { attempts: 1, .. }));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(meter.summary().calls, 0);
    }

    #[tokio::test]
    async fn test_timed_out_call_is_retried() {
        let model = Arc::new(SlowFirstModel {
            calls: AtomicUsize::new(0),
        });
        let client = LlmClient::new(model.clone()).with_timeout(Duration::from_millis(30));
        let mut meter = UsageMeter::new();

        let (name, attempts) = client
            .invoke_validated(
                "extracting",
                "sys",
                "prompt",
                &serde_json::json!({}),
                fast_policy(),
                &mut meter,
                needs_name,
            )
            .await
            .unwrap();

        assert_eq!(name, "Linus");
        assert_eq!(attempts, 2);
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
        // the timed-out call never answered, so only one call is metered
        assert_eq!(meter.summary().calls, 1);
    }

    #[tokio::test]
    async fn test_invoke_times_out() {
        let model = Arc::new(SlowFirstModel {
            calls: AtomicUsize::new(0),
        });
        let client = LlmClient::new(model).with_timeout(Duration::from_millis(30));
        let mut meter = UsageMeter::new();

        let err = client
            .invoke("answering", "sys", "prompt", None, &mut meter)
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Timeout(30)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_transient_error_then_success() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(ModelError::Timeout(5)),
            Ok("{\"name\": \"Grace\"}".into()),
        ]));
        let client = LlmClient::new(model);
        let mut meter = UsageMeter::new();

        let (name, attempts) = client
            .invoke_validated(
                "extracting",
                "sys",
                "prompt",
                &serde_json::json!({}),
                fast_policy(),
                &mut meter,
                needs_name,
            )
            .await
            .unwrap();
        assert_eq!(name, "Grace");
        assert_eq!(attempts, 2);
    }
}
