// SPDX-License-Identifier: MIT

//! Token usage and cost accounting
//!
//! Every model call made during one run is recorded into that run's
//! [`UsageMeter`]. Records are never removed, so totals only grow and
//! always equal the sum of the individual calls.

use serde::{Deserialize, Serialize};

/// Tokens consumed by a single model call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Rough estimate (4 chars per token) for providers that omit usage
    pub fn estimate(prompt: &str, output: &str) -> Self {
        Self {
            input_tokens: estimate_tokens(prompt),
            output_tokens: estimate_tokens(output),
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// USD price per million tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            input_per_million: 0.40,
            output_per_million: 1.60,
        }
    }
}

impl Pricing {
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        (usage.input_tokens as f64 * self.input_per_million
            + usage.output_tokens as f64 * self.output_per_million)
            / 1_000_000.0
    }
}

/// One metered model call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub stage: String,
    pub usage: TokenUsage,
    pub cost_usd: f64,
}

/// Aggregated usage for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub calls: usize,
}

/// Append-only meter owned by a single run
#[derive(Debug, Clone, Default)]
pub struct UsageMeter {
    records: Vec<CallRecord>,
}

impl UsageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: &str, usage: TokenUsage, pricing: &Pricing) {
        let cost_usd = pricing.cost(&usage);
        log::debug!(
            "[{}] usage in={} out={} cost=${:.6}",
            stage,
            usage.input_tokens,
            usage.output_tokens,
            cost_usd
        );
        self.records.push(CallRecord {
            stage: stage.to_string(),
            usage,
            cost_usd,
        });
    }

    pub fn records(&self) -> &[CallRecord] {
        &self.records
    }

    pub fn total_tokens(&self) -> u64 {
        self.records.iter().map(|r| r.usage.total()).sum()
    }

    pub fn summary(&self) -> UsageSummary {
        let input_tokens = self.records.iter().map(|r| r.usage.input_tokens).sum();
        let output_tokens = self.records.iter().map(|r| r.usage.output_tokens).sum();
        UsageSummary {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            cost_usd: self.records.iter().map(|r| r.cost_usd).sum(),
            calls: self.records.len(),
        }
    }
}
