//! Static model metadata: capabilities, context-window limits, per-million pricing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ProvidersRegistry {
    pub providers: HashMap<String, ProviderInfo>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub models: HashMap<String, ModelInfo>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub capabilities: ModelCapabilities,
    #[serde(rename = "limit", default)]
    pub constraints: ModelConstraints,
    #[serde(rename = "cost", default)]
    pub pricing: ModelPricing,
}

impl ModelInfo {
    /// The context-window size used by the 95% auto-compact trigger.
    pub fn context_window(&self) -> u64 {
        self.constraints.context.unwrap_or(0)
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ModelCapabilities {
    pub attachment: bool,
    pub reasoning: bool,
    pub tool_call: bool,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ModelConstraints {
    pub context: Option<u64>,
    pub output: Option<u64>,
}

/// Per-million-token pricing for {input, output, cache-creation, cache-read}.
///
/// `calculate_cost` is the dot product of usage counts against these rates.
#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy)]
#[serde(default)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
    #[serde(alias = "cache_write")]
    pub cache_creation: f64,
    pub cache_read: f64,
}

impl ModelPricing {
    pub fn calculate_cost(&self, usage: &crate::chat::Usage) -> f64 {
        let per_token = |rate: f64| rate / 1_000_000.0;
        usage.input_tokens as f64 * per_token(self.input)
            + usage.output_tokens as f64 * per_token(self.output)
            + usage.cache_creation_tokens as f64 * per_token(self.cache_creation)
            + usage.cache_read_tokens as f64 * per_token(self.cache_read)
    }
}
