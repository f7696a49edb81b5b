//! Read-only configuration snapshot consumed by the engine. Loading the
//! file itself — path resolution, env overlays — is out of scope; callers
//! hand the engine an already-parsed `Config`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSelection {
    pub provider_id: String,
    pub model_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderDefinition {
    pub id: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct Options {
    /// Verbose logging.
    pub debug: bool,
    /// Mutes the UI's auto-compact prompt at the 95% context threshold;
    /// the engine's own `Summarize` entry point is unaffected.
    pub disable_auto_summarize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub large_model: ModelSelection,
    pub small_model: ModelSelection,
    pub providers: HashMap<String, ProviderDefinition>,
    #[serde(default)]
    pub options: Options,
}

impl Config {
    pub fn provider(&self, id: &str) -> Option<&ProviderDefinition> {
        self.providers.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_top_level_fields() {
        let json = serde_json::json!({
            "large_model": {"provider_id": "a", "model_id": "m"},
            "small_model": {"provider_id": "a", "model_id": "m2"},
            "providers": {},
            "bogus": true
        });
        let result: Result<Config, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }

    #[test]
    fn default_options_do_not_disable_auto_summarize() {
        let opts = Options::default();
        assert!(!opts.debug);
        assert!(!opts.disable_auto_summarize);
    }
}
