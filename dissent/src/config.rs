//! Configuration — model alias registry, routing modes, defaults, API keys.
//!
//! Loaded once at startup and passed explicitly into the provider router
//! and engine; the orchestration core never reads ambient global state, so
//! it runs unchanged against fakes.
//!
//! File format (TOML), all sections optional:
//!
//! ```toml
//! [models.claude]
//! openrouter = "anthropic/claude-opus-4-5"
//! direct = "claude-opus-4-5"
//! display = "Claude"
//!
//! [routing]
//! claude = "direct"
//!
//! [defaults]
//! panel = ["claude", "gpt"]
//! synthesizer = "claude"
//! rounds = 1
//! timeout_secs = 120
//! ```
//!
//! API keys come from the environment (`ANTHROPIC_API_KEY`,
//! `OPENROUTER_API_KEY`); the `[keys]` table is a fallback for setups
//! without environment control. The environment always wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::providers::RoutingMode;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "DISSENT_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown model alias '{0}' (not in [models] and not a vendor/model id)")]
    UnknownAlias(String),
}

/// One alias entry in the model registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelAlias {
    /// OpenRouter model id, `vendor/model`.
    pub openrouter: String,
    /// Vendor-native id for direct dispatch, when a direct adapter exists.
    #[serde(default)]
    pub direct: Option<String>,
    /// Pretty name for rendering.
    #[serde(default)]
    pub display: Option<String>,
}

/// Debate defaults applied when the CLI omits a flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub panel: Vec<String>,
    pub synthesizer: String,
    pub rounds: u32,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            panel: vec!["claude".into(), "gpt".into()],
            synthesizer: "claude".into(),
            rounds: 1,
            timeout_secs: 120,
            max_tokens: 4096,
        }
    }
}

/// Process-wide configuration, loaded once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub models: HashMap<String, ModelAlias>,
    pub routing: HashMap<String, RoutingMode>,
    pub defaults: Defaults,
    /// Fallback API keys by vendor; the environment always wins.
    pub keys: HashMap<String, String>,
}

impl Config {
    /// Built-in registry used when no config file exists. File entries
    /// override these alias by alias.
    pub fn builtin() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "claude".to_string(),
            ModelAlias {
                openrouter: "anthropic/claude-opus-4-5".into(),
                direct: Some("claude-opus-4-5".into()),
                display: Some("Claude".into()),
            },
        );
        models.insert(
            "gpt".to_string(),
            ModelAlias {
                openrouter: "openai/gpt-5.2".into(),
                direct: None,
                display: Some("GPT".into()),
            },
        );
        models.insert(
            "gemini".to_string(),
            ModelAlias {
                openrouter: "google/gemini-3-pro".into(),
                direct: None,
                display: Some("Gemini".into()),
            },
        );
        models.insert(
            "grok".to_string(),
            ModelAlias {
                openrouter: "x-ai/grok-4".into(),
                direct: None,
                display: Some("Grok".into()),
            },
        );
        Self {
            models,
            ..Self::default()
        }
    }

    /// Default config file location: `$DISSENT_CONFIG`, else
    /// `$HOME/.config/dissent/config.toml`.
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(".config/dissent/config.toml")
    }

    /// Load from `path` (or the default location). A missing file yields
    /// the built-in configuration; a malformed file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        if !path.exists() {
            debug!(path = %path.display(), "no config file; using built-in defaults");
            return Ok(Self::builtin());
        }
        let raw = std::fs::read_to_string(&path)?;
        let mut config: Config = toml::from_str(&raw)?;
        // Built-in aliases stay available unless the file overrides them.
        for (alias, entry) in Self::builtin().models {
            config.models.entry(alias).or_insert(entry);
        }
        debug!(path = %path.display(), aliases = config.models.len(), "config loaded");
        Ok(config)
    }

    /// API key for a vendor: environment first, `[keys]` table second.
    /// Vendor `x-ai` maps to `X_AI_API_KEY`.
    pub fn provider_key(&self, vendor: &str) -> Option<String> {
        let var = format!("{}_API_KEY", vendor.replace('-', "_").to_uppercase());
        std::env::var(&var)
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| self.keys.get(vendor).cloned())
    }

    /// Routing mode for an alias; unlisted aliases route automatically.
    pub fn routing_mode(&self, alias_or_id: &str) -> RoutingMode {
        self.routing
            .get(alias_or_id)
            .copied()
            .unwrap_or_default()
    }

    /// Pretty name for rendering.
    pub fn display_name(&self, alias_or_id: &str) -> String {
        self.models
            .get(alias_or_id)
            .and_then(|m| m.display.clone())
            .unwrap_or_else(|| alias_or_id.to_string())
    }

    /// OpenRouter model id for an alias; full ids pass through untouched.
    pub fn resolve_openrouter(&self, alias_or_id: &str) -> String {
        self.models
            .get(alias_or_id)
            .map(|m| m.openrouter.clone())
            .unwrap_or_else(|| alias_or_id.to_string())
    }

    /// Vendor-native id for direct dispatch, when one is registered.
    pub fn resolve_direct(&self, alias_or_id: &str) -> Option<String> {
        self.models.get(alias_or_id).and_then(|m| m.direct.clone())
    }

    /// A model selector is valid if it is a registered alias or already a
    /// provider-qualified `vendor/model` id.
    pub fn validate_selector(&self, alias_or_id: &str) -> Result<(), ConfigError> {
        if self.models.contains_key(alias_or_id) || alias_or_id.contains('/') {
            Ok(())
        } else {
            Err(ConfigError::UnknownAlias(alias_or_id.to_string()))
        }
    }

    /// Registered aliases, sorted for stable output.
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.models.keys().cloned().collect();
        aliases.sort();
        aliases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_usable_registry() {
        let config = Config::builtin();
        assert!(config.models.contains_key("claude"));
        assert!(config.models["claude"].direct.is_some());
        assert_eq!(config.defaults.rounds, 1);
    }

    #[test]
    fn test_parse_overrides_and_merges_builtin() {
        let raw = r#"
            [models.claude]
            openrouter = "anthropic/claude-sonnet-4-5"
            direct = "claude-sonnet-4-5"

            [models.local]
            openrouter = "meta-llama/llama-4"

            [routing]
            claude = "direct"
            gpt = "openrouter"

            [defaults]
            panel = ["claude", "local"]
            rounds = 2
        "#;
        let mut config: Config = toml::from_str(raw).unwrap();
        for (alias, entry) in Config::builtin().models {
            config.models.entry(alias).or_insert(entry);
        }

        assert_eq!(
            config.models["claude"].openrouter,
            "anthropic/claude-sonnet-4-5"
        );
        // Built-in aliases the file did not mention are still there.
        assert!(config.models.contains_key("gemini"));
        assert_eq!(config.routing_mode("claude"), RoutingMode::Direct);
        assert_eq!(config.routing_mode("gemini"), RoutingMode::Auto);
        assert_eq!(config.defaults.panel, vec!["claude", "local"]);
        assert_eq!(config.defaults.rounds, 2);
        // Unspecified defaults fall back.
        assert_eq!(config.defaults.timeout_secs, 120);
    }

    #[test]
    fn test_provider_key_falls_back_to_keys_table() {
        let mut config = Config::builtin();
        config
            .keys
            .insert("fakevendor".to_string(), "sk-from-file".to_string());
        assert_eq!(
            config.provider_key("fakevendor").as_deref(),
            Some("sk-from-file")
        );
        assert_eq!(config.provider_key("missingvendor"), None);
    }

    #[test]
    fn test_selector_validation() {
        let config = Config::builtin();
        config.validate_selector("claude").unwrap();
        config.validate_selector("mistralai/mistral-large").unwrap();
        let err = config.validate_selector("nonsense").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAlias(_)));
    }

    #[test]
    fn test_resolution() {
        let config = Config::builtin();
        assert_eq!(
            config.resolve_openrouter("claude"),
            "anthropic/claude-opus-4-5"
        );
        assert_eq!(
            config.resolve_openrouter("mistralai/mistral-large"),
            "mistralai/mistral-large"
        );
        assert_eq!(
            config.resolve_direct("claude").as_deref(),
            Some("claude-opus-4-5")
        );
        assert_eq!(config.resolve_direct("gpt"), None);
        assert_eq!(config.display_name("claude"), "Claude");
        assert_eq!(config.display_name("unknown/thing"), "unknown/thing");
    }
}
