//! Provider router — alias resolution and multi-vendor dispatch.
//!
//! The router is itself a [`ModelPort`]: the engine hands it an alias like
//! `"claude"` or a full `vendor/model` id, and it decides whether the call
//! goes to a direct vendor adapter or through OpenRouter, based on routing
//! config and which API keys exist. Adding a model is a registry entry,
//! never an orchestration change.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;

use super::{AnthropicProvider, Completion, ModelPort, OpenRouterProvider, PortError, RouteInfo};

/// Vendors with a direct adapter implementation. New vendors get added
/// here as their adapters land.
const DIRECT_VENDORS: &[&str] = &["anthropic"];

/// How an alias should be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Prefer direct when a key and an adapter exist, else OpenRouter.
    #[default]
    Auto,
    /// Force the direct vendor adapter (falls back with a warning).
    Direct,
    /// Force OpenRouter.
    Openrouter,
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Direct => write!(f, "direct"),
            Self::Openrouter => write!(f, "openrouter"),
        }
    }
}

/// Outcome of the pure routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub vendor: String,
    pub mode: RoutingMode,
    pub via_openrouter: bool,
}

impl RoutingDecision {
    /// The metadata recorded on the transcript slot.
    pub fn info(&self) -> RouteInfo {
        RouteInfo {
            vendor: self.vendor.clone(),
            mode: self.mode.to_string(),
            via_openrouter: self.via_openrouter,
        }
    }
}

/// Resolve the vendor for an alias or full model id from the OpenRouter id
/// prefix; anything unrecognized routes through OpenRouter.
fn resolve_vendor(alias_or_id: &str, config: &Config) -> String {
    if let Some(entry) = config.models.get(alias_or_id) {
        if let Some((prefix, _)) = entry.openrouter.split_once('/') {
            return prefix.to_string();
        }
    }
    if let Some((prefix, _)) = alias_or_id.split_once('/') {
        return prefix.to_string();
    }
    "openrouter".to_string()
}

/// Multi-vendor dispatch layer behind the Model Port.
pub struct ProviderRouter {
    config: Config,
    anthropic: Option<AnthropicProvider>,
    openrouter: Option<OpenRouterProvider>,
}

impl ProviderRouter {
    /// Construct providers for every vendor with an available key.
    pub fn from_config(config: &Config) -> Self {
        let anthropic = config
            .provider_key("anthropic")
            .and_then(|key| AnthropicProvider::new(key).ok())
            .map(|p| p.with_max_tokens(config.defaults.max_tokens));
        let openrouter = config
            .provider_key("openrouter")
            .and_then(|key| OpenRouterProvider::new(key).ok());
        Self {
            config: config.clone(),
            anthropic,
            openrouter,
        }
    }

    /// Pure decision, no I/O: where would this call go.
    pub fn route(&self, alias_or_id: &str) -> RoutingDecision {
        let vendor = resolve_vendor(alias_or_id, &self.config);
        let mode = self.config.routing_mode(alias_or_id);
        let has_key = self.config.provider_key(&vendor).is_some();
        let has_adapter = DIRECT_VENDORS.contains(&vendor.as_str());

        let via_openrouter = match mode {
            RoutingMode::Openrouter => true,
            RoutingMode::Direct => {
                if has_key && has_adapter {
                    false
                } else {
                    warn!(
                        alias = alias_or_id,
                        vendor = %vendor,
                        "direct mode requested but no key or adapter; falling back to OpenRouter"
                    );
                    true
                }
            }
            RoutingMode::Auto => !(has_key && has_adapter),
        };

        RoutingDecision {
            vendor,
            mode,
            via_openrouter,
        }
    }
}

#[async_trait]
impl ModelPort for ProviderRouter {
    async fn invoke(
        &self,
        model_id: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<Completion, PortError> {
        let decision = self.route(model_id);
        debug!(
            model = model_id,
            vendor = %decision.vendor,
            via_openrouter = decision.via_openrouter,
            "routing model call"
        );

        let completion = if decision.via_openrouter {
            let provider = self.openrouter.as_ref().ok_or_else(|| {
                PortError::Unavailable(format!(
                    "no provider available for '{model_id}': no OpenRouter API key \
                     configured and no direct provider available"
                ))
            })?;
            let resolved = self.config.resolve_openrouter(model_id);
            provider.invoke(&resolved, prompt, timeout).await?
        } else {
            let provider = self.anthropic.as_ref().ok_or_else(|| {
                PortError::Unavailable(format!(
                    "no direct provider for vendor '{}'",
                    decision.vendor
                ))
            })?;
            let resolved = self
                .config
                .resolve_direct(model_id)
                .unwrap_or_else(|| model_id.to_string());
            provider.invoke(&resolved, prompt, timeout).await?
        };

        Ok(Completion {
            route: Some(decision.info()),
            ..completion
        })
    }
}
