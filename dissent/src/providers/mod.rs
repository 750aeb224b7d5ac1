//! Model Port — the uniform capability boundary to all model backends.
//!
//! Every backend adapter implements [`ModelPort`]: given a model identifier,
//! a prompt, and a timeout, produce a [`Completion`] or fail with one of five
//! error kinds. The orchestration core treats the port as opaque; provider
//! HTTP, auth, and retry details never leak past this module.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod anthropic;
pub mod openrouter;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use openrouter::OpenRouterProvider;
pub use router::{ProviderRouter, RoutingDecision, RoutingMode};

/// A successful completion from a backend.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Response text.
    pub content: String,
    /// Total tokens reported by the provider, if it reported any.
    pub token_count: Option<u64>,
    /// Wall-clock latency of the call in milliseconds.
    pub latency_ms: u64,
    /// Routing metadata attached by the provider router.
    pub route: Option<RouteInfo>,
}

impl Completion {
    /// A bare completion with no token or routing metadata.
    pub fn text(content: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            content: content.into(),
            token_count: None,
            latency_ms,
            route: None,
        }
    }
}

/// Classification of a failed model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The call did not complete within its timeout.
    Timeout,
    /// The provider rejected our credentials.
    AuthFailure,
    /// The provider throttled the call.
    RateLimited,
    /// The provider could not be reached or returned a server error.
    Unavailable,
    /// The provider answered with something we could not parse.
    Malformed,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::AuthFailure => write!(f, "auth_failure"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Malformed => write!(f, "malformed"),
        }
    }
}

/// Error from a single model call.
///
/// The dispatcher treats every kind identically (the slot is marked failed);
/// the kind is preserved for diagnostics. Retry policy, if any, belongs in
/// the adapter, never here.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl PortError {
    /// The failure classification recorded on the transcript slot.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::Timeout,
            Self::AuthFailure(_) => FailureKind::AuthFailure,
            Self::RateLimited(_) => FailureKind::RateLimited,
            Self::Unavailable(_) => FailureKind::Unavailable,
            Self::Malformed(_) => FailureKind::Malformed,
        }
    }
}

/// How a call was routed: resolved vendor, configured mode, and whether the
/// OpenRouter fallback carried it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub vendor: String,
    pub mode: String,
    pub via_openrouter: bool,
}

/// Uniform capability required of any backend adapter.
///
/// Implementations must be safe to call concurrently; one round fans out to
/// every panel member through a single shared port.
#[async_trait]
pub trait ModelPort: Send + Sync {
    /// Send `prompt` to `model_id`, observing `timeout`.
    async fn invoke(
        &self,
        model_id: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<Completion, PortError>;
}
