//! OpenRouter adapter — OpenAI-compatible chat completions over one key.
//!
//! OpenRouter fronts every vendor we have no direct adapter for, so this is
//! the fallback path of the provider router.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{Completion, ModelPort, PortError};

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Async adapter for the OpenRouter chat completions API.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PortError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: OPENROUTER_API_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Point at a different endpoint (local proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ModelPort for OpenRouterProvider {
    async fn invoke(
        &self,
        model_id: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<Completion, PortError> {
        let started = Instant::now();
        let payload = json!({
            "model": model_id,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PortError::Timeout(timeout)
                } else {
                    PortError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            let body = serde_json::from_str(&text).unwrap_or(Value::Null);
            return Err(status_error(status, &body));
        }
        let body: Value =
            serde_json::from_str(&text).map_err(|e| PortError::Malformed(e.to_string()))?;

        let content = extract_content(&body)?;
        let token_count = body.pointer("/usage/total_tokens").and_then(Value::as_u64);
        let latency_ms = started.elapsed().as_millis() as u64;
        debug!(model = model_id, latency_ms, tokens = ?token_count, "openrouter call complete");
        Ok(Completion {
            content,
            token_count,
            latency_ms,
            route: None,
        })
    }
}

fn status_error(status: reqwest::StatusCode, body: &Value) -> PortError {
    let detail = body
        .pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or("unexpected error")
        .to_string();
    match status.as_u16() {
        401 | 403 => PortError::AuthFailure(detail),
        429 => PortError::RateLimited(detail),
        500..=599 => PortError::Unavailable(format!("HTTP {status}: {detail}")),
        _ => PortError::Malformed(format!("HTTP {status}: {detail}")),
    }
}

fn extract_content(body: &Value) -> Result<String, PortError> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|content| !content.is_empty())
        .ok_or_else(|| PortError::Malformed("no message content in response".into()))
}
