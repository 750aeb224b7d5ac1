//! Direct Anthropic Messages API adapter.
//!
//! Differences from the OpenRouter path worth remembering: auth is an
//! `x-api-key` header rather than a bearer token, `max_tokens` is required
//! in every payload, and response content arrives as an array of typed
//! blocks rather than a plain string.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{Completion, ModelPort, PortError};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Async adapter for the Anthropic Messages API.
pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PortError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: ANTHROPIC_API_URL.to_string(),
            api_key: api_key.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Point at a different endpoint (local proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ModelPort for AnthropicProvider {
    async fn invoke(
        &self,
        model_id: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<Completion, PortError> {
        let started = Instant::now();
        let payload = json!({
            "model": model_id,
            "max_tokens": self.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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
        let token_count = extract_token_count(&body);
        let latency_ms = started.elapsed().as_millis() as u64;
        debug!(model = model_id, latency_ms, tokens = ?token_count, "anthropic call complete");
        Ok(Completion {
            content,
            token_count,
            latency_ms,
            route: None,
        })
    }
}

/// Map an Anthropic error response to the port taxonomy. The error body
/// shape is `{"type": "error", "error": {"type": "...", "message": "..."}}`.
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

/// Concatenate the text blocks, ignoring non-text blocks (tool use,
/// thinking, and so on).
fn extract_content(body: &Value) -> Result<String, PortError> {
    let blocks = body
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| PortError::Malformed("missing content block array".into()))?;
    let text: String = blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        return Err(PortError::Malformed("no text blocks in response".into()));
    }
    Ok(text)
}

/// Sum of input and output tokens, when the API reported both.
fn extract_token_count(body: &Value) -> Option<u64> {
    let usage = body.get("usage")?;
    Some(usage.get("input_tokens")?.as_u64()? + usage.get("output_tokens")?.as_u64()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_content_joins_text_blocks() {
        let body = json!({
            "content": [
                {"type": "text", "text": "Hello "},
                {"type": "tool_use", "id": "t1"},
                {"type": "text", "text": "world"},
            ]
        });
        assert_eq!(extract_content(&body).unwrap(), "Hello world");
    }

    #[test]
    fn test_extract_content_rejects_missing_blocks() {
        let err = extract_content(&json!({"id": "msg_1"})).unwrap_err();
        assert!(matches!(err, PortError::Malformed(_)));

        let err = extract_content(&json!({"content": []})).unwrap_err();
        assert!(matches!(err, PortError::Malformed(_)));
    }

    #[test]
    fn test_extract_token_count_sums_usage() {
        let body = json!({"usage": {"input_tokens": 12, "output_tokens": 30}});
        assert_eq!(extract_token_count(&body), Some(42));
        assert_eq!(extract_token_count(&json!({"usage": {"input_tokens": 12}})), None);
        assert_eq!(extract_token_count(&json!({})), None);
    }

    #[test]
    fn test_status_error_mapping() {
        let body = json!({"type": "error", "error": {"type": "x", "message": "nope"}});
        let auth = status_error(reqwest::StatusCode::UNAUTHORIZED, &body);
        assert!(matches!(auth, PortError::AuthFailure(ref m) if m == "nope"));

        let limited = status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, &body);
        assert!(matches!(limited, PortError::RateLimited(_)));

        let down = status_error(reqwest::StatusCode::SERVICE_UNAVAILABLE, &body);
        assert!(matches!(down, PortError::Unavailable(_)));

        let odd = status_error(reqwest::StatusCode::BAD_REQUEST, &Value::Null);
        assert!(matches!(odd, PortError::Malformed(_)));
    }
}
