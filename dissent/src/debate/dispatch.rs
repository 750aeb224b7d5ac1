//! Dispatcher — concurrent fan-out of one round's pairings.
//!
//! Every pairing is dispatched in parallel through the Model Port. A call
//! that fails or times out becomes a failure slot, never a dropped one: the
//! returned round has exactly one slot per requested pairing, in pairing
//! order, so responses stay indexable by panel position even under failure.
//! Each slot is an independent future joined at a single barrier; no slot
//! shares mutable state with another, and one slow model never blocks its
//! siblings' completion.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::providers::{ModelPort, PortError};

use super::rounds::Pairing;
use super::transcript::{DebateRound, ModelFailure, ModelResponse};

/// The operator cancelled the debate mid-round. Outstanding calls are
/// dropped; rounds already appended to the transcript are untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("debate cancelled by operator")]
pub struct Cancelled;

/// Executes one round's pairings concurrently with independent timeouts.
pub struct Dispatcher {
    port: Arc<dyn ModelPort>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(port: Arc<dyn ModelPort>, timeout: Duration) -> Self {
        Self {
            port,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run every pairing concurrently and collect one slot per pairing.
    ///
    /// Round-level policy (abort vs. continue on degraded rounds) belongs
    /// to the state machine; this only reports what happened.
    pub async fn run(
        &self,
        pairings: &[Pairing],
        round_number: i32,
    ) -> Result<DebateRound, Cancelled> {
        debug!(
            round = round_number,
            pairings = pairings.len(),
            "dispatching round"
        );
        let barrier = join_all(
            pairings
                .iter()
                .map(|pairing| self.call_slot(pairing, round_number)),
        );
        tokio::select! {
            _ = self.cancel.cancelled() => {
                warn!(round = round_number, "cancelled; dropping outstanding calls");
                Err(Cancelled)
            }
            responses = barrier => Ok(DebateRound::new(round_number, responses)),
        }
    }

    /// One slot: invoke the port with a timeout backstop and record the
    /// result, success or failure, without touching any other slot.
    async fn call_slot(&self, pairing: &Pairing, round_number: i32) -> ModelResponse {
        let invocation = self
            .port
            .invoke(&pairing.model_id, &pairing.prompt, self.timeout);
        match tokio::time::timeout(self.timeout, invocation).await {
            Ok(Ok(completion)) => {
                debug!(
                    model = %pairing.model_id,
                    round = round_number,
                    latency_ms = completion.latency_ms,
                    tokens = ?completion.token_count,
                    "slot completed"
                );
                ModelResponse::success(
                    pairing.model_id.as_str(),
                    pairing.display_name.as_str(),
                    round_number,
                    completion.content,
                    completion.token_count,
                    completion.latency_ms,
                )
                .with_routing(completion.route)
            }
            Ok(Err(err)) => {
                warn!(
                    model = %pairing.model_id,
                    round = round_number,
                    kind = %err.kind(),
                    "model call failed: {err}"
                );
                ModelResponse::failure(
                    pairing.model_id.as_str(),
                    pairing.display_name.as_str(),
                    round_number,
                    ModelFailure::from(&err),
                )
            }
            Err(_) => {
                let err = PortError::Timeout(self.timeout);
                warn!(
                    model = %pairing.model_id,
                    round = round_number,
                    "model call exceeded the dispatcher timeout"
                );
                ModelResponse::failure(
                    pairing.model_id.as_str(),
                    pairing.display_name.as_str(),
                    round_number,
                    ModelFailure::from(&err),
                )
            }
        }
    }
}
