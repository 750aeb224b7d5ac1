//! Transcript data model — responses, rounds, and the append-only debate log.
//!
//! The transcript is a log, not a mutable document: rounds are appended in
//! order and never edited or removed, and the synthesis slot is written at
//! most once. Replay depends on this.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::providers::{FailureKind, PortError, RouteInfo};

/// `round_number` sentinel for the synthesis response, distinct from any
/// reflection round.
pub const SYNTHESIS_ROUND: i32 = -1;

/// Hard upper bound on reflection rounds. A cost-control invariant, not a
/// default: enforced before dispatch and again on replay extension.
pub const MAX_ROUNDS_CAP: u32 = 3;

/// What kind of round a round number denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundKind {
    Initial,
    Reflection,
    Synthesis,
}

impl RoundKind {
    /// Pure function of the round number: 0 is initial, the negative
    /// sentinel is synthesis, everything else is reflection.
    pub fn for_round(round_number: i32) -> Self {
        match round_number {
            0 => Self::Initial,
            n if n < 0 => Self::Synthesis,
            _ => Self::Reflection,
        }
    }
}

impl std::fmt::Display for RoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Reflection => write!(f, "reflection"),
            Self::Synthesis => write!(f, "synthesis"),
        }
    }
}

/// A recorded per-slot failure. Failures are data on the transcript, never
/// errors raised past the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&PortError> for ModelFailure {
    fn from(err: &PortError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// One backend's output for one round, or the record of its failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Opaque backend identifier, unique within a panel.
    pub model_id: String,
    /// Human-readable name for rendering.
    pub display_name: String,
    /// 0 = initial, 1..N = reflection, [`SYNTHESIS_ROUND`] = synthesis.
    pub round_number: i32,
    /// Response text; empty when `error` is set.
    pub content: String,
    /// When the slot was filled.
    pub received_at: DateTime<Utc>,
    /// Total tokens reported by the provider.
    pub token_count: Option<u64>,
    /// Wall-clock latency of the call in milliseconds.
    pub latency_ms: Option<u64>,
    /// Present iff this slot represents a failure rather than a success.
    pub error: Option<ModelFailure>,
    /// How the call was routed, when the router handled it.
    pub routing: Option<RouteInfo>,
}

impl ModelResponse {
    /// A successful slot.
    pub fn success(
        model_id: impl Into<String>,
        display_name: impl Into<String>,
        round_number: i32,
        content: impl Into<String>,
        token_count: Option<u64>,
        latency_ms: u64,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            display_name: display_name.into(),
            round_number,
            content: content.into(),
            received_at: Utc::now(),
            token_count,
            latency_ms: Some(latency_ms),
            error: None,
            routing: None,
        }
    }

    /// A failed slot: empty content, error recorded.
    pub fn failure(
        model_id: impl Into<String>,
        display_name: impl Into<String>,
        round_number: i32,
        failure: ModelFailure,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            display_name: display_name.into(),
            round_number,
            content: String::new(),
            received_at: Utc::now(),
            token_count: None,
            latency_ms: None,
            error: Some(failure),
            routing: None,
        }
    }

    /// Attach routing metadata.
    pub fn with_routing(mut self, route: Option<RouteInfo>) -> Self {
        self.routing = route;
        self
    }

    /// Whether this slot holds a real answer.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate health of one round, computed from its slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundHealth {
    /// Every slot succeeded.
    Complete,
    /// At least one slot succeeded, at least one failed.
    Degraded,
    /// Every slot failed. The debate cannot continue past this.
    Failed,
}

/// The set of responses for one round, one slot per requested pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateRound {
    pub round_number: i32,
    pub round_type: RoundKind,
    pub responses: Vec<ModelResponse>,
}

impl DebateRound {
    /// Build a round; `round_type` is derived, never chosen.
    pub fn new(round_number: i32, responses: Vec<ModelResponse>) -> Self {
        debug_assert!(responses.iter().all(|r| r.round_number == round_number));
        Self {
            round_number,
            round_type: RoundKind::for_round(round_number),
            responses,
        }
    }

    /// Slot for a given model, if the round holds one.
    pub fn response_of(&self, model_id: &str) -> Option<&ModelResponse> {
        self.responses.iter().find(|r| r.model_id == model_id)
    }

    /// Aggregate health, derived from the slots.
    pub fn health(&self) -> RoundHealth {
        let live = self.responses.iter().filter(|r| r.succeeded()).count();
        if live == 0 {
            RoundHealth::Failed
        } else if live == self.responses.len() {
            RoundHealth::Complete
        } else {
            RoundHealth::Degraded
        }
    }
}

/// Violation of a transcript invariant. These indicate a sequencing bug in
/// the caller, not a recoverable runtime condition.
#[derive(Debug, Error, PartialEq)]
pub enum TranscriptError {
    #[error("round {got} is out of sequence (expected round {expected})")]
    NonSequentialRound { got: i32, expected: i32 },

    #[error("transcript already holds {len} rounds (max_rounds = {max_rounds})")]
    RoundsCapExceeded { len: usize, max_rounds: u32 },

    #[error("duplicate response for '{model_id}' in round {round}")]
    DuplicateResponse { model_id: String, round: i32 },

    #[error("synthesis already recorded")]
    SynthesisAlreadySet,

    #[error("synthesis response must carry round number {SYNTHESIS_ROUND}, got {0}")]
    NotASynthesisResponse(i32),
}

/// The full record of one debate: query, panel, rounds, synthesis.
///
/// Owned and mutated exclusively by the engine while in progress; immutable
/// once the engine reaches a terminal state. Collaborators that persist or
/// render a transcript only ever read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateTranscript {
    pub id: String,
    pub query: String,
    /// Ordered panel of model ids, fixed at creation.
    pub panel: Vec<String>,
    /// Model that produces the final synthesis; need not be in `panel`.
    pub synthesizer_id: String,
    /// Number of reflection rounds, 1 to [`MAX_ROUNDS_CAP`].
    pub max_rounds: u32,
    /// Initial round plus reflection rounds, append-only.
    pub rounds: Vec<DebateRound>,
    /// Final consolidated answer, set at most once.
    pub synthesis: Option<ModelResponse>,
    /// Recorded when the synthesis call failed; the rounds are kept.
    pub synthesis_error: Option<ModelFailure>,
    /// Reference answer for later comparison. Never shown to any model.
    pub ground_truth: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DebateTranscript {
    /// Fresh transcript with a random id and no rounds.
    pub fn new(
        query: impl Into<String>,
        panel: Vec<String>,
        synthesizer_id: impl Into<String>,
        max_rounds: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            query: query.into(),
            panel,
            synthesizer_id: synthesizer_id.into(),
            max_rounds,
            rounds: Vec::new(),
            synthesis: None,
            synthesis_error: None,
            ground_truth: None,
            created_at: Utc::now(),
        }
    }

    /// New transcript that reuses a persisted one's query, panel, and rounds
    /// but gets a fresh identity. The source is never edited in place.
    pub fn replay_from(
        source: &DebateTranscript,
        synthesizer_id: impl Into<String>,
        max_rounds: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            query: source.query.clone(),
            panel: source.panel.clone(),
            synthesizer_id: synthesizer_id.into(),
            max_rounds,
            rounds: source.rounds.clone(),
            synthesis: None,
            synthesis_error: None,
            ground_truth: source.ground_truth.clone(),
            created_at: Utc::now(),
        }
    }

    /// Append a completed round. Rounds must arrive in sequence and may not
    /// exceed `max_rounds + 1` (initial plus reflections).
    pub fn push_round(&mut self, round: DebateRound) -> Result<(), TranscriptError> {
        let expected = self.rounds.len() as i32;
        if round.round_number != expected {
            return Err(TranscriptError::NonSequentialRound {
                got: round.round_number,
                expected,
            });
        }
        if self.rounds.len() >= (self.max_rounds + 1) as usize {
            return Err(TranscriptError::RoundsCapExceeded {
                len: self.rounds.len(),
                max_rounds: self.max_rounds,
            });
        }
        let mut seen: Vec<&str> = Vec::with_capacity(round.responses.len());
        for response in &round.responses {
            if seen.contains(&response.model_id.as_str()) {
                return Err(TranscriptError::DuplicateResponse {
                    model_id: response.model_id.clone(),
                    round: round.round_number,
                });
            }
            seen.push(response.model_id.as_str());
        }
        self.rounds.push(round);
        Ok(())
    }

    /// Record the synthesis response. At most once per transcript.
    pub fn set_synthesis(&mut self, response: ModelResponse) -> Result<(), TranscriptError> {
        if self.synthesis.is_some() {
            return Err(TranscriptError::SynthesisAlreadySet);
        }
        if response.round_number != SYNTHESIS_ROUND {
            return Err(TranscriptError::NotASynthesisResponse(response.round_number));
        }
        self.synthesis = Some(response);
        Ok(())
    }

    /// Record that the synthesis call failed. The debate rounds are kept.
    pub fn record_synthesis_failure(
        &mut self,
        failure: ModelFailure,
    ) -> Result<(), TranscriptError> {
        if self.synthesis.is_some() {
            return Err(TranscriptError::SynthesisAlreadySet);
        }
        self.synthesis_error = Some(failure);
        Ok(())
    }

    /// Round `k`, if it has been completed. Round numbers are indices.
    pub fn round(&self, round_number: i32) -> Option<&DebateRound> {
        if round_number < 0 {
            return None;
        }
        self.rounds.get(round_number as usize)
    }

    /// The most recently completed round.
    pub fn latest_round(&self) -> Option<&DebateRound> {
        self.rounds.last()
    }

    /// A model's slot in a given round.
    pub fn response_of(&self, model_id: &str, round_number: i32) -> Option<&ModelResponse> {
        self.round(round_number)?.response_of(model_id)
    }

    /// Reflection rounds completed so far (excludes the initial round).
    pub fn reflections_completed(&self) -> u32 {
        self.rounds.len().saturating_sub(1) as u32
    }
}
