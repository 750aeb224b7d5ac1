//! Debate phases and transition validation.
//!
//! The engine walks `Idle → InitialRound → Reflection(1..N) → Synthesizing
//! → Done`, with `Aborted` reachable from any non-terminal phase. A loaded
//! transcript re-enters directly at a reflection round or at synthesis;
//! replay is the same machine started mid-way, not a special path.

use serde::{Deserialize, Serialize};

/// Phase of a debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebatePhase {
    /// Created but not started.
    Idle,
    /// Round 0: every panel member answers the query independently.
    InitialRound,
    /// Round k: every panel member revises after seeing its peers.
    Reflection(u32),
    /// The designated synthesizer consolidates the transcript.
    Synthesizing,
    /// Terminal: debate completed (synthesis present or its failure recorded).
    Done,
    /// Terminal: a whole round failed or the operator cancelled.
    Aborted,
}

impl DebatePhase {
    /// Whether this is a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Whether `to` is a legal next phase.
    pub fn may_transition(self, to: DebatePhase) -> bool {
        match (self, to) {
            // Aborting is legal from any live phase.
            (from, Self::Aborted) => !from.is_terminal(),
            // Fresh debate, or re-entry points for a loaded transcript.
            (Self::Idle, Self::InitialRound) => true,
            (Self::Idle, Self::Reflection(k)) => k >= 1,
            (Self::Idle, Self::Synthesizing) => true,
            (Self::InitialRound, Self::Reflection(1)) => true,
            (Self::Reflection(k), Self::Reflection(next)) => next == k + 1,
            (Self::Reflection(_), Self::Synthesizing) => true,
            (Self::Synthesizing, Self::Done) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::InitialRound => write!(f, "initial_round"),
            Self::Reflection(k) => write!(f, "reflection_{}", k),
            Self::Synthesizing => write!(f, "synthesizing"),
            Self::Done => write!(f, "done"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Error for an illegal phase transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: DebatePhase,
    pub to: DebatePhase,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid transition {} → {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

/// Validate and apply a transition, returning the new phase.
pub fn transition(from: DebatePhase, to: DebatePhase) -> Result<DebatePhase, TransitionError> {
    if from.may_transition(to) {
        Ok(to)
    } else {
        Err(TransitionError { from, to })
    }
}
