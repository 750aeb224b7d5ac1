//! Debate engine — the state machine that owns a debate's lifecycle.
//!
//! Sequences rounds through the round builder and dispatcher, decides
//! termination, and invokes synthesis. Rounds execute strictly one after
//! another (reflection content depends on the full prior round); within a
//! round, all calls fan out in parallel. The transcript is mutated only
//! here, strictly between rounds, never concurrently with an in-flight
//! round.
//!
//! Replay is not a special code path: a loaded transcript re-enters the
//! same machine at the next reflection round or directly at synthesis.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::providers::ModelPort;

use super::dispatch::{Cancelled, Dispatcher};
use super::phase::{transition, DebatePhase, TransitionError};
use super::rounds::{RoundBuildError, RoundBuilder};
use super::topology::{FullMesh, Topology};
use super::transcript::{
    DebateTranscript, RoundHealth, TranscriptError, MAX_ROUNDS_CAP, SYNTHESIS_ROUND,
};

/// Error from the debate engine. Per-slot call failures never appear here;
/// they are absorbed into the transcript as data.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before any dispatch occurs; no side effects.
    #[error("configuration rejected: {0}")]
    Configuration(String),

    #[error(transparent)]
    Build(#[from] RoundBuildError),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("transcript cannot be replayed: {0}")]
    NotReplayable(String),
}

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-call timeout, enforced independently for every pairing.
    pub call_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(120),
        }
    }
}

/// Everything needed to start a fresh debate.
#[derive(Debug, Clone)]
pub struct DebateSpec {
    pub query: String,
    /// Ordered panel of model ids, at least one.
    pub panel: Vec<String>,
    /// Model that synthesizes the final answer; need not be in the panel.
    pub synthesizer_id: String,
    /// Reflection rounds, 1 to [`MAX_ROUNDS_CAP`].
    pub max_rounds: u32,
    /// Opaque text appended to the initial prompt (file-derived context).
    pub context: Option<String>,
    /// Reference answer stored on the transcript; never prompted.
    pub ground_truth: Option<String>,
    /// Optional pretty names per model id.
    pub display_names: HashMap<String, String>,
}

impl DebateSpec {
    pub fn new(
        query: impl Into<String>,
        panel: Vec<String>,
        synthesizer_id: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            panel,
            synthesizer_id: synthesizer_id.into(),
            max_rounds: 1,
            context: None,
            ground_truth: None,
            display_names: HashMap::new(),
        }
    }

    pub fn with_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_ground_truth(mut self, ground_truth: impl Into<String>) -> Self {
        self.ground_truth = Some(ground_truth.into());
        self
    }

    pub fn with_display_names(mut self, names: HashMap<String, String>) -> Self {
        self.display_names = names;
        self
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.panel.is_empty() {
            return Err(EngineError::Configuration("panel must not be empty".into()));
        }
        for (i, id) in self.panel.iter().enumerate() {
            if self.panel[..i].contains(id) {
                return Err(EngineError::Configuration(format!(
                    "duplicate panel member '{id}'"
                )));
            }
        }
        if self.synthesizer_id.is_empty() {
            return Err(EngineError::Configuration(
                "synthesizer must not be empty".into(),
            ));
        }
        if !(1..=MAX_ROUNDS_CAP).contains(&self.max_rounds) {
            return Err(EngineError::Configuration(format!(
                "rounds must be between 1 and {MAX_ROUNDS_CAP}, got {}",
                self.max_rounds
            )));
        }
        Ok(())
    }
}

/// How to replay a persisted transcript.
#[derive(Debug, Clone)]
pub enum ReplayPlan {
    /// Re-run only the synthesis step, optionally with a different model.
    Resynthesize { synthesizer_id: Option<String> },
    /// Append further reflection rounds, then re-synthesize. Total
    /// reflection rounds may never exceed [`MAX_ROUNDS_CAP`].
    Extend {
        additional_rounds: u32,
        synthesizer_id: Option<String>,
    },
}

/// Result of a finished debate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateOutcome {
    /// `Done` or `Aborted`.
    pub terminal_phase: DebatePhase,
    /// Rounds recorded on the transcript, initial round included.
    pub rounds_completed: u32,
    /// Why the debate aborted, when it did.
    pub abort_reason: Option<String>,
    /// The now-immutable transcript.
    pub transcript: DebateTranscript,
}

impl DebateOutcome {
    /// Whether the debate ran to completion.
    pub fn is_success(&self) -> bool {
        self.terminal_phase == DebatePhase::Done
    }

    /// Compact summary line.
    pub fn summary_line(&self) -> String {
        let status = if self.is_success() { "DONE" } else { "ABORTED" };
        format!(
            "[{}] {} rounds | id={}",
            status, self.rounds_completed, self.transcript.id
        )
    }
}

/// The debate state machine.
///
/// Holds the Model Port, the topology strategy, and a cancellation token;
/// everything is injected so the engine runs unchanged against fakes.
pub struct DebateEngine {
    port: Arc<dyn ModelPort>,
    topology: Arc<dyn Topology>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl DebateEngine {
    pub fn new(port: Arc<dyn ModelPort>) -> Self {
        Self {
            port,
            topology: Arc::new(FullMesh),
            config: EngineConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_topology(mut self, topology: Arc<dyn Topology>) -> Self {
        self.topology = topology;
        self
    }

    /// Use an externally owned cancellation token; cancelling it drops the
    /// in-flight round and aborts the debate without rolling back.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run a fresh debate to a terminal state.
    pub async fn run(&self, spec: DebateSpec) -> Result<DebateOutcome, EngineError> {
        spec.validate()?;
        let mut transcript = DebateTranscript::new(
            spec.query.clone(),
            spec.panel.clone(),
            spec.synthesizer_id.clone(),
            spec.max_rounds,
        );
        transcript.ground_truth = spec.ground_truth.clone();
        let builder = RoundBuilder::new(self.topology.clone(), spec.display_names.clone());
        info!(
            debate = %transcript.id,
            panel = ?transcript.panel,
            rounds = spec.max_rounds,
            "debate starting"
        );
        self.execute(transcript, &builder, spec.context.as_deref(), 0, spec.max_rounds)
            .await
    }

    /// Replay a persisted transcript: same machine, non-empty starting
    /// state. Builds a new transcript; the source is never edited.
    pub async fn replay(
        &self,
        source: &DebateTranscript,
        plan: ReplayPlan,
    ) -> Result<DebateOutcome, EngineError> {
        if source.rounds.is_empty() {
            return Err(EngineError::NotReplayable(
                "transcript has no completed rounds".into(),
            ));
        }
        let completed = source.reflections_completed();
        let (synthesizer, max_rounds, target) = match &plan {
            ReplayPlan::Resynthesize { synthesizer_id } => {
                if !source.rounds.iter().any(|r| r.health() != RoundHealth::Failed) {
                    return Err(EngineError::NotReplayable(
                        "no round produced a live response".into(),
                    ));
                }
                let synthesizer = synthesizer_id
                    .clone()
                    .unwrap_or_else(|| source.synthesizer_id.clone());
                (synthesizer, source.max_rounds, completed)
            }
            ReplayPlan::Extend {
                additional_rounds,
                synthesizer_id,
            } => {
                if *additional_rounds == 0 {
                    return Err(EngineError::Configuration(
                        "extension must add at least one round".into(),
                    ));
                }
                let total = completed + additional_rounds;
                if total > MAX_ROUNDS_CAP {
                    return Err(EngineError::Configuration(format!(
                        "extension to {total} rounds exceeds the cap of {MAX_ROUNDS_CAP}"
                    )));
                }
                if source
                    .latest_round()
                    .is_some_and(|r| r.health() == RoundHealth::Failed)
                {
                    return Err(EngineError::NotReplayable(
                        "last recorded round failed entirely".into(),
                    ));
                }
                let synthesizer = synthesizer_id
                    .clone()
                    .unwrap_or_else(|| source.synthesizer_id.clone());
                (synthesizer, total, total)
            }
        };

        let transcript = DebateTranscript::replay_from(source, synthesizer, max_rounds);
        let builder = RoundBuilder::new(self.topology.clone(), HashMap::new());
        let first_round = transcript.rounds.len() as i32;
        info!(
            debate = %transcript.id,
            source = %source.id,
            first_round,
            target,
            "replaying debate"
        );
        self.execute(transcript, &builder, None, first_round, target)
            .await
    }

    /// Drive the machine from `first_round` until `target_reflections`
    /// rounds exist, then synthesize. Shared by fresh runs and replay.
    async fn execute(
        &self,
        mut transcript: DebateTranscript,
        builder: &RoundBuilder,
        context: Option<&str>,
        first_round: i32,
        target_reflections: u32,
    ) -> Result<DebateOutcome, EngineError> {
        let dispatcher = Dispatcher::new(self.port.clone(), self.config.call_timeout)
            .with_cancellation(self.cancel.clone());
        let mut phase = DebatePhase::Idle;

        let mut round_number = first_round;
        while round_number <= target_reflections as i32 {
            let entering = if round_number == 0 {
                DebatePhase::InitialRound
            } else {
                DebatePhase::Reflection(round_number as u32)
            };
            phase = transition(phase, entering)?;
            info!(debate = %transcript.id, phase = %phase, "entering round");

            let pairings = builder.build(&transcript, round_number, context)?;
            let round = match dispatcher.run(&pairings, round_number).await {
                Ok(round) => round,
                Err(Cancelled) => return self.abort(transcript, phase, "cancelled by operator"),
            };

            let health = round.health();
            transcript.push_round(round)?;
            match health {
                RoundHealth::Failed => {
                    let reason = format!("every model call in round {round_number} failed");
                    return self.abort(transcript, phase, &reason);
                }
                RoundHealth::Degraded => {
                    warn!(
                        debate = %transcript.id,
                        round = round_number,
                        "round degraded; continuing with the live models"
                    );
                }
                RoundHealth::Complete => {}
            }
            round_number += 1;
        }

        phase = transition(phase, DebatePhase::Synthesizing)?;
        info!(
            debate = %transcript.id,
            synthesizer = %transcript.synthesizer_id,
            "synthesizing"
        );
        let pairing = builder.build_synthesis(&transcript);
        match dispatcher
            .run(std::slice::from_ref(&pairing), SYNTHESIS_ROUND)
            .await
        {
            Ok(round) => {
                for slot in round.responses {
                    match slot.error.clone() {
                        None => transcript.set_synthesis(slot)?,
                        Some(failure) => {
                            // Synthesis failure does not discard the rounds
                            // already collected.
                            warn!(
                                debate = %transcript.id,
                                kind = %failure.kind,
                                "synthesis failed: {}",
                                failure.message
                            );
                            transcript.record_synthesis_failure(failure)?;
                        }
                    }
                }
            }
            Err(Cancelled) => return self.abort(transcript, phase, "cancelled by operator"),
        }

        phase = transition(phase, DebatePhase::Done)?;
        let outcome = DebateOutcome {
            terminal_phase: phase,
            rounds_completed: transcript.rounds.len() as u32,
            abort_reason: None,
            transcript,
        };
        info!("{}", outcome.summary_line());
        Ok(outcome)
    }

    fn abort(
        &self,
        transcript: DebateTranscript,
        phase: DebatePhase,
        reason: &str,
    ) -> Result<DebateOutcome, EngineError> {
        let phase = transition(phase, DebatePhase::Aborted)?;
        warn!(debate = %transcript.id, reason, "debate aborted");
        Ok(DebateOutcome {
            terminal_phase: phase,
            rounds_completed: transcript.rounds.len() as u32,
            abort_reason: Some(reason.to_string()),
            transcript,
        })
    }
}
