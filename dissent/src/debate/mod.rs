//! Debate orchestration — parallel fan-out, bounded reflection, synthesis.
//!
//! # Debate flow
//!
//! ```text
//! Idle → InitialRound → Reflection(1..N) → Synthesizing → Done
//!   │         │               │                 │
//!   │         └── every slot failed ────────────┤
//!   │                                           ▼
//!   └─ operator cancel at any point ───────→ Aborted
//! ```
//!
//! Within one round every model call runs in parallel; across rounds
//! execution is strictly sequential, because each reflection prompt is
//! built from the complete prior round. Replay re-enters the same machine
//! with a loaded transcript as starting state.

pub mod dispatch;
pub mod engine;
pub mod phase;
pub mod rounds;
pub mod topology;
pub mod transcript;

pub use dispatch::{Cancelled, Dispatcher};
pub use engine::{DebateEngine, DebateOutcome, DebateSpec, EngineConfig, EngineError, ReplayPlan};
pub use phase::{DebatePhase, TransitionError};
pub use rounds::{Pairing, RoundBuildError, RoundBuilder};
pub use topology::{FullMesh, Topology};
pub use transcript::{
    DebateRound, DebateTranscript, ModelFailure, ModelResponse, RoundHealth, RoundKind,
    TranscriptError, MAX_ROUNDS_CAP, SYNTHESIS_ROUND,
};
