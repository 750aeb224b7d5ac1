//! Cross-vendor multi-model debate and consensus engine.
//!
//! Sends a query to a panel of AI models in parallel, shares the competing
//! answers back for a bounded number of reflection rounds, then synthesizes
//! a final answer through a designated model.
//!
//! # Modules
//!
//! - [`debate`]: the orchestration core — transcript log, round builder,
//!   concurrent dispatcher, and the state machine that sequences them.
//! - [`providers`]: the Model Port trait plus the Anthropic, OpenRouter,
//!   and routing adapters behind it.
//! - [`config`]: alias registry, routing modes, defaults, API keys.
//! - [`store`]: JSON persistence for finished transcripts.
//! - [`display`]: terminal, Markdown, and JSON renderers.
//! - [`prompts`]: the static prompt templates.

pub mod config;
pub mod debate;
pub mod display;
pub mod prompts;
pub mod providers;
pub mod store;

pub use config::Config;
pub use debate::{
    DebateEngine, DebateOutcome, DebateSpec, DebateTranscript, EngineConfig, EngineError,
    ReplayPlan,
};
pub use providers::{ModelPort, PortError, ProviderRouter};
pub use store::TranscriptStore;
