//! End-to-end debate flow: engine against a scripted port, persisted and
//! reloaded through the store, then replayed with a different synthesizer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use dissent::debate::{DebateEngine, DebatePhase, DebateSpec, ReplayPlan, SYNTHESIS_ROUND};
use dissent::display;
use dissent::providers::{Completion, ModelPort, PortError};
use dissent::store::TranscriptStore;

/// Deterministic port: every model answers with its name and call number;
/// models listed in `failing` never answer.
struct ScriptedPort {
    calls: Mutex<Vec<String>>,
    failing: Vec<String>,
}

impl ScriptedPort {
    fn new(failing: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: failing.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelPort for ScriptedPort {
    async fn invoke(
        &self,
        model_id: &str,
        _prompt: &str,
        _timeout: Duration,
    ) -> Result<Completion, PortError> {
        let nth = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(model_id.to_string());
            calls.iter().filter(|m| m.as_str() == model_id).count()
        };
        if self.failing.contains(&model_id.to_string()) {
            return Err(PortError::Unavailable("scripted outage".into()));
        }
        Ok(Completion::text(format!("{model_id} take {nth}"), 11))
    }
}

#[tokio::test]
async fn full_flow_runs_persists_and_replays() {
    let port = Arc::new(ScriptedPort::new(&[]));
    let engine = DebateEngine::new(port.clone());
    let spec = DebateSpec::new(
        "Is Rust memory safe?",
        vec!["claude".into(), "gpt".into()],
        "claude",
    )
    .with_rounds(2);

    let outcome = engine.run(spec).await.unwrap();
    assert!(outcome.is_success());
    // 2 models x (1 initial + 2 reflections) + 1 synthesis.
    assert_eq!(port.call_count(), 7);
    assert_eq!(outcome.transcript.rounds.len(), 3);
    let synthesis = outcome.transcript.synthesis.as_ref().unwrap();
    assert_eq!(synthesis.round_number, SYNTHESIS_ROUND);

    // Persist, reload, and replay with a different synthesizer.
    let dir = tempfile::tempdir().unwrap();
    let store = TranscriptStore::new(dir.path());
    store.save(&outcome.transcript).unwrap();
    let loaded = store.load(&outcome.transcript.id).unwrap();
    assert_eq!(loaded.rounds.len(), 3);

    let replayed = engine
        .replay(
            &loaded,
            ReplayPlan::Resynthesize {
                synthesizer_id: Some("gpt".into()),
            },
        )
        .await
        .unwrap();
    assert!(replayed.is_success());
    assert_ne!(replayed.transcript.id, loaded.id);
    assert_eq!(replayed.transcript.synthesis.as_ref().unwrap().model_id, "gpt");
    for (new_round, old_round) in replayed.transcript.rounds.iter().zip(&loaded.rounds) {
        for (new_slot, old_slot) in new_round.responses.iter().zip(&old_round.responses) {
            assert_eq!(new_slot.content, old_slot.content);
        }
    }

    // The replayed transcript renders and stores like any other.
    let rendered = display::render_terminal(&replayed.transcript, true);
    assert!(rendered.contains("Is Rust memory safe?"));
    assert!(rendered.contains("claude take 1"));
    store.save(&replayed.transcript).unwrap();
    assert_eq!(store.list().unwrap().len(), 2);
}

#[tokio::test]
async fn degraded_debate_still_completes_and_persists() {
    let port = Arc::new(ScriptedPort::new(&["gpt"]));
    let engine = DebateEngine::new(port);
    let spec = DebateSpec::new("Q", vec!["claude".into(), "gpt".into()], "claude");

    let outcome = engine.run(spec).await.unwrap();
    assert!(outcome.is_success());
    for round in &outcome.transcript.rounds {
        assert_eq!(round.responses.len(), 2);
        assert!(round.responses[0].succeeded());
        assert!(!round.responses[1].succeeded());
    }

    let dir = tempfile::tempdir().unwrap();
    let store = TranscriptStore::new(dir.path());
    store.save(&outcome.transcript).unwrap();
    let loaded = store.load(&outcome.transcript.id).unwrap();
    assert!(!loaded.rounds[0].responses[1].succeeded());
    let rendered = display::render_terminal(&loaded, false);
    assert!(rendered.contains("failed: unavailable"));
}

#[tokio::test]
async fn fully_failed_panel_aborts_and_the_partial_transcript_survives() {
    let port = Arc::new(ScriptedPort::new(&["claude", "gpt"]));
    let engine = DebateEngine::new(port.clone());
    let spec = DebateSpec::new("Q", vec!["claude".into(), "gpt".into()], "claude");

    let outcome = engine.run(spec).await.unwrap();
    assert_eq!(outcome.terminal_phase, DebatePhase::Aborted);
    assert_eq!(port.call_count(), 2);

    let dir = tempfile::tempdir().unwrap();
    let store = TranscriptStore::new(dir.path());
    store.save(&outcome.transcript).unwrap();
    let loaded = store.load(&outcome.transcript.id).unwrap();
    assert_eq!(loaded.rounds.len(), 1);
    assert!(loaded.synthesis.is_none());
}
