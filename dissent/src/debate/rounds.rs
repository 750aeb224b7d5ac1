//! Round builder and reflection router — pure prompt construction.
//!
//! Given the transcript so far and a round number, produce the set of
//! (model, prompt) pairings to dispatch. No side effects, no I/O: the same
//! transcript state always yields the same pairings, which is what makes
//! replay deterministic.
//!
//! Fairness invariant: for round k, model m's prompt contains every other
//! visible member's round-(k-1) response and never m's own round-(k-1)
//! response restated among the peers. Peer order is panel order.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::prompts;

use super::topology::Topology;
use super::transcript::{DebateRound, DebateTranscript, ModelResponse};

/// One unit of dispatch: a model and the prompt it receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub model_id: String,
    pub display_name: String,
    pub prompt: String,
}

/// Failure to build a round. Always a state-consistency bug in the caller:
/// the builder never invents a prior answer.
#[derive(Debug, Error, PartialEq)]
pub enum RoundBuildError {
    #[error("cannot build round {round}: round {prior} is absent", prior = .round - 1)]
    MissingPriorRound { round: i32 },

    #[error(
        "cannot build round {round}: no slot for '{model_id}' in round {prior}",
        prior = .round - 1
    )]
    IncompletePriorRound { round: i32, model_id: String },

    #[error("round {0} is not a dispatchable round number")]
    InvalidRound(i32),
}

/// Builds the pairings for each round of a debate.
pub struct RoundBuilder {
    topology: Arc<dyn Topology>,
    display_names: HashMap<String, String>,
}

impl RoundBuilder {
    pub fn new(topology: Arc<dyn Topology>, display_names: HashMap<String, String>) -> Self {
        Self {
            topology,
            display_names,
        }
    }

    fn display_name(&self, model_id: &str) -> String {
        self.display_names
            .get(model_id)
            .cloned()
            .unwrap_or_else(|| model_id.to_string())
    }

    /// Pairings for round `round_number`: one per panel member, panel order.
    ///
    /// `context` is opaque appended text for the initial round only.
    pub fn build(
        &self,
        transcript: &DebateTranscript,
        round_number: i32,
        context: Option<&str>,
    ) -> Result<Vec<Pairing>, RoundBuildError> {
        match round_number {
            0 => Ok(self.build_initial(transcript, context)),
            k if k >= 1 => self.build_reflection(transcript, k),
            other => Err(RoundBuildError::InvalidRound(other)),
        }
    }

    fn build_initial(&self, transcript: &DebateTranscript, context: Option<&str>) -> Vec<Pairing> {
        let prompt = prompts::initial_prompt(&transcript.query, context);
        transcript
            .panel
            .iter()
            .map(|model_id| Pairing {
                model_id: model_id.clone(),
                display_name: self.display_name(model_id),
                prompt: prompt.clone(),
            })
            .collect()
    }

    /// The reflection router: each member sees its visible peers' prior
    /// responses, never its own restated. A failed prior slot contributes
    /// the fixed placeholder; individual failure never aborts the build.
    fn build_reflection(
        &self,
        transcript: &DebateTranscript,
        round_number: i32,
    ) -> Result<Vec<Pairing>, RoundBuildError> {
        let prior = transcript
            .round(round_number - 1)
            .ok_or(RoundBuildError::MissingPriorRound {
                round: round_number,
            })?;

        let mut pairings = Vec::with_capacity(transcript.panel.len());
        for model_id in &transcript.panel {
            let own = prior_slot(prior, round_number, model_id)?;
            let mut peers = Vec::new();
            for peer_id in self.topology.visible_peers(&transcript.panel, model_id) {
                let peer = prior_slot(prior, round_number, peer_id)?;
                peers.push((self.display_name(peer_id), prompts::slot_text(peer).to_string()));
            }
            let prompt =
                prompts::reflection_prompt(&transcript.query, prompts::slot_text(own), &peers);
            pairings.push(Pairing {
                model_id: model_id.clone(),
                display_name: self.display_name(model_id),
                prompt,
            });
        }
        Ok(pairings)
    }

    /// The single synthesis pairing: query plus the full formatted
    /// transcript, dispatched to the designated synthesizer.
    pub fn build_synthesis(&self, transcript: &DebateTranscript) -> Pairing {
        let digest = prompts::transcript_digest(transcript);
        Pairing {
            model_id: transcript.synthesizer_id.clone(),
            display_name: self.display_name(&transcript.synthesizer_id),
            prompt: prompts::synthesis_prompt(&transcript.query, &digest),
        }
    }
}

/// Every member must have a slot in the prior round, failed or not; a
/// missing slot means the transcript is inconsistent.
fn prior_slot<'a>(
    prior: &'a DebateRound,
    round_number: i32,
    model_id: &str,
) -> Result<&'a ModelResponse, RoundBuildError> {
    prior
        .response_of(model_id)
        .ok_or_else(|| RoundBuildError::IncompletePriorRound {
            round: round_number,
            model_id: model_id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::super::topology::FullMesh;
    use super::super::transcript::{DebateRound, ModelFailure};
    use super::*;
    use crate::providers::FailureKind;

    fn builder() -> RoundBuilder {
        RoundBuilder::new(Arc::new(FullMesh), HashMap::new())
    }

    fn slot(model: &str, round: i32, content: &str) -> ModelResponse {
        ModelResponse::success(model, model, round, content, None, 5)
    }

    fn failed_slot(model: &str, round: i32) -> ModelResponse {
        ModelResponse::failure(
            model,
            model,
            round,
            ModelFailure {
                kind: FailureKind::Timeout,
                message: "timed out".into(),
            },
        )
    }

    fn transcript_with_round_zero() -> DebateTranscript {
        let mut t = DebateTranscript::new(
            "What is 2+2?",
            vec!["a".into(), "b".into(), "c".into()],
            "a",
            2,
        );
        t.push_round(DebateRound::new(
            0,
            vec![
                slot("a", 0, "answer from a"),
                slot("b", 0, "answer from b"),
                slot("c", 0, "answer from c"),
            ],
        ))
        .unwrap();
        t
    }

    #[test]
    fn test_initial_round_one_pairing_per_member() {
        let t = DebateTranscript::new("Q", vec!["a".into(), "b".into()], "a", 1);
        let pairings = builder().build(&t, 0, Some("extra context")).unwrap();
        assert_eq!(pairings.len(), 2);
        assert_eq!(pairings[0].model_id, "a");
        assert_eq!(pairings[1].model_id, "b");
        assert!(pairings[0].prompt.contains("Q"));
        assert!(pairings[0].prompt.contains("extra context"));
        assert_eq!(pairings[0].prompt, pairings[1].prompt);
    }

    #[test]
    fn test_reflection_fairness_invariant() {
        let t = transcript_with_round_zero();
        let pairings = builder().build(&t, 1, None).unwrap();

        for pairing in &pairings {
            let own_content = format!("answer from {}", pairing.model_id);
            // The own answer appears exactly once (the "your previous
            // answer" section), never restated among the peers.
            assert_eq!(pairing.prompt.matches(&own_content).count(), 1);
            for other in ["a", "b", "c"] {
                if other != pairing.model_id {
                    assert!(
                        pairing.prompt.contains(&format!("answer from {other}")),
                        "{} missing peer {}",
                        pairing.model_id,
                        other
                    );
                }
            }
        }
    }

    #[test]
    fn test_reflection_peer_order_is_panel_order() {
        let t = transcript_with_round_zero();
        let pairings = builder().build(&t, 1, None).unwrap();
        let prompt_b = &pairings[1].prompt;
        let pos_a = prompt_b.find("answer from a").unwrap();
        let pos_c = prompt_b.find("answer from c").unwrap();
        assert!(pos_a < pos_c);
    }

    #[test]
    fn test_reflection_substitutes_placeholder_for_failed_peer() {
        let mut t = DebateTranscript::new("Q", vec!["a".into(), "b".into()], "a", 1);
        t.push_round(DebateRound::new(
            0,
            vec![slot("a", 0, "live answer"), failed_slot("b", 0)],
        ))
        .unwrap();

        let pairings = builder().build(&t, 1, None).unwrap();
        // Peer a sees the placeholder where b's answer would be.
        assert!(pairings[0].prompt.contains(prompts::NO_RESPONSE_PLACEHOLDER));
        // The failed model is not shown its own failure as a peer answer;
        // its own section carries the placeholder instead.
        assert!(pairings[1].prompt.contains("live answer"));
        assert!(pairings[1].prompt.contains(prompts::NO_RESPONSE_PLACEHOLDER));
    }

    #[test]
    fn test_missing_prior_round_is_fatal() {
        let t = DebateTranscript::new("Q", vec!["a".into()], "a", 1);
        let err = builder().build(&t, 1, None).unwrap_err();
        assert_eq!(err, RoundBuildError::MissingPriorRound { round: 1 });
    }

    #[test]
    fn test_incomplete_prior_round_is_fatal() {
        let mut t = DebateTranscript::new("Q", vec!["a".into(), "b".into()], "a", 1);
        // Round 0 lacks a slot for b entirely (distinct from a failed slot).
        t.push_round(DebateRound::new(0, vec![slot("a", 0, "only a")]))
            .unwrap();
        let err = builder().build(&t, 1, None).unwrap_err();
        assert_eq!(
            err,
            RoundBuildError::IncompletePriorRound {
                round: 1,
                model_id: "b".into()
            }
        );
    }

    #[test]
    fn test_synthesis_pairing_reads_whole_transcript() {
        let t = transcript_with_round_zero();
        let pairing = builder().build_synthesis(&t);
        assert_eq!(pairing.model_id, "a");
        assert!(pairing.prompt.contains("What is 2+2?"));
        for member in ["a", "b", "c"] {
            assert!(pairing.prompt.contains(&format!("answer from {member}")));
        }
    }

    #[test]
    fn test_negative_round_rejected() {
        let t = transcript_with_round_zero();
        let err = builder().build(&t, -1, None).unwrap_err();
        assert_eq!(err, RoundBuildError::InvalidRound(-1));
    }

    #[test]
    fn test_display_names_flow_into_pairings() {
        let names = HashMap::from([("a".to_string(), "Claude".to_string())]);
        let b = RoundBuilder::new(Arc::new(FullMesh), names);
        let t = DebateTranscript::new("Q", vec!["a".into(), "b".into()], "a", 1);
        let pairings = b.build(&t, 0, None).unwrap();
        assert_eq!(pairings[0].display_name, "Claude");
        assert_eq!(pairings[1].display_name, "b");
    }
}
