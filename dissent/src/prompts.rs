//! Static prompt templates and their fill helpers.
//!
//! Templates are deliberately plain strings: the engine fills them with
//! transcript content and nothing else, so two runs over the same
//! transcript state always produce identical prompts.

use crate::debate::transcript::{DebateTranscript, ModelResponse};

/// Substituted for a failed slot wherever a prior answer would appear.
pub const NO_RESPONSE_PLACEHOLDER: &str =
    "[no response - excluded from this round's reflection]";

/// Round 0: answer the query cold.
pub fn initial_prompt(query: &str, context: Option<&str>) -> String {
    let mut prompt = format!(
        "You are one of several AI models independently answering the same question.\n\
         Give your best, complete answer. Do not hedge about being one of several models.\n\n\
         Question:\n{query}"
    );
    if let Some(context) = context {
        prompt.push_str("\n\nAdditional context:\n");
        prompt.push_str(context);
    }
    prompt
}

/// Round k: revise after seeing the other panelists' prior answers.
///
/// `peers` is (display name, prior content) in panel order; the recipient's
/// own prior answer goes in `own` and must never appear among the peers.
pub fn reflection_prompt(query: &str, own: &str, peers: &[(String, String)]) -> String {
    let mut peer_block = String::new();
    for (name, content) in peers {
        peer_block.push_str(&format!("--- {name} ---\n{content}\n\n"));
    }
    format!(
        "Several AI models, you among them, answered the question below. \
         Read the other panelists' answers, then revise your own. Defend what \
         you still believe is right, correct what you got wrong, and say so \
         when a peer's argument changed your mind.\n\n\
         Question:\n{query}\n\n\
         Your previous answer:\n{own}\n\n\
         The other panelists' answers:\n\n{peer_block}\
         Now give your revised answer."
    )
}

/// Final step: consolidate the whole transcript into one answer.
pub fn synthesis_prompt(query: &str, transcript_digest: &str) -> String {
    format!(
        "You are the synthesizer of a multi-model debate. Several AI models \
         answered a question and then revised their answers after reading one \
         another. Produce the single best final answer: weigh the arguments, \
         resolve the disagreements, and do not simply concatenate the \
         responses.\n\n\
         Question:\n{query}\n\n\
         Full debate transcript:\n\n{transcript_digest}\n\
         Write the final consolidated answer."
    )
}

/// Flatten every round of a transcript into the text block the synthesizer
/// reads. Failed slots appear as placeholders; nothing is omitted.
pub fn transcript_digest(transcript: &DebateTranscript) -> String {
    let mut digest = String::new();
    for round in &transcript.rounds {
        digest.push_str(&format!(
            "== Round {} ({}) ==\n\n",
            round.round_number, round.round_type
        ));
        for response in &round.responses {
            digest.push_str(&format!(
                "### {}\n{}\n\n",
                response.display_name,
                slot_text(response)
            ));
        }
    }
    digest
}

/// A slot's contribution to a prompt: its content, or the placeholder.
pub fn slot_text(response: &ModelResponse) -> &str {
    if response.succeeded() {
        &response.content
    } else {
        NO_RESPONSE_PLACEHOLDER
    }
}
