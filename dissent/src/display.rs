//! Transcript rendering — pure `DebateTranscript → String` formatters.
//!
//! Invoked only after the engine reaches a terminal state; nothing here
//! mutates or reinterprets the transcript.

use crate::debate::transcript::{DebateTranscript, ModelResponse, RoundKind};
use crate::store::TranscriptSummary;

/// Plain-text rendering for the terminal.
pub fn render_terminal(transcript: &DebateTranscript, verbose: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("Query: {}\n", transcript.query));
    out.push_str(&format!(
        "Panel: {} | synthesizer: {} | transcript: {}\n",
        transcript.panel.join(", "),
        transcript.synthesizer_id,
        transcript.id
    ));

    for round in &transcript.rounds {
        out.push_str(&format!(
            "\n=== {} ===\n",
            round_heading(round.round_type, round.round_number)
        ));
        for response in &round.responses {
            out.push_str(&format!("\n--- {} ---\n", response.display_name));
            match &response.error {
                None => {
                    out.push_str(&response.content);
                    out.push('\n');
                    if verbose {
                        out.push_str(&slot_stats(response));
                    }
                }
                Some(failure) => {
                    out.push_str(&format!("(failed: {} - {})\n", failure.kind, failure.message));
                }
            }
        }
    }

    out.push_str("\n=== Synthesis ===\n");
    match (&transcript.synthesis, &transcript.synthesis_error) {
        (Some(synthesis), _) => {
            out.push_str(&format!("\n--- {} ---\n", synthesis.display_name));
            out.push_str(&synthesis.content);
            out.push('\n');
            if verbose {
                out.push_str(&slot_stats(synthesis));
            }
        }
        (None, Some(failure)) => {
            out.push_str(&format!(
                "(synthesis failed: {} - {})\n",
                failure.kind, failure.message
            ));
        }
        (None, None) => out.push_str("(no synthesis recorded)\n"),
    }

    if let Some(ground_truth) = &transcript.ground_truth {
        out.push_str(&format!("\n=== Ground truth ===\n{ground_truth}\n"));
    }
    out
}

/// Markdown rendering, for piping into notes or issues.
pub fn render_markdown(transcript: &DebateTranscript) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Debate: {}\n\n", transcript.query));
    out.push_str(&format!(
        "- Panel: {}\n- Synthesizer: {}\n- Transcript: `{}`\n- Created: {}\n",
        transcript.panel.join(", "),
        transcript.synthesizer_id,
        transcript.id,
        transcript.created_at.to_rfc3339()
    ));

    for round in &transcript.rounds {
        out.push_str(&format!(
            "\n## {}\n",
            round_heading(round.round_type, round.round_number)
        ));
        for response in &round.responses {
            out.push_str(&format!("\n### {}\n\n", response.display_name));
            match &response.error {
                None => out.push_str(&format!("{}\n", response.content)),
                Some(failure) => {
                    out.push_str(&format!("*Failed: {} - {}*\n", failure.kind, failure.message))
                }
            }
        }
    }

    out.push_str("\n## Synthesis\n\n");
    match (&transcript.synthesis, &transcript.synthesis_error) {
        (Some(synthesis), _) => out.push_str(&format!("{}\n", synthesis.content)),
        (None, Some(failure)) => out.push_str(&format!(
            "*Synthesis failed: {} - {}*\n",
            failure.kind, failure.message
        )),
        (None, None) => out.push_str("*No synthesis recorded.*\n"),
    }

    if let Some(ground_truth) = &transcript.ground_truth {
        out.push_str(&format!("\n## Ground truth\n\n{ground_truth}\n"));
    }
    out
}

/// The exact stored JSON shape.
pub fn render_json(transcript: &DebateTranscript) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(transcript)
}

/// One line per stored transcript for `list`.
pub fn render_listing(summaries: &[TranscriptSummary]) -> String {
    if summaries.is_empty() {
        return "No stored transcripts.\n".to_string();
    }
    let mut out = String::new();
    for summary in summaries {
        let query = truncate(&summary.query, 60);
        let synthesis = if summary.has_synthesis { "" } else { " [no synthesis]" };
        out.push_str(&format!(
            "{}  {}  {} rounds  [{}]{}  {}\n",
            &summary.id[..summary.id.len().min(8)],
            summary.created_at.format("%Y-%m-%d %H:%M"),
            summary.rounds,
            summary.panel.join(","),
            synthesis,
            query
        ));
    }
    out
}

fn round_heading(kind: RoundKind, round_number: i32) -> String {
    match kind {
        RoundKind::Initial => "Round 0 (initial answers)".to_string(),
        RoundKind::Reflection => format!("Round {round_number} (reflection)"),
        RoundKind::Synthesis => "Synthesis".to_string(),
    }
}

fn slot_stats(response: &ModelResponse) -> String {
    let latency = response
        .latency_ms
        .map(|ms| format!("{:.1}s", ms as f64 / 1000.0))
        .unwrap_or_else(|| "-".to_string());
    let tokens = response
        .token_count
        .map(|t| t.to_string())
        .unwrap_or_else(|| "-".to_string());
    let route = response
        .routing
        .as_ref()
        .map(|r| {
            format!(
                ", via {}",
                if r.via_openrouter { "openrouter" } else { r.vendor.as_str() }
            )
        })
        .unwrap_or_default();
    format!("[latency {latency}, tokens {tokens}{route}]\n")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::transcript::{DebateRound, ModelFailure, SYNTHESIS_ROUND};
    use crate::providers::FailureKind;

    fn transcript() -> DebateTranscript {
        let mut t =
            DebateTranscript::new("Why is the sky blue?", vec!["a".into(), "b".into()], "a", 1);
        t.push_round(DebateRound::new(
            0,
            vec![
                ModelResponse::success("a", "Claude", 0, "scattering", Some(40), 1200),
                ModelResponse::failure(
                    "b",
                    "GPT",
                    0,
                    ModelFailure {
                        kind: FailureKind::RateLimited,
                        message: "429".into(),
                    },
                ),
            ],
        ))
        .unwrap();
        t
    }

    #[test]
    fn test_terminal_shows_rounds_failures_and_missing_synthesis() {
        let rendered = render_terminal(&transcript(), false);
        assert!(rendered.contains("Why is the sky blue?"));
        assert!(rendered.contains("Round 0 (initial answers)"));
        assert!(rendered.contains("scattering"));
        assert!(rendered.contains("failed: rate_limited"));
        assert!(rendered.contains("no synthesis recorded"));
    }

    #[test]
    fn test_terminal_verbose_adds_stats() {
        let rendered = render_terminal(&transcript(), true);
        assert!(rendered.contains("latency 1.2s"));
        assert!(rendered.contains("tokens 40"));
    }

    #[test]
    fn test_terminal_shows_synthesis_failure() {
        let mut t = transcript();
        t.record_synthesis_failure(ModelFailure {
            kind: FailureKind::Timeout,
            message: "too slow".into(),
        })
        .unwrap();
        let rendered = render_terminal(&t, false);
        assert!(rendered.contains("synthesis failed: timeout"));
    }

    #[test]
    fn test_markdown_structure() {
        let mut t = transcript();
        t.set_synthesis(ModelResponse::success(
            "a",
            "Claude",
            SYNTHESIS_ROUND,
            "the final word",
            None,
            900,
        ))
        .unwrap();
        t.ground_truth = Some("Rayleigh scattering".into());

        let rendered = render_markdown(&t);
        assert!(rendered.starts_with("# Debate: Why is the sky blue?"));
        assert!(rendered.contains("## Round 0 (initial answers)"));
        assert!(rendered.contains("### Claude"));
        assert!(rendered.contains("the final word"));
        assert!(rendered.contains("## Ground truth"));
    }

    #[test]
    fn test_json_round_trips() {
        let t = transcript();
        let json = render_json(&t).unwrap();
        let back: DebateTranscript = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, t.id);
    }

    #[test]
    fn test_listing_formats_and_truncates() {
        let summary = TranscriptSummary {
            id: "0123456789abcdef".into(),
            query: "q".repeat(100),
            panel: vec!["a".into(), "b".into()],
            rounds: 2,
            has_synthesis: false,
            created_at: chrono::Utc::now(),
        };
        let rendered = render_listing(&[summary]);
        assert!(rendered.contains("01234567"));
        assert!(rendered.contains("[a,b]"));
        assert!(rendered.contains("[no synthesis]"));
        assert!(rendered.contains("..."));

        assert_eq!(render_listing(&[]), "No stored transcripts.\n");
    }
}
