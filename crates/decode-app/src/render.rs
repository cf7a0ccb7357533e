//! Plain-text rendering of findings for the terminal.

use std::fmt::Write;

use decode_core::types::{Findings, NO_SUPPORTING_QUOTE};

/// Render `findings` as `Insight i: summary`, the insight text and its
/// supporting quotes. `sources` names each transcript by index.
pub fn render_text(findings: &Findings, sources: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Research question: {}", findings.question);

    if findings.insights.is_empty() {
        let _ = writeln!(out, "\nNo insights were generated.");
        return out;
    }

    for insight in &findings.insights {
        let _ = writeln!(out, "\nInsight {}: {}", insight.ordinal, insight.summary);
        let _ = writeln!(out, "{}", insight.text);
        let _ = writeln!(out, "Supporting quotes:");
        if insight.quotes.is_gap() {
            let _ = writeln!(out, "  - {}", NO_SUPPORTING_QUOTE);
            continue;
        }
        for quote in &insight.quotes {
            let source = sources
                .get(quote.transcript)
                .cloned()
                .unwrap_or_else(|| format!("transcript {}", quote.transcript + 1));
            let _ = writeln!(
                out,
                "  - \"{}\" ({}, similarity {:.2})",
                quote.text.split_whitespace().collect::<Vec<_>>().join(" "),
                source,
                quote.score
            );
        }
    }

    let gaps = findings.attribution_gaps();
    if gaps > 0 {
        let _ = writeln!(
            out,
            "\n{} of {} insights have no supporting quote.",
            gaps,
            findings.insights.len()
        );
    }
    out
}
