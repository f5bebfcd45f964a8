//! Human-readable rendering of a scenario result.
//!
//! Layout follows the token table a reviewer actually reads: absolute
//! position, length, legend-labeled type, and the text the span covers in
//! the document — with flagged spans marked inline. The captured stderr
//! stream is appended when `--debug` is set, and always on failure.

use std::fmt::Write as _;

use crate::protocol::SemanticTokensLegend;
use crate::scenario::ScenarioResult;
use crate::verify::{SpanOutcome, VerificationRecord};

#[must_use]
pub fn render(result: &ScenarioResult, debug: bool) -> String {
    let mut out = String::new();

    let verdict = if result.succeeded() { "PASS" } else { "FAIL" };
    let _ = writeln!(out, "Scenario: {verdict}");

    if !result.steps().is_empty() {
        let _ = writeln!(out, "\nSteps:");
        for step in result.steps() {
            let _ = writeln!(out, "  {:<36} {}", step.name(), step.detail());
        }
    }

    if let Some(failure) = result.failure() {
        let _ = writeln!(out, "\nFailure: {failure}");
    }

    if !result.records().is_empty() {
        let _ = writeln!(out, "\nDecoded tokens:");
        out.push_str(&token_table(result.records(), result.legend()));

        let flagged = result.warning_count();
        if flagged > 0 {
            let _ = writeln!(out, "\nWarnings: {flagged} span(s) flagged");
        }
    }

    if (debug || result.failure().is_some()) && !result.server_stderr().is_empty() {
        let _ = writeln!(out, "\nServer stderr:");
        for line in result.server_stderr().lines() {
            let _ = writeln!(out, "  {line}");
        }
    }

    out
}

fn token_table(records: &[VerificationRecord], legend: &SemanticTokensLegend) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4} {:>4} {:>4} | {:<16} | Text",
        "Line", "Col", "Len", "Type"
    );
    let _ = writeln!(out, "{}", "-".repeat(60));

    for record in records {
        let span = record.span();
        let text = match record.outcome() {
            SpanOutcome::Ok(text) => format!("'{text}'"),
            SpanOutcome::Overflow(tail) => format!("'{tail}' [overflow]"),
            SpanOutcome::OutOfBounds => "[out of bounds]".to_string(),
            SpanOutcome::InvalidLine => "[invalid line]".to_string(),
        };
        let _ = writeln!(
            out,
            "{:>4} {:>4} {:>4} | {:<16} | {text}",
            span.line,
            span.column,
            span.length,
            legend.type_label(span.token_type),
        );
    }

    out
}
