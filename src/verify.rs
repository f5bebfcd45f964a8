//! Span verification — cross-references decoded spans against source text.
//!
//! The point is to surface server defects (wrong offsets, wrong lengths),
//! so verification never fails: every span gets a record, however malformed.

use crate::tokens::TokenSpan;

/// What a span covers when mapped onto the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanOutcome {
    /// The span fits its line; carries the covered text.
    Ok(String),
    /// The span starts inside the line but runs past its end; carries the
    /// available tail.
    Overflow(String),
    /// The column (or a negative column/length) falls outside the line.
    OutOfBounds,
    /// The line number does not exist in the source.
    InvalidLine,
}

/// One span paired with its verification outcome.
#[derive(Debug, Clone)]
pub struct VerificationRecord {
    span: TokenSpan,
    outcome: SpanOutcome,
}

impl VerificationRecord {
    #[must_use]
    pub fn span(&self) -> &TokenSpan {
        &self.span
    }

    #[must_use]
    pub fn outcome(&self) -> &SpanOutcome {
        &self.outcome
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, SpanOutcome::Ok(_))
    }

    /// Short marker for reports: `ok`, `overflow`, `out of bounds`,
    /// `invalid line`.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self.outcome {
            SpanOutcome::Ok(_) => "ok",
            SpanOutcome::Overflow(_) => "overflow",
            SpanOutcome::OutOfBounds => "out of bounds",
            SpanOutcome::InvalidLine => "invalid line",
        }
    }
}

/// Map each span onto the source, producing one record per span in order.
///
/// Lines split on `\n` with a trailing `\r` stripped, so CRLF and LF
/// sources verify identically. Columns and lengths count characters, the
/// same unit the positions were produced in.
#[must_use]
pub fn verify(spans: &[TokenSpan], source: &str) -> Vec<VerificationRecord> {
    let lines: Vec<&str> = source
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    spans
        .iter()
        .map(|span| VerificationRecord {
            span: *span,
            outcome: outcome_for(span, &lines),
        })
        .collect()
}

fn outcome_for(span: &TokenSpan, lines: &[&str]) -> SpanOutcome {
    let line = match usize::try_from(span.line).ok().and_then(|n| lines.get(n)) {
        Some(line) => *line,
        None => return SpanOutcome::InvalidLine,
    };

    // Negative columns and lengths come from malformed delta streams.
    let (Ok(column), Ok(length)) = (usize::try_from(span.column), usize::try_from(span.length))
    else {
        return SpanOutcome::OutOfBounds;
    };

    let line_len = line.chars().count();
    if column.checked_add(length).is_some_and(|end| end <= line_len) {
        SpanOutcome::Ok(line.chars().skip(column).take(length).collect())
    } else if column < line_len {
        SpanOutcome::Overflow(line.chars().skip(column).collect())
    } else {
        SpanOutcome::OutOfBounds
    }
}
