//! Semantic token delta decoding.
//!
//! The wire format is a flat integer stream, five values per token:
//! `(deltaLine, deltaChar, length, tokenType, modifiers)`. Positions are
//! relative to the previous token: a zero `deltaLine` keeps the line and
//! advances the column by `deltaChar`; a positive `deltaLine` advances the
//! line and makes `deltaChar` the absolute column. The accumulators are
//! local to one decode call; nothing persists between calls.
//!
//! Fields are signed: a misbehaving server's negative deltas decode
//! structurally and are flagged by [`crate::verify`] instead of failing here.

use crate::error::MalformedTokenStreamError;

/// One decoded token at an absolute position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    /// 0-indexed line.
    pub line: i64,
    /// 0-indexed column.
    pub column: i64,
    pub length: i64,
    /// Index into the legend advertised at initialize.
    pub token_type: i64,
    /// Modifier bitmask.
    pub modifiers: i64,
}

/// Decode a flat delta stream into absolute spans, preserving input order.
///
/// The protocol already guarantees ascending (line, column) order, so the
/// decoder does not re-sort. Fails only when the length is not a multiple
/// of five.
pub fn decode(data: &[i64]) -> Result<Vec<TokenSpan>, MalformedTokenStreamError> {
    if data.len() % 5 != 0 {
        return Err(MalformedTokenStreamError { len: data.len() });
    }

    let mut line = 0i64;
    let mut column = 0i64;
    let mut spans = Vec::with_capacity(data.len() / 5);

    for tuple in data.chunks_exact(5) {
        let (delta_line, delta_char, length, token_type, modifiers) =
            (tuple[0], tuple[1], tuple[2], tuple[3], tuple[4]);

        // Wrapping: extreme deltas from a defective server decode to
        // nonsense positions for the verifier to flag, not a panic.
        if delta_line == 0 {
            column = column.wrapping_add(delta_char);
        } else {
            line = line.wrapping_add(delta_line);
            column = delta_char;
        }

        spans.push(TokenSpan {
            line,
            column,
            length,
            token_type,
            modifiers,
        });
    }

    Ok(spans)
}

/// Re-encode absolute spans with the inverse delta rule.
///
/// `encode(&decode(data)?) == data` for every valid stream; used to build
/// fixtures and to check decoded output against the wire form.
#[must_use]
pub fn encode(spans: &[TokenSpan]) -> Vec<i64> {
    let mut data = Vec::with_capacity(spans.len() * 5);
    let mut prev_line = 0i64;
    let mut prev_column = 0i64;

    for span in spans {
        let delta_line = span.line - prev_line;
        let delta_char = if delta_line == 0 {
            span.column - prev_column
        } else {
            span.column
        };
        data.extend_from_slice(&[
            delta_line,
            delta_char,
            span.length,
            span.token_type,
            span.modifiers,
        ]);
        prev_line = span.line;
        prev_column = span.column;
    }

    data
}
