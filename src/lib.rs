//! Minimal LSP client harness for validating a language server's
//! semantic-token responses over stdio.
//!
//! The harness spawns the server, performs the initialize handshake, opens
//! one document, requests `textDocument/semanticTokens/full`, decodes the
//! delta stream into absolute spans, cross-references each span against the
//! document text, then drives shutdown/exit and captures the server's
//! stderr stream.

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod report;
pub mod scenario;
pub mod session;
pub mod tokens;
pub mod verify;

pub use config::HarnessConfig;
pub use error::{FramingError, HarnessError, MalformedTokenStreamError};
pub use scenario::{Document, Scenario, ScenarioResult, ScenarioRunner, ScenarioState};
pub use session::Session;
pub use tokens::{TokenSpan, decode, encode};
pub use verify::{SpanOutcome, VerificationRecord, verify};
