//! Error taxonomy for the harness.
//!
//! Each variant maps to a distinct failure class with its own fatality rule:
//! framing, protocol, and correlation faults abort the scenario; a
//! server-reported error aborts only the steps that require success;
//! verification findings are not errors at all (see [`crate::verify`]).

use thiserror::Error;

/// Transport-level framing failures.
///
/// Produced by [`crate::codec`] when the byte stream cannot be carved into
/// complete `Content-Length`-delimited frames.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("stream closed while reading frame headers")]
    TruncatedHeader,

    #[error("stream closed after {read} of {expected} body bytes")]
    TruncatedBody { expected: usize, read: usize },

    #[error("missing Content-Length header")]
    MissingContentLength,

    #[error("invalid Content-Length value: {value:?}")]
    InvalidContentLength { value: String },

    #[error("Content-Length {length} exceeds maximum {max}")]
    Oversized { length: usize, max: usize },

    #[error("stream closed while a response was still expected")]
    UnexpectedEof,

    #[error("frame I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Token data whose flat length is not a multiple of five.
#[derive(Debug, Error)]
#[error("semantic token stream length {len} is not a multiple of five")]
pub struct MalformedTokenStreamError {
    pub len: usize,
}

/// Scenario-level errors, covering every fatal failure class.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("framing: {0}")]
    Framing(#[from] FramingError),

    /// The frame was delimited correctly but its body is not a JSON-RPC
    /// envelope this harness understands.
    #[error("protocol: {detail}")]
    Protocol { detail: String },

    /// A response arrived whose id matches no outstanding request.
    #[error("correlation: response id {id} does not match any outstanding request")]
    Correlation { id: u64 },

    /// The server answered a request with an `error` object.
    #[error("server reported error for {method}: {message} (code {code})")]
    ServerReported {
        method: &'static str,
        code: i64,
        message: String,
    },

    #[error(transparent)]
    MalformedTokenStream(#[from] MalformedTokenStreamError),

    #[error("no response to {method} within {seconds}s")]
    RequestTimeout { method: &'static str, seconds: u64 },

    #[error("server did not exit within {seconds}s of the exit notification")]
    ShutdownTimeout { seconds: u64 },

    #[error("failed to spawn server: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to collect server exit status: {0}")]
    Wait(#[source] std::io::Error),
}

impl HarnessError {
    /// Whether the server process must be killed before reporting.
    ///
    /// A malformed token stream is a payload defect, not a transport fault;
    /// the server is still well-behaved enough to shut down gracefully.
    #[must_use]
    pub fn requires_kill(&self) -> bool {
        !matches!(self, Self::MalformedTokenStream(_))
    }
}
