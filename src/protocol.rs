//! LSP message serde types and params builders for JSON-RPC communication.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub struct PathToUriError {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
pub(crate) struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    pub fn new(id: u64, method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// One inbound frame, classified by shape.
///
/// A frame with an `id` and a `result`/`error` is a response; with an `id`
/// and a `method` it is a server-initiated request; with only a `method` it
/// is a notification.
#[derive(Debug)]
pub enum Incoming {
    Response {
        id: u64,
        payload: ResponsePayload,
    },
    ServerRequest {
        id: serde_json::Value,
        method: String,
    },
    Notification {
        method: String,
        params: Option<serde_json::Value>,
    },
}

/// The meaningful half of a response: its result, or its error pair.
///
/// An error-shaped response is data, not a fault — whether it aborts the
/// scenario depends on which step it answers.
#[derive(Debug)]
pub enum ResponsePayload {
    Result(serde_json::Value),
    Error { code: i64, message: String },
}

impl ResponsePayload {
    /// Unwrap the result, mapping an error payload to
    /// [`HarnessError::ServerReported`](crate::error::HarnessError::ServerReported)
    /// for steps that require success.
    pub fn require_success(
        self,
        method: &'static str,
    ) -> Result<serde_json::Value, crate::error::HarnessError> {
        match self {
            Self::Result(value) => Ok(value),
            Self::Error { code, message } => Err(crate::error::HarnessError::ServerReported {
                method,
                code,
                message,
            }),
        }
    }
}

/// Classify a parsed frame. Returns `None` for frames that fit no JSON-RPC
/// shape (e.g. a response with a non-integer id, or neither method nor
/// result).
pub(crate) fn classify(frame: &serde_json::Value) -> Option<Incoming> {
    let id = frame.get("id");
    let method = frame
        .get("method")
        .and_then(|m| m.as_str())
        .map(String::from);
    let has_result_or_error = frame.get("result").is_some() || frame.get("error").is_some();

    match (id, method, has_result_or_error) {
        (Some(id_val), None, true) => {
            let payload = match frame.get("error") {
                Some(error) => ResponsePayload::Error {
                    code: error.get("code").and_then(serde_json::Value::as_i64)?,
                    message: error
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or_default()
                        .to_string(),
                },
                None => ResponsePayload::Result(
                    frame.get("result").cloned().unwrap_or(serde_json::Value::Null),
                ),
            };
            Some(Incoming::Response {
                id: id_val.as_u64()?,
                payload,
            })
        }
        (Some(id_val), Some(method), _) => Some(Incoming::ServerRequest {
            id: id_val.clone(),
            method,
        }),
        (None, Some(method), _) => Some(Incoming::Notification {
            method,
            params: frame.get("params").cloned(),
        }),
        _ => None,
    }
}

/// Reply for server-initiated requests we do not implement.
pub(crate) fn method_not_found(id: &serde_json::Value, method: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": -32601,
            "message": format!("Method not found: {method}")
        }
    })
}

pub(crate) fn initialize_params(root_uri: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "processId": std::process::id(),
        "rootUri": root_uri,
        "capabilities": {
            "textDocument": {
                "semanticTokens": {
                    "dynamicRegistration": false,
                    "requests": { "full": true }
                }
            }
        }
    })
}

pub(crate) fn did_open_params(
    uri: &str,
    language_id: &str,
    version: i32,
    text: &str,
) -> serde_json::Value {
    serde_json::json!({
        "textDocument": {
            "uri": uri,
            "languageId": language_id,
            "version": version,
            "text": text
        }
    })
}

pub(crate) fn semantic_tokens_params(uri: &str) -> serde_json::Value {
    serde_json::json!({
        "textDocument": { "uri": uri }
    })
}

/// `initialize` result, reduced to the capability this harness inspects.
#[derive(Debug, Default, Deserialize)]
pub struct InitializeResult {
    #[serde(default)]
    pub capabilities: ServerCapabilities,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    pub semantic_tokens_provider: Option<SemanticTokensProvider>,
}

#[derive(Debug, Deserialize)]
pub struct SemanticTokensProvider {
    #[serde(default)]
    pub legend: SemanticTokensLegend,
}

/// The legend advertised at initialize: token type indices in the data
/// stream index into `token_types`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticTokensLegend {
    #[serde(default)]
    pub token_types: Vec<String>,
    #[serde(default)]
    pub token_modifiers: Vec<String>,
}

impl SemanticTokensLegend {
    /// Human label for a token type index; out-of-range indices (and
    /// negative ones from a misbehaving server) render as `unknown(<n>)`.
    #[must_use]
    pub fn type_label(&self, token_type: i64) -> String {
        usize::try_from(token_type)
            .ok()
            .and_then(|idx| self.token_types.get(idx))
            .cloned()
            .unwrap_or_else(|| format!("unknown({token_type})"))
    }
}

/// `textDocument/semanticTokens/full` result: the flat delta-encoded stream.
///
/// Values are signed so a misbehaving server's negative deltas survive into
/// the decoder instead of failing deserialization.
#[derive(Debug, Default, Deserialize)]
pub struct SemanticTokensResult {
    #[serde(default)]
    pub data: Vec<i64>,
}

pub(crate) fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}
