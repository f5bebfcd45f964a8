//! Scenario runner — drives the fixed LSP lifecycle against a server.
//!
//! The step sequence is initialize (request), initialized (notification),
//! didOpen (notification), semanticTokens/full (request), shutdown (request),
//! exit (notification). Notifications are fire-and-forget: state advances
//! immediately because they have no response by protocol contract.
//!
//! [`Scenario::drive`] is generic over the session's streams so the same
//! logic runs against a child process and against scripted in-memory servers
//! in tests; [`ScenarioRunner`] wraps it with process spawn, bounded exit
//! collection, stderr capture, and the guarantee that no child survives a
//! failed run.

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::process::Command;

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::protocol::{
    self, InitializeResult, ResponsePayload, SemanticTokensLegend, SemanticTokensResult,
};
use crate::session::Session;
use crate::tokens::{self, TokenSpan};
use crate::verify::{self, VerificationRecord};

/// Lifecycle states, in the order a successful run visits them.
/// `Failed` is terminal and reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    NotStarted,
    Initializing,
    Initialized,
    DocumentOpen,
    TokensRequested,
    TokensReceived,
    ShuttingDown,
    Exited,
    Failed,
}

impl ScenarioState {
    /// The step a failure in this state gets attributed to.
    #[must_use]
    pub fn step_label(self) -> &'static str {
        match self {
            Self::NotStarted => "spawn",
            Self::Initializing => "initialize",
            Self::Initialized => "initialized",
            Self::DocumentOpen => "textDocument/didOpen",
            Self::TokensRequested => "textDocument/semanticTokens/full",
            Self::TokensReceived => "decode/verify",
            Self::ShuttingDown => "shutdown",
            Self::Exited => "exit",
            Self::Failed => "failed",
        }
    }
}

/// The document the harness synthesizes a didOpen event for.
/// Immutable once built; no edit operation is exercised in this scope.
#[derive(Debug, Clone)]
pub struct Document {
    pub uri: String,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

impl Document {
    #[must_use]
    pub fn new(uri: String, language_id: String, text: String) -> Self {
        Self {
            uri,
            language_id,
            version: 1,
            text,
        }
    }
}

/// One completed lifecycle step with a human-readable detail line.
#[derive(Debug)]
pub struct StepReport {
    name: &'static str,
    detail: String,
}

impl StepReport {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

/// Everything a scenario run produced. Owned solely by the runner.
#[derive(Debug)]
pub struct ScenarioResult {
    state: ScenarioState,
    steps: Vec<StepReport>,
    legend: SemanticTokensLegend,
    spans: Vec<TokenSpan>,
    records: Vec<VerificationRecord>,
    failure: Option<String>,
    server_stderr: String,
    /// Whether the failure class demands an immediate kill rather than a
    /// graceful wait.
    kill_immediately: bool,
}

impl ScenarioResult {
    fn new() -> Self {
        Self {
            state: ScenarioState::NotStarted,
            steps: Vec::new(),
            legend: SemanticTokensLegend::default(),
            spans: Vec::new(),
            records: Vec::new(),
            failure: None,
            server_stderr: String::new(),
            kill_immediately: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> ScenarioState {
        self.state
    }

    #[must_use]
    pub fn steps(&self) -> &[StepReport] {
        &self.steps
    }

    #[must_use]
    pub fn legend(&self) -> &SemanticTokensLegend {
        &self.legend
    }

    #[must_use]
    pub fn spans(&self) -> &[TokenSpan] {
        &self.spans
    }

    #[must_use]
    pub fn records(&self) -> &[VerificationRecord] {
        &self.records
    }

    /// Step-labeled failure message, if the scenario failed.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    #[must_use]
    pub fn server_stderr(&self) -> &str {
        &self.server_stderr
    }

    /// Spans the verifier flagged (overflow, out of bounds, invalid line).
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_ok()).count()
    }

    /// A run succeeds when it reached `Exited` with no fatal error.
    /// Verification warnings do not fail a run; they are its findings.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.state == ScenarioState::Exited
    }

    fn step(&mut self, name: &'static str, detail: String) {
        self.steps.push(StepReport { name, detail });
    }

    fn fail(&mut self, error: &HarnessError) {
        self.failure = Some(format!("{}: {error}", self.state.step_label()));
        self.kill_immediately = error.requires_kill();
        self.state = ScenarioState::Failed;
    }
}

/// The transport-generic half of the runner: the fixed call sequence.
pub struct Scenario {
    document: Document,
}

impl Scenario {
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    /// Execute the lifecycle over an established session.
    ///
    /// Always returns a result; fatal errors are recorded in it with the
    /// step they occurred at. Ends in `Exited` after the exit notification —
    /// collecting the process itself is [`ScenarioRunner`]'s job.
    pub async fn drive<R, W>(&self, session: &mut Session<R, W>) -> ScenarioResult
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut result = ScenarioResult::new();
        if let Err(error) = self.drive_inner(session, &mut result).await {
            tracing::warn!(step = result.state.step_label(), %error, "scenario failed");
            result.fail(&error);
        }
        result
    }

    async fn drive_inner<R, W>(
        &self,
        session: &mut Session<R, W>,
        result: &mut ScenarioResult,
    ) -> Result<(), HarnessError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        result.state = ScenarioState::Initializing;
        let payload = session
            .request("initialize", Some(protocol::initialize_params(None)))
            .await?;
        let value = payload.require_success("initialize")?;
        let init: InitializeResult =
            serde_json::from_value(value).map_err(|e| HarnessError::Protocol {
                detail: format!("initialize result does not match expected shape: {e}"),
            })?;

        match init.capabilities.semantic_tokens_provider {
            Some(provider) => {
                result.step(
                    "initialize",
                    format!(
                        "legend: {} token types, {} modifiers",
                        provider.legend.token_types.len(),
                        provider.legend.token_modifiers.len()
                    ),
                );
                result.legend = provider.legend;
            }
            None => {
                tracing::warn!("server advertises no semanticTokensProvider");
                result.step(
                    "initialize",
                    "no semanticTokensProvider advertised; token types will be unlabeled"
                        .to_string(),
                );
            }
        }

        result.state = ScenarioState::Initialized;
        session
            .send_notification("initialized", Some(serde_json::json!({})))
            .await?;
        result.step("initialized", "notification sent".to_string());

        // State moves before each send so a write failure is attributed to
        // the step being performed, same as the requests above.
        result.state = ScenarioState::DocumentOpen;
        session
            .send_notification(
                "textDocument/didOpen",
                Some(protocol::did_open_params(
                    &self.document.uri,
                    &self.document.language_id,
                    self.document.version,
                    &self.document.text,
                )),
            )
            .await?;
        result.step(
            "textDocument/didOpen",
            format!(
                "{} ({} chars)",
                self.document.uri,
                self.document.text.chars().count()
            ),
        );

        result.state = ScenarioState::TokensRequested;
        let payload = session
            .request(
                "textDocument/semanticTokens/full",
                Some(protocol::semantic_tokens_params(&self.document.uri)),
            )
            .await?;
        let value = payload.require_success("textDocument/semanticTokens/full")?;
        let tokens_result: SemanticTokensResult =
            serde_json::from_value(value).map_err(|e| HarnessError::Protocol {
                detail: format!("semanticTokens/full result does not match expected shape: {e}"),
            })?;
        result.state = ScenarioState::TokensReceived;
        result.step(
            "textDocument/semanticTokens/full",
            format!(
                "{} values ({} tokens)",
                tokens_result.data.len(),
                tokens_result.data.len() / 5
            ),
        );

        let spans = match tokens::decode(&tokens_result.data) {
            Ok(spans) => spans,
            Err(error) => {
                // A payload defect, not a transport fault: the server is
                // still coherent enough to shut down before we report.
                let _ = self.graceful_exit(session, result).await;
                result.state = ScenarioState::TokensReceived;
                return Err(error.into());
            }
        };
        let records = verify::verify(&spans, &self.document.text);
        let ok_count = records.iter().filter(|r| r.is_ok()).count();
        result.step(
            "decode/verify",
            format!(
                "{} spans, {} ok, {} flagged",
                spans.len(),
                ok_count,
                spans.len() - ok_count
            ),
        );
        result.spans = spans;
        result.records = records;

        self.graceful_exit(session, result).await?;
        result.state = ScenarioState::Exited;
        Ok(())
    }

    /// shutdown request + exit notification. A server error on shutdown is
    /// logged and ignored; only initialize and semanticTokens/full require
    /// success.
    async fn graceful_exit<R, W>(
        &self,
        session: &mut Session<R, W>,
        result: &mut ScenarioResult,
    ) -> Result<(), HarnessError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        result.state = ScenarioState::ShuttingDown;
        match session.request("shutdown", None).await? {
            ResponsePayload::Result(_) => result.step("shutdown", "ok".to_string()),
            ResponsePayload::Error { code, message } => {
                tracing::warn!(code, %message, "server rejected shutdown; proceeding to exit");
                result.step("shutdown", format!("server error {code}: {message} (ignored)"));
            }
        }
        session.send_notification("exit", None).await?;
        result.step("exit", "notification sent".to_string());
        Ok(())
    }
}

/// Owns the child process for the scenario's duration: spawn, three piped
/// streams, bounded exit collection, kill on every failure path.
pub struct ScenarioRunner {
    config: HarnessConfig,
}

impl ScenarioRunner {
    #[must_use]
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Run the full scenario against a freshly spawned server.
    pub async fn run(&self, document: Document) -> ScenarioResult {
        let mut child = match Command::new(&self.config.server)
            .args(&self.config.server_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let mut result = ScenarioResult::new();
                result.fail(&HarnessError::Spawn(e));
                return result;
            }
        };
        tracing::info!(server = %self.config.server.display(), "spawned language server");

        let (stdout, stdin) = match (child.stdout.take(), child.stdin.take()) {
            (Some(stdout), Some(stdin)) => (stdout, stdin),
            _ => {
                let mut result = ScenarioResult::new();
                result.fail(&HarnessError::Spawn(std::io::Error::other(
                    "child stdio not captured",
                )));
                let _ = child.kill().await;
                return result;
            }
        };
        let stderr = child.stderr.take();

        let mut session = Session::new(stdout, stdin, self.config.request_timeout);
        let scenario = Scenario::new(document);
        let mut result = scenario.drive(&mut session).await;

        // Closes the server's stdin; a compliant server exits on the exit
        // notification, a wedged one hits the bounded wait below.
        drop(session);

        if result.failure.is_none() {
            match tokio::time::timeout(self.config.shutdown_timeout, child.wait()).await {
                Ok(Ok(status)) => {
                    result.step("process exit", status.to_string());
                }
                Ok(Err(e)) => {
                    result.fail(&HarnessError::Wait(e));
                    let _ = child.kill().await;
                }
                Err(_) => {
                    let error = HarnessError::ShutdownTimeout {
                        seconds: self.config.shutdown_timeout.as_secs(),
                    };
                    tracing::warn!(%error, "killing server");
                    let _ = child.kill().await;
                    result.fail(&error);
                }
            }
        } else if result.kill_immediately {
            let _ = child.kill().await;
        } else {
            // Graceful exit was already attempted; give it the bounded wait
            // before falling back to kill.
            if tokio::time::timeout(self.config.shutdown_timeout, child.wait())
                .await
                .is_err()
            {
                let _ = child.kill().await;
            }
        }

        if let Some(mut pipe) = stderr {
            let mut captured = String::new();
            let _ = tokio::time::timeout(
                self.config.shutdown_timeout,
                pipe.read_to_string(&mut captured),
            )
            .await;
            result.server_stderr = captured;
        }

        result
    }
}
