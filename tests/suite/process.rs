//! Child-process lifecycle tests for the runner: spawn failures, servers
//! that die or hang, stderr capture. Unix-only since they script servers
//! with `/bin/sh`.

#![cfg(unix)]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use lsp_harness::{Document, HarnessConfig, ScenarioRunner, ScenarioState};

fn sh_config(script: &str) -> HarnessConfig {
    HarnessConfig {
        server: PathBuf::from("/bin/sh"),
        server_args: vec!["-c".to_string(), script.to_string()],
        file: None,
        language_id: "plaintext".to_string(),
        request_timeout: Duration::from_millis(300),
        shutdown_timeout: Duration::from_millis(300),
        debug: false,
    }
}

fn doc() -> Document {
    Document::new(
        "file:///test.txt".to_string(),
        "plaintext".to_string(),
        "ab\ncd".to_string(),
    )
}

#[tokio::test]
async fn test_missing_server_binary_fails_at_spawn() {
    let config = HarnessConfig {
        server: PathBuf::from("/nonexistent/langserver"),
        ..sh_config("")
    };

    let result = ScenarioRunner::new(config).run(doc()).await;

    assert_eq!(result.state(), ScenarioState::Failed);
    assert!(result.failure().unwrap().starts_with("spawn:"));
}

#[tokio::test]
async fn test_server_exiting_immediately_fails_the_handshake() {
    let result = ScenarioRunner::new(sh_config("exit 0")).run(doc()).await;

    assert_eq!(result.state(), ScenarioState::Failed);
    // The initialize write or read hits the closed pipe; either way the
    // failure is attributed to the handshake step.
    assert!(
        result.failure().unwrap().starts_with("initialize:"),
        "failure: {:?}",
        result.failure()
    );
}

#[tokio::test]
async fn test_silent_server_times_out_and_is_killed() {
    let started = Instant::now();
    let result = ScenarioRunner::new(sh_config("sleep 30")).run(doc()).await;

    assert_eq!(result.state(), ScenarioState::Failed);
    assert!(
        result.failure().unwrap().contains("no response to initialize"),
        "failure: {:?}",
        result.failure()
    );
    // Bounded by the request timeout plus shutdown handling, not the sleep.
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "runner hung on a silent server"
    );
}

#[tokio::test]
async fn test_server_that_never_exits_hits_the_shutdown_bound() {
    // Answers the whole request sequence up front (ids are deterministic),
    // then ignores the exit notification and hangs.
    let script = r#"
reply() { printf 'Content-Length: %s\r\n\r\n%s' "${#1}" "$1"; }
reply '{"jsonrpc":"2.0","id":1,"result":{"capabilities":{}}}'
reply '{"jsonrpc":"2.0","id":2,"result":{"data":[0,0,2,0,0]}}'
reply '{"jsonrpc":"2.0","id":3,"result":null}'
sleep 30
"#;

    let started = Instant::now();
    let result = ScenarioRunner::new(sh_config(script)).run(doc()).await;

    assert_eq!(result.state(), ScenarioState::Failed);
    assert!(
        result.failure().unwrap().contains("did not exit within"),
        "failure: {:?}",
        result.failure()
    );
    // The protocol itself completed before the hang.
    assert_eq!(result.spans().len(), 1);
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "runner hung on a server that ignores exit"
    );
}

#[tokio::test]
async fn test_server_stderr_is_captured() {
    let result = ScenarioRunner::new(sh_config("echo diagnostic-line >&2; exit 0"))
        .run(doc())
        .await;

    assert!(result.failure().is_some());
    assert!(
        result.server_stderr().contains("diagnostic-line"),
        "stderr not captured: {:?}",
        result.server_stderr()
    );
}
