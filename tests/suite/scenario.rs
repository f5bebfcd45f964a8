//! Scenario lifecycle tests against scripted in-memory servers.

use lsp_harness::report;
use lsp_harness::{Document, Scenario, ScenarioState, SpanOutcome};

use crate::common::ScriptedServer;

fn doc(text: &str) -> Document {
    Document::new(
        "file:///test.txt".to_string(),
        "plaintext".to_string(),
        text.to_string(),
    )
}

#[tokio::test]
async fn test_compliant_server_yields_clean_pass() {
    let mut server = ScriptedServer {
        // "ab" on line 0, "cd" on line 1
        token_data: vec![0, 0, 2, 0, 0, 1, 0, 2, 1, 0],
        legend_types: vec!["keyword", "function"],
        ..ScriptedServer::default()
    }
    .spawn();

    let result = Scenario::new(doc("ab\ncd")).drive(&mut server.session).await;

    assert!(result.succeeded(), "failure: {:?}", result.failure());
    assert_eq!(result.state(), ScenarioState::Exited);
    assert_eq!(result.spans().len(), 2);
    assert_eq!(result.warning_count(), 0);

    let texts: Vec<_> = result
        .records()
        .iter()
        .map(|r| match r.outcome() {
            SpanOutcome::Ok(text) => text.clone(),
            other => panic!("expected Ok, got {other:?}"),
        })
        .collect();
    assert_eq!(texts, vec!["ab", "cd"]);

    assert_eq!(result.legend().type_label(0), "keyword");
    assert_eq!(result.legend().type_label(1), "function");

    // Full fixed sequence, in order.
    server.handle.await.unwrap();
    let methods = server.methods.lock().unwrap().clone();
    assert_eq!(
        methods,
        vec![
            "initialize",
            "initialized",
            "textDocument/didOpen",
            "textDocument/semanticTokens/full",
            "shutdown",
            "exit",
        ]
    );
}

#[tokio::test]
async fn test_server_without_token_provider_still_runs() {
    let mut server = ScriptedServer {
        advertise_tokens: false,
        token_data: vec![0, 0, 2, 5, 0],
        ..ScriptedServer::default()
    }
    .spawn();

    let result = Scenario::new(doc("ab")).drive(&mut server.session).await;

    assert!(result.succeeded(), "failure: {:?}", result.failure());
    // No legend advertised: labels fall back.
    assert_eq!(result.legend().type_label(5), "unknown(5)");
    server.handle.await.unwrap();
}

#[tokio::test]
async fn test_stdout_closed_after_initialize_is_framing_failure() {
    let mut server = ScriptedServer {
        drop_output_after_initialize: true,
        ..ScriptedServer::default()
    }
    .spawn();

    let result = Scenario::new(doc("ab")).drive(&mut server.session).await;

    assert_eq!(result.state(), ScenarioState::Failed);
    let failure = result.failure().unwrap();
    assert!(
        failure.starts_with("textDocument/semanticTokens/full:"),
        "failure attributed to the wrong step: {failure}"
    );
    assert!(failure.contains("framing"), "not a framing failure: {failure}");
}

#[tokio::test]
async fn test_error_on_initialize_is_fatal() {
    let mut server = ScriptedServer {
        fail_on: Some("initialize"),
        ..ScriptedServer::default()
    }
    .spawn();

    let result = Scenario::new(doc("ab")).drive(&mut server.session).await;

    assert_eq!(result.state(), ScenarioState::Failed);
    let failure = result.failure().unwrap();
    assert!(failure.starts_with("initialize:"));
    assert!(failure.contains("initialize refused"));
}

#[tokio::test]
async fn test_error_on_tokens_is_fatal() {
    let mut server = ScriptedServer {
        fail_on: Some("textDocument/semanticTokens/full"),
        ..ScriptedServer::default()
    }
    .spawn();

    let result = Scenario::new(doc("ab")).drive(&mut server.session).await;

    assert_eq!(result.state(), ScenarioState::Failed);
    assert!(
        result
            .failure()
            .unwrap()
            .contains("token computation failed")
    );
}

#[tokio::test]
async fn test_error_on_shutdown_is_not_fatal() {
    let mut server = ScriptedServer {
        fail_on: Some("shutdown"),
        token_data: vec![0, 0, 2, 0, 0],
        ..ScriptedServer::default()
    }
    .spawn();

    let result = Scenario::new(doc("ab")).drive(&mut server.session).await;

    assert!(result.succeeded(), "failure: {:?}", result.failure());
    assert!(
        result
            .steps()
            .iter()
            .any(|s| s.name() == "shutdown" && s.detail().contains("ignored"))
    );

    // exit is still sent after a refused shutdown
    server.handle.await.unwrap();
    let methods = server.methods.lock().unwrap().clone();
    assert_eq!(methods.last().map(String::as_str), Some("exit"));
}

#[tokio::test]
async fn test_malformed_token_stream_fails_after_graceful_exit() {
    let mut server = ScriptedServer {
        token_data: vec![0, 0, 5, 18, 0, 0, 6], // length 7
        ..ScriptedServer::default()
    }
    .spawn();

    let result = Scenario::new(doc("ab")).drive(&mut server.session).await;

    assert_eq!(result.state(), ScenarioState::Failed);
    let failure = result.failure().unwrap();
    assert!(failure.starts_with("decode/verify:"), "{failure}");
    assert!(failure.contains("not a multiple of five"));

    // The decode failure is a payload defect; shutdown/exit still ran.
    server.handle.await.unwrap();
    let methods = server.methods.lock().unwrap().clone();
    assert!(methods.contains(&"shutdown".to_string()));
    assert!(methods.contains(&"exit".to_string()));
}

#[tokio::test]
async fn test_server_request_mid_scenario_is_answered() {
    let mut server = ScriptedServer {
        request_before_tokens: true,
        token_data: vec![0, 0, 2, 0, 0],
        ..ScriptedServer::default()
    }
    .spawn();

    let result = Scenario::new(doc("ab")).drive(&mut server.session).await;

    // The scripted server asserts it got a -32601 reply before responding.
    assert!(result.succeeded(), "failure: {:?}", result.failure());
    server.handle.await.unwrap();
}

#[tokio::test]
async fn test_verification_warnings_do_not_fail_the_run() {
    let mut server = ScriptedServer {
        // span overruns line 0; span on a line past the document
        token_data: vec![0, 0, 99, 0, 0, 7, 0, 1, 0, 0],
        ..ScriptedServer::default()
    }
    .spawn();

    let result = Scenario::new(doc("ab\ncd")).drive(&mut server.session).await;

    assert!(result.succeeded(), "failure: {:?}", result.failure());
    assert_eq!(result.warning_count(), 2);
    assert!(matches!(
        result.records()[0].outcome(),
        SpanOutcome::Overflow(_)
    ));
    assert_eq!(*result.records()[1].outcome(), SpanOutcome::InvalidLine);
}

#[tokio::test]
async fn test_report_renders_pass_with_token_table() {
    let mut server = ScriptedServer {
        token_data: vec![0, 0, 2, 0, 0, 1, 0, 2, 1, 0],
        legend_types: vec!["keyword", "function"],
        ..ScriptedServer::default()
    }
    .spawn();

    let result = Scenario::new(doc("ab\ncd")).drive(&mut server.session).await;
    let rendered = report::render(&result, false);

    assert!(rendered.contains("Scenario: PASS"));
    assert!(rendered.contains("Decoded tokens:"));
    assert!(rendered.contains("'ab'"));
    assert!(rendered.contains("function"));
    assert!(!rendered.contains("Server stderr"));
}

#[tokio::test]
async fn test_report_renders_step_labeled_failure() {
    let mut server = ScriptedServer {
        fail_on: Some("initialize"),
        ..ScriptedServer::default()
    }
    .spawn();

    let result = Scenario::new(doc("ab")).drive(&mut server.session).await;
    let rendered = report::render(&result, false);

    assert!(rendered.contains("Scenario: FAIL"));
    assert!(rendered.contains("Failure: initialize:"));
}
