//! CLI entry point: parse arguments, run the scenario, print the report.
//!
//! Exit code 0 on a fully successful scenario, 1 on any failure — a missing
//! server binary, a missing document file, any protocol or decoding failure,
//! or an unhandled runtime fault.

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use lsp_harness::config::USAGE;
use lsp_harness::report;
use lsp_harness::{HarnessConfig, ScenarioRunner};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // Logs go to stderr; the report owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = match HarnessConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}\n\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    if !config.server.exists() {
        eprintln!(
            "error: language server not found at {}",
            config.server.display()
        );
        return ExitCode::FAILURE;
    }

    let document = match config.document() {
        Ok(document) => document,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let runner = ScenarioRunner::new(config.clone());
    let result = runner.run(document).await;

    print!("{}", report::render(&result, config.debug));

    if result.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
