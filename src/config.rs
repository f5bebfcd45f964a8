//! Harness configuration — server command, document source, timeouts.
//!
//! Resolved from CLI arguments with an environment fallback for the server
//! path. The document defaults to an embedded sample so the harness runs
//! against a freshly built server with no fixture on disk.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::protocol;
use crate::scenario::Document;

pub const USAGE: &str = "\
Usage: lsp-harness [options] <server-binary> [server-args...]

Options:
  --debug                      print the server's captured stderr stream
  --file <path>                document to open (default: embedded sample)
  --language-id <id>           languageId sent in didOpen (default: plaintext)
  --timeout-secs <n>           per-request response timeout (default: 30)
  --shutdown-timeout-secs <n>  wait for server exit after `exit` (default: 2)

The server binary may also be set via the LSP_HARNESS_SERVER environment
variable.";

/// Built-in document opened when `--file` is not given.
const SAMPLE_TEXT: &str = "\
function greet(name)
    print(\"Hello, \" + name)
end

function factorial(n)
    if n <= 1 then
        return 1
    end
    return n * factorial(n - 1)
end
";

const SAMPLE_URI: &str = "file:///sample.txt";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 2;

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Path to the language server executable.
    pub server: PathBuf,
    /// Arguments passed through to the server.
    pub server_args: Vec<String>,
    /// Document to open; `None` selects the embedded sample.
    pub file: Option<PathBuf>,
    pub language_id: String,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
    /// Print the captured stderr stream in the report.
    pub debug: bool,
}

impl HarnessConfig {
    /// Parse configuration from CLI arguments (without the program name).
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut server: Option<PathBuf> = None;
        let mut server_args = Vec::new();
        let mut file = None;
        let mut language_id = "plaintext".to_string();
        let mut request_timeout = Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS);
        let mut shutdown_timeout = Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS);
        let mut debug = false;

        while let Some(arg) = args.next() {
            // Everything after the server binary belongs to the server.
            if server.is_some() {
                server_args.push(arg);
                continue;
            }
            match arg.as_str() {
                "--debug" => debug = true,
                "--file" => file = Some(PathBuf::from(required_value(&mut args, "--file")?)),
                "--language-id" => language_id = required_value(&mut args, "--language-id")?,
                "--timeout-secs" => {
                    request_timeout = Duration::from_secs(parse_seconds(
                        &required_value(&mut args, "--timeout-secs")?,
                        "--timeout-secs",
                    )?);
                }
                "--shutdown-timeout-secs" => {
                    shutdown_timeout = Duration::from_secs(parse_seconds(
                        &required_value(&mut args, "--shutdown-timeout-secs")?,
                        "--shutdown-timeout-secs",
                    )?);
                }
                flag if flag.starts_with("--") => bail!("unknown option: {flag}"),
                _ => server = Some(PathBuf::from(arg)),
            }
        }

        let server = match server {
            Some(path) => path,
            None => match std::env::var("LSP_HARNESS_SERVER") {
                Ok(path) if !path.is_empty() => PathBuf::from(path),
                _ => bail!("no server binary given"),
            },
        };

        Ok(Self {
            server,
            server_args,
            file,
            language_id,
            request_timeout,
            shutdown_timeout,
            debug,
        })
    }

    /// Build the document to open: the `--file` contents, or the embedded
    /// sample. A missing or unreadable file is a configuration failure.
    pub fn document(&self) -> Result<Document> {
        match &self.file {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading document {}", path.display()))?;
                let absolute = path
                    .canonicalize()
                    .with_context(|| format!("resolving document path {}", path.display()))?;
                let uri = protocol::path_to_file_uri(&absolute)?;
                Ok(Document::new(
                    uri.to_string(),
                    self.language_id.clone(),
                    text,
                ))
            }
            None => Ok(Document::new(
                SAMPLE_URI.to_string(),
                self.language_id.clone(),
                SAMPLE_TEXT.to_string(),
            )),
        }
    }
}

fn required_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next().with_context(|| format!("{flag} requires a value"))
}

fn parse_seconds(value: &str, flag: &str) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("{flag} expects a number of seconds, got {value:?}"))
}
