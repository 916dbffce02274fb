//! Coding-assistant invocation.
//!
//! The [`Assistant`] trait is a single request/response call: a message and
//! an optional session token go in, the assistant's final JSON result and
//! the session token to resume with come out. [`ClaudeCli`] runs the
//! `claude` CLI in print mode inside the user's workspace.
//!
//! # Invocation
//!
//! ```text
//! claude -p <message> --output-format json --max-turns <N>
//!        --allowedTools Read,Write,Edit,Bash,Grep,Glob [--resume <session>]
//! ```
//!
//! The process runs with the workspace as its working directory and
//! `ANTHROPIC_API_KEY` in its environment. It is killed if it outlives
//! `[assistant].timeout_secs`.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::AssistantConfig;
use crate::error::{WorkspaceError, WorkspaceResult};

/// One chat turn sent to the assistant.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Working directory for the assistant (the user's workspace root).
    pub cwd: PathBuf,
    pub message: String,
    /// Session token from a previous [`ChatOutcome`].
    pub session_id: Option<String>,
}

/// Final result of a chat turn.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// The last JSON value the assistant emitted.
    pub result: Value,
    /// Token to pass as [`ChatRequest::session_id`] next time.
    pub session_id: Option<String>,
}

#[async_trait]
pub trait Assistant: Send + Sync {
    /// Cheap check that a chat could start at all, run before any workspace
    /// I/O.
    fn ready(&self) -> WorkspaceResult<()> {
        Ok(())
    }

    async fn chat(&self, request: ChatRequest) -> WorkspaceResult<ChatOutcome>;
}

/// Runs the `claude` CLI as a subprocess.
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    binary: String,
    api_key: Option<String>,
    max_turns: u32,
    allowed_tools: Vec<String>,
    timeout: Duration,
}

impl ClaudeCli {
    pub fn from_config(config: &AssistantConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            api_key: config.api_key.clone(),
            max_turns: config.max_turns,
            allowed_tools: config.allowed_tools.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn build_args(&self, request: &ChatRequest) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            request.message.clone(),
            "--output-format".to_string(),
            "json".to_string(),
            "--max-turns".to_string(),
            self.max_turns.to_string(),
            "--allowedTools".to_string(),
            self.allowed_tools.join(","),
        ];
        if let Some(session) = request.session_id.as_deref().filter(|s| !s.is_empty()) {
            args.push("--resume".to_string());
            args.push(session.to_string());
        }
        args
    }

    fn api_key(&self) -> WorkspaceResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            WorkspaceError::Config(
                "ANTHROPIC_API_KEY not configured; set the ANTHROPIC_API_KEY environment variable"
                    .to_string(),
            )
        })
    }
}

#[async_trait]
impl Assistant for ClaudeCli {
    fn ready(&self) -> WorkspaceResult<()> {
        self.api_key().map(|_| ())
    }

    async fn chat(&self, request: ChatRequest) -> WorkspaceResult<ChatOutcome> {
        let api_key = self.api_key()?;

        let mut command = tokio::process::Command::new(&self.binary);
        command
            .args(self.build_args(&request))
            .current_dir(&request.cwd)
            .env("ANTHROPIC_API_KEY", api_key)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs(),
                    cwd = %request.cwd.display(),
                    "assistant timed out"
                );
                return Err(WorkspaceError::Timeout(format!(
                    "assistant did not finish within {}s",
                    self.timeout.as_secs()
                )));
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkspaceError::Unavailable(format!(
                    "assistant binary not found: {}",
                    self.binary
                )));
            }
            Ok(Err(e)) => {
                return Err(WorkspaceError::Internal(
                    anyhow::Error::new(e).context("spawning assistant"),
                ))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(
                exit_code = output.status.code().unwrap_or(-1),
                stderr = %tail(&stderr, 2000),
                "assistant exited with failure"
            );
            return Err(WorkspaceError::Internal(anyhow::anyhow!(
                "assistant exited with code {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let result = parse_output(&stdout)?;
        let session_id = result
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(ChatOutcome { result, session_id })
    }
}

/// Parses assistant stdout: a single JSON document, or line-delimited JSON
/// where the last line wins.
pub fn parse_output(stdout: &str) -> WorkspaceResult<Value> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(WorkspaceError::Internal(anyhow::anyhow!(
            "assistant produced no output"
        )));
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    trimmed
        .lines()
        .rev()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .find_map(|l| serde_json::from_str::<Value>(l).ok())
        .ok_or_else(|| {
            WorkspaceError::Internal(anyhow::anyhow!("assistant output was not JSON"))
        })
}

fn tail(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(max_chars)).collect()
}
