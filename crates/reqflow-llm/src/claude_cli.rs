//! Claude CLI backend.
//!
//! Runs `claude -p <prompt> --output-format text` once per invocation. The
//! child is killed if the invocation timeout elapses first.

use async_trait::async_trait;
use reqflow_config::Config;
use reqflow_utils::redaction::redact_secrets;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};
use crate::LlmError;

/// Cap on stderr carried into error messages
const STDERR_EXCERPT_CHARS: usize = 400;

pub struct ClaudeCliBackend {
    binary_path: PathBuf,
    default_model: Option<String>,
}

impl ClaudeCliBackend {
    /// `binary_path` of `None` searches PATH for `claude`.
    pub fn new(binary_path: Option<PathBuf>, default_model: Option<String>) -> Result<Self, LlmError> {
        let binary_path = match binary_path {
            Some(path) => path,
            None => Self::discover_binary()?,
        };
        Ok(Self {
            binary_path,
            default_model,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let binary = config
            .llm
            .claude
            .as_ref()
            .and_then(|c| c.binary.as_ref())
            .map(PathBuf::from);
        Self::new(binary, config.llm.model.clone())
    }

    fn discover_binary() -> Result<PathBuf, LlmError> {
        which::which("claude").map_err(|e| {
            LlmError::Misconfiguration(format!(
                "Claude CLI binary not found in PATH. Install it or set [llm.claude] binary. Error: {e}"
            ))
        })
    }

    /// Flatten the conversation into one prompt, system text first.
    fn messages_to_prompt(messages: &[Message]) -> String {
        let mut prompt = String::new();
        for msg in messages {
            let label = match msg.role {
                Role::System => "System",
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            prompt.push_str(label);
            prompt.push_str(": ");
            prompt.push_str(&msg.content);
            prompt.push_str("\n\n");
        }
        prompt.trim_end().to_string()
    }

    fn build_command(&self, inv: &LlmInvocation) -> (Command, String) {
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            Some(inv.model.clone())
        };

        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("-p")
            .arg(Self::messages_to_prompt(&inv.messages))
            .arg("--output-format")
            .arg("text");
        if let Some(model) = &model {
            cmd.arg("--model").arg(model);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        (cmd, model.unwrap_or_else(|| "default".to_string()))
    }
}

#[async_trait]
impl LlmBackend for ClaudeCliBackend {
    fn name(&self) -> &str {
        "claude-cli"
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let (mut cmd, model) = self.build_command(&inv);

        debug!(
            provider = "claude-cli",
            binary = %self.binary_path.display(),
            model = %model,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking Claude CLI"
        );

        let output = match tokio::time::timeout(inv.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(LlmError::Transport(format!(
                    "Failed to spawn {}: {e}",
                    self.binary_path.display()
                )));
            }
            Err(_) => {
                return Err(LlmError::Timeout {
                    duration: inv.timeout,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT_CHARS).collect();
            return Err(LlmError::Transport(format!(
                "claude exited with {}: {}",
                output.status,
                redact_secrets(&excerpt)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(LlmResult::new(stdout, "claude-cli", model))
    }
}
