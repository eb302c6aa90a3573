//! Completion service and LLM backends.
//!
//! Every provider implements [`LlmBackend`]. The pipeline never talks to a
//! backend directly: it goes through [`CompletionService`], which owns the
//! retry policy and the recovery of JSON from free text.

mod anthropic_backend;
mod claude_cli;
mod completion;
pub(crate) mod http_client;
mod json_extract;
mod retry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod scripted;

pub use anthropic_backend::{AnthropicBackend, DEFAULT_ANTHROPIC_MODEL};
pub use claude_cli::ClaudeCliBackend;
pub use completion::CompletionService;
pub use json_extract::extract_json;
pub use retry::{RetryPolicy, execute_with_retry};
pub use reqflow_utils::error::LlmError;
pub use types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};

use reqflow_config::Config;
use std::sync::Arc;

/// Construct the backend named by `[llm] provider`.
///
/// # Errors
///
/// `Unsupported` for an unknown provider name; `Misconfiguration` when the
/// provider's own settings are unusable (missing API key, binary not found).
pub fn backend_from_config(config: &Config) -> Result<Arc<dyn LlmBackend>, LlmError> {
    match config.llm_provider() {
        "anthropic" => Ok(Arc::new(AnthropicBackend::from_config(config)?)),
        "claude-cli" => Ok(Arc::new(ClaudeCliBackend::from_config(config)?)),
        unknown => Err(LlmError::Unsupported(format!(
            "Unknown LLM provider '{unknown}'. Supported providers: anthropic, claude-cli."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_unsupported() {
        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("gemini-cli".into());
        let err = backend_from_config(&config).err().unwrap();
        assert!(matches!(err, LlmError::Unsupported(_)));
    }

    #[test]
    fn claude_cli_with_explicit_binary_builds() {
        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("claude-cli".into());
        config.llm.claude = Some(reqflow_config::ClaudeConfig {
            binary: Some("/opt/claude/bin/claude".into()),
        });
        let backend = backend_from_config(&config).unwrap();
        assert_eq!(backend.name(), "claude-cli");
    }
}
