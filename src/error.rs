//! Library-level error type.

use reqflow_engine::PipelineError;
use reqflow_utils::error::{ConfigError, ErrorCategory, LlmError, StoreError, UserFriendlyError};
use thiserror::Error;

/// Every error a reqflow caller can see, grouped by where it came from.
#[derive(Debug, Error)]
pub enum ReqflowError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0:#}")]
    Setup(#[from] anyhow::Error),
}

impl ReqflowError {
    /// Message, context and suggestions in one block for terminal output.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut out = self.user_message();
        if let Some(context) = self.context() {
            out.push_str("\n\n");
            out.push_str(&context);
        }
        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            out.push_str("\n\nSuggestions:");
            for s in suggestions {
                out.push_str("\n  - ");
                out.push_str(&s);
            }
        }
        out
    }
}

impl UserFriendlyError for ReqflowError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::Pipeline(e) => e.user_message(),
            Self::Llm(e) => e.user_message(),
            Self::Store(e) => e.user_message(),
            Self::Setup(e) => format!("{e:#}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::Pipeline(e) => e.context(),
            Self::Llm(e) => e.context(),
            Self::Store(e) => e.context(),
            Self::Setup(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::Pipeline(e) => e.suggestions(),
            Self::Llm(e) => e.suggestions(),
            Self::Store(e) => e.suggestions(),
            Self::Setup(_) => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(e) => e.category(),
            Self::Pipeline(e) => e.category(),
            Self::Llm(e) => e.category(),
            Self::Store(e) => e.category(),
            Self::Setup(_) => ErrorCategory::Configuration,
        }
    }
}
