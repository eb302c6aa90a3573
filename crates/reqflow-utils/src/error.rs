use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Pipeline,
    CompletionService,
    Storage,
    Review,
    ResourceLimits,
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Pipeline => write!(f, "Pipeline"),
            Self::CompletionService => write!(f, "Completion Service"),
            Self::Storage => write!(f, "Storage"),
            Self::Review => write!(f, "Review"),
            Self::ResourceLimits => write!(f, "Resource Limits"),
            Self::Validation => write!(f, "Validation"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with [review], [cache], [llm] and [storage] sections."
                    .to_string(),
            ),
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' configuration option has specific range requirements."
            )),
            Self::NotFound { .. } => {
                Some("An explicit configuration path was given but does not exist.".to_string())
            }
            Self::DiscoveryFailed { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of .reqflow/config.toml".to_string(),
                "Remove unknown keys or sections".to_string(),
            ],
            Self::InvalidValue { .. } => vec![
                "Check the value against the documented range".to_string(),
                "Unset the matching REQFLOW_* environment variable if it overrides the file"
                    .to_string(),
            ],
            Self::NotFound { .. } => vec![
                "Verify the configuration path".to_string(),
                "Omit the path to fall back to discovery".to_string(),
            ],
            Self::DiscoveryFailed { .. } => {
                vec!["Run from a directory containing .reqflow/config.toml".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Errors that can occur during completion-service operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure (process spawn, HTTP connectivity)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Structured completion returned text with no parsable JSON span
    #[error("Malformed structured output: {preview}")]
    MalformedOutput { preview: String },

    /// Every attempt allowed by the retry policy failed
    #[error("Completion failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<LlmError> },

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl LlmError {
    /// Whether another attempt at the same call could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ProviderQuota(_) | Self::ProviderOutage(_) | Self::Timeout { .. }
        )
    }

    /// The innermost error, unwrapping retry exhaustion.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("LLM provider authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("LLM provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("LLM provider service outage: {msg}"),
            Self::Timeout { duration } => format!("LLM invocation timed out after {duration:?}"),
            Self::MalformedOutput { .. } => {
                "LLM returned output that contains no JSON object or array".to_string()
            }
            Self::RetriesExhausted { attempts, last } => {
                format!("LLM call failed after {attempts} attempts: {}", last.user_message())
            }
            Self::Misconfiguration(msg) => format!("LLM configuration error: {msg}"),
            Self::Unsupported(msg) => format!("LLM feature not supported: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Transport(_) => Some(
                "Transport errors occur when the LLM backend cannot be reached or spawned."
                    .to_string(),
            ),
            Self::ProviderAuth(_) => Some(
                "Authentication errors indicate missing or invalid API keys or credentials."
                    .to_string(),
            ),
            Self::ProviderQuota(_) => Some(
                "Quota errors occur when rate limits or usage limits are exceeded.".to_string(),
            ),
            Self::ProviderOutage(_) => {
                Some("Provider outages are temporary service disruptions.".to_string())
            }
            Self::Timeout { .. } => Some(
                "Timeouts occur when LLM invocations take longer than the configured limit."
                    .to_string(),
            ),
            Self::MalformedOutput { preview } => {
                Some(format!("Response began with: {preview}"))
            }
            Self::RetriesExhausted { last, .. } => last.context(),
            Self::Misconfiguration(_) => Some(
                "Configuration errors indicate missing or invalid LLM provider settings."
                    .to_string(),
            ),
            Self::Unsupported(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Transport(_) => vec![
                "Check that the claude binary is installed and in PATH".to_string(),
                "Verify network connectivity for HTTP providers".to_string(),
            ],
            Self::ProviderAuth(_) => vec![
                "Check that the required API key environment variable is set".to_string(),
                "Verify the API key is valid and not expired".to_string(),
            ],
            Self::ProviderQuota(_) | Self::ProviderOutage(_) => vec![
                "Wait a few minutes and resubmit the job".to_string(),
                "Raise [llm] max_attempts or max_backoff_ms".to_string(),
            ],
            Self::Timeout { .. } => {
                vec!["Increase [llm] timeout_secs in .reqflow/config.toml".to_string()]
            }
            Self::MalformedOutput { .. } => vec![
                "Retry the job; structured output is usually recovered on a fresh call"
                    .to_string(),
            ],
            Self::RetriesExhausted { last, .. } => last.suggestions(),
            Self::Misconfiguration(_) => vec![
                "Check the [llm] section in .reqflow/config.toml".to_string(),
                "Ensure required configuration keys are present".to_string(),
            ],
            Self::Unsupported(_) => {
                vec!["Use one of the supported providers: anthropic, claude-cli".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ProviderAuth(_) | Self::Misconfiguration(_) | Self::Unsupported(_) => {
                ErrorCategory::Configuration
            }
            Self::ProviderQuota(_) => ErrorCategory::ResourceLimits,
            Self::RetriesExhausted { last, .. } => last.category(),
            _ => ErrorCategory::CompletionService,
        }
    }
}

/// Persistence errors from job, document and artifact stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to (de)serialize {kind} '{id}': {reason}")]
    Serialization {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
}

impl UserFriendlyError for StoreError {
    fn user_message(&self) -> String {
        match self {
            Self::Io { path, .. } => format!("Could not access stored data at {path}"),
            Self::Serialization { kind, id, .. } => format!("Stored {kind} '{id}' is unreadable"),
            Self::NotFound { kind, id } => format!("No {kind} with id '{id}' exists"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Io { reason, .. } | Self::Serialization { reason, .. } => Some(reason.clone()),
            Self::NotFound { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Io { .. } => vec!["Check permissions on the [storage] dir".to_string()],
            Self::Serialization { .. } => {
                vec!["Remove the corrupted file and resubmit the job".to_string()]
            }
            Self::NotFound { .. } => vec!["Verify the id".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LlmError::Transport("x".into()).is_transient());
        assert!(LlmError::Timeout { duration: Duration::from_secs(1) }.is_transient());
        assert!(!LlmError::ProviderAuth("x".into()).is_transient());
        assert!(!LlmError::MalformedOutput { preview: String::new() }.is_transient());
    }

    #[test]
    fn retries_exhausted_reports_root_cause() {
        let err = LlmError::RetriesExhausted {
            attempts: 3,
            last: Box::new(LlmError::ProviderQuota("429".into())),
        };
        assert!(matches!(err.root(), LlmError::ProviderQuota(_)));
        assert_eq!(err.category(), ErrorCategory::ResourceLimits);
        assert!(err.user_message().contains("3 attempts"));
    }

    #[test]
    fn config_error_category() {
        let err = ConfigError::InvalidValue {
            key: "review.auto_approve_threshold".into(),
            value: "1.5".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.user_message().contains("1.5"));
    }
}
