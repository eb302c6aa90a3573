//! Errors surfaced at the pipeline boundary.

use reqflow_model::{JobStatus, ReviewError, TransitionError};
use reqflow_utils::error::{ErrorCategory, LlmError, StoreError, UserFriendlyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Completion service failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error("No parsable content in {attempted} input document(s)")]
    NoParsableContent { attempted: usize },

    #[error("Cannot resume: {pending} review item(s) still pending")]
    ReviewIncomplete { pending: usize },

    #[error("Job is not awaiting review (status {status})")]
    NotAwaitingReview { status: JobStatus },

    #[error("Job '{job_id}' was cancelled")]
    Cancelled { job_id: String },

    #[error("Job '{job_id}' not found")]
    JobNotFound { job_id: String },

    #[error("Extraction failed for '{document}': {reason}")]
    Extraction { document: String, reason: String },

    #[error("Artifact generation failed: {0}")]
    Generation(String),
}

impl UserFriendlyError for PipelineError {
    fn user_message(&self) -> String {
        match self {
            Self::Llm(e) => e.user_message(),
            Self::Store(e) => e.user_message(),
            Self::NoParsableContent { .. } => {
                "None of the submitted documents produced usable content".to_string()
            }
            Self::ReviewIncomplete { pending } => {
                format!("{pending} review item(s) must be resolved before the job can resume")
            }
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Llm(e) => e.context(),
            Self::Store(e) => e.context(),
            Self::Transition(e) => Some(format!(
                "Jobs move PENDING → PARSING → NORMALIZING → VALIDATING → GENERATING/PM_REVIEW → COMPLETED; {} → {} is not an allowed step.",
                e.from, e.to
            )),
            Self::Cancelled { .. } => {
                Some("The job was marked FAILED by a cancel request while it was running.".to_string())
            }
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Llm(e) => e.suggestions(),
            Self::Store(e) => e.suggestions(),
            Self::NoParsableContent { .. } => vec![
                "Check that the files are readable and not empty".to_string(),
                "Register an extractor for the input kind".to_string(),
            ],
            Self::ReviewIncomplete { .. } => {
                vec!["List pending items and resolve each one".to_string()]
            }
            Self::NotAwaitingReview { .. } => {
                vec!["Only jobs in PM_REVIEW can be resumed".to_string()]
            }
            Self::Cancelled { .. } => vec!["Resubmit the documents as a new job".to_string()],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Llm(e) => e.category(),
            Self::Store(_) => ErrorCategory::Storage,
            Self::Review(_) | Self::ReviewIncomplete { .. } | Self::NotAwaitingReview { .. } => {
                ErrorCategory::Review
            }
            Self::NoParsableContent { .. } | Self::Extraction { .. } => ErrorCategory::Validation,
            _ => ErrorCategory::Pipeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_errors_keep_their_category() {
        let err = PipelineError::from(LlmError::ProviderAuth("401".into()));
        assert_eq!(err.category(), LlmError::ProviderAuth("401".into()).category());
    }

    #[test]
    fn review_errors_are_review_category() {
        let err = PipelineError::ReviewIncomplete { pending: 2 };
        assert_eq!(err.category(), ErrorCategory::Review);
        assert!(err.user_message().contains('2'));
        assert!(!err.suggestions().is_empty());
    }
}
