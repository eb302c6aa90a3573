//! The completion service consumed by the pipeline.
//!
//! Two operations: [`CompletionService::complete_text`] and
//! [`CompletionService::complete_structured`]. Both retry transient backend
//! failures under the configured [`RetryPolicy`]. Structured completion then
//! recovers JSON from the text; a recovery failure is not retried because the
//! call itself succeeded.

use reqflow_config::Config;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::json_extract::extract_json;
use crate::retry::{RetryPolicy, execute_with_retry};
use crate::types::{LlmBackend, LlmInvocation, Message};
use crate::LlmError;

#[derive(Clone)]
pub struct CompletionService {
    backend: Arc<dyn LlmBackend>,
    policy: RetryPolicy,
    model: String,
    timeout: Duration,
}

impl std::fmt::Debug for CompletionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionService")
            .field("backend", &self.backend.name())
            .field("policy", &self.policy)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CompletionService {
    /// Default policy, backend-default model, 120s per attempt.
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            policy: RetryPolicy::default(),
            model: String::new(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Build the backend named by `[llm] provider` and wrap it with the
    /// configured retry policy and timeout.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let backend = crate::backend_from_config(config)?;
        Ok(Self::new(backend)
            .with_policy(RetryPolicy::from_config(config))
            .with_timeout(config.llm_timeout())
            .with_model(config.llm.model.clone().unwrap_or_default()))
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Free-text completion.
    pub async fn complete_text(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let label = self.backend.name().to_string();
        let result = execute_with_retry(&self.policy, &label, |attempt| {
            let inv = LlmInvocation::new(
                self.model.clone(),
                self.timeout,
                vec![Message::system(system), Message::user(user)],
            );
            let backend = Arc::clone(&self.backend);
            async move {
                debug!(provider = backend.name(), attempt, "Completion attempt");
                backend.invoke(inv).await
            }
        })
        .await?;
        Ok(result.raw_response)
    }

    /// Structured (JSON) completion: an object or array recovered from the
    /// model's text.
    ///
    /// # Errors
    ///
    /// [`LlmError::MalformedOutput`] when the text holds no parsable span;
    /// otherwise whatever [`complete_text`](Self::complete_text) returns.
    pub async fn complete_structured(&self, system: &str, user: &str) -> Result<Value, LlmError> {
        let text = self.complete_text(system, user).await?;
        extract_json(&text)
    }
}
