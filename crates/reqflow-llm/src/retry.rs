//! Bounded exponential backoff for completion calls.

use reqflow_config::Config;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::LlmError;

#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per call, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: config.llm.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            initial_backoff: config
                .llm
                .initial_backoff_ms
                .map_or(defaults.initial_backoff, Duration::from_millis),
            max_backoff: config
                .llm
                .max_backoff_ms
                .map_or(defaults.max_backoff, Duration::from_millis),
            backoff_multiplier: defaults.backoff_multiplier,
        }
    }

    /// No sleeping between attempts; for tests.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 2.0,
        }
    }

    /// Delay before retry number `retry` (1-based), capped at `max_backoff`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .max(1.0)
            .powi(retry.saturating_sub(1) as i32);
        let scaled = self.initial_backoff.as_secs_f64() * factor;
        if !scaled.is_finite() || scaled >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(scaled)
    }
}

/// Run `operation` until it succeeds, fails with a non-transient error, or
/// the policy's attempt budget is spent.
///
/// Exhausting the budget yields [`LlmError::RetriesExhausted`] wrapping the
/// last error. A non-transient error is returned unchanged on first sight.
pub async fn execute_with_retry<T, Op, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: Op,
) -> Result<T, LlmError>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if !error.is_transient() => return Err(error),
            Err(error) if attempt >= max_attempts => {
                return Err(LlmError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }
            Err(error) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    call = label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Completion call failed; retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(3),
            backoff_multiplier: 2.0,
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(3));
        assert_eq!(policy.delay_for(30), Duration::from_secs(3));
    }

    #[test]
    fn from_config_reads_llm_section() {
        let config = Config::builder()
            .max_attempts(5)
            .initial_backoff_ms(10)
            .max_backoff_ms(40)
            .build()
            .unwrap();
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(10));
        assert_eq!(policy.max_backoff, Duration::from_millis(40));
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let result = execute_with_retry(&RetryPolicy::immediate(3), "test", |_| {
            let attempts = Arc::clone(&attempts);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(LlmError::ProviderOutage("503".into()))
                } else {
                    Ok("ok")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_wraps_last_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let err = execute_with_retry(&RetryPolicy::immediate(2), "test", |_| {
            let attempts = Arc::clone(&attempts);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(LlmError::Transport("reset".into()))
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, LlmError::RetriesExhausted { attempts: 2, .. }));
        assert!(matches!(err.root(), LlmError::Transport(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_transient_fails_fast() {
        let attempts = Arc::new(AtomicU32::new(0));
        let err = execute_with_retry(&RetryPolicy::immediate(5), "test", |_| {
            let attempts = Arc::clone(&attempts);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(LlmError::ProviderAuth("401".into()))
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, LlmError::ProviderAuth(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
