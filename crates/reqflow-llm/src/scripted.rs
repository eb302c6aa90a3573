//! Scripted backend for tests.
//!
//! Replies are routed by marker: a rule fires when its marker occurs in the
//! system or user text of the invocation. Rules are consulted in registration
//! order; an exhaustible rule (a sequence, or `fail_times`) drops out once
//! empty, so later rules with the same marker take over.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::types::{LlmBackend, LlmInvocation, LlmResult, Role};
use crate::LlmError;

/// Failure kinds a rule can inject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    Transport,
    Outage,
    Quota,
    Timeout,
    Auth,
}

impl ScriptedFailure {
    fn to_error(self) -> LlmError {
        match self {
            Self::Transport => LlmError::Transport("scripted connection reset".into()),
            Self::Outage => LlmError::ProviderOutage("scripted 503".into()),
            Self::Quota => LlmError::ProviderQuota("scripted 429".into()),
            Self::Timeout => LlmError::Timeout {
                duration: Duration::from_secs(1),
            },
            Self::Auth => LlmError::ProviderAuth("scripted 401".into()),
        }
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(ScriptedFailure),
}

#[derive(Debug)]
struct Rule {
    marker: String,
    queue: VecDeque<Reply>,
    repeat: Option<Reply>,
}

impl Rule {
    fn next(&mut self) -> Option<Reply> {
        self.queue.pop_front().or_else(|| self.repeat.clone())
    }
}

/// One recorded invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Default)]
pub struct ScriptedBackend {
    rules: Mutex<Vec<Rule>>,
    fallback: Option<String>,
    latency: Duration,
    calls: Mutex<Vec<RecordedCall>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, marker: &str, queue: Vec<Reply>, repeat: Option<Reply>) -> Self {
        lock(&self.rules).push(Rule {
            marker: marker.to_string(),
            queue: queue.into(),
            repeat,
        });
        self
    }

    /// Always answer `text` for `marker`.
    #[must_use]
    pub fn respond(self, marker: &str, text: impl Into<String>) -> Self {
        self.push(marker, Vec::new(), Some(Reply::Text(text.into())))
    }

    /// Answer each text once, in order, then fall through to later rules.
    #[must_use]
    pub fn respond_sequence<I, S>(self, marker: &str, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue = texts.into_iter().map(|t| Reply::Text(t.into())).collect();
        self.push(marker, queue, None)
    }

    /// Always fail calls for `marker`.
    #[must_use]
    pub fn fail(self, marker: &str, failure: ScriptedFailure) -> Self {
        self.push(marker, Vec::new(), Some(Reply::Fail(failure)))
    }

    /// Fail the next `times` calls for `marker`, then fall through.
    #[must_use]
    pub fn fail_times(self, marker: &str, failure: ScriptedFailure, times: usize) -> Self {
        self.push(marker, vec![Reply::Fail(failure); times], None)
    }

    /// Reply used when no rule matches. Without one, unmatched calls fail
    /// with a transport error.
    #[must_use]
    pub fn fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    /// Sleep this long inside every call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of recorded calls whose system or user text contains `marker`.
    #[must_use]
    pub fn calls_matching(&self, marker: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.system.contains(marker) || c.user.contains(marker))
            .count()
    }

    fn next_reply(&self, system: &str, user: &str) -> Option<Reply> {
        let mut rules = lock(&self.rules);
        rules
            .iter_mut()
            .filter(|r| system.contains(&r.marker) || user.contains(&r.marker))
            .find_map(Rule::next)
            .or_else(|| self.fallback.clone().map(Reply::Text))
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let system = inv.content_of(Role::System);
        let user = inv.content_of(Role::User);
        let reply = self.next_reply(&system, &user);
        lock(&self.calls).push(RecordedCall { system, user });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match reply {
            Some(Reply::Text(text)) => Ok(LlmResult::new(text, "scripted", "scripted-model")),
            Some(Reply::Fail(failure)) => Err(failure.to_error()),
            None => Err(LlmError::Transport("no scripted response".into())),
        }
    }
}
