//! Progress event sinks.

use reqflow_model::ProcessingEvent;
use std::sync::Mutex;

/// Receives events as a job moves through its stages. Implementations must
/// not block; a slow consumer should buffer on its own side.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProcessingEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: ProcessingEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProcessingEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<ProcessingEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProcessingEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
