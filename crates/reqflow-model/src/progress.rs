//! Progress snapshots and processing events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{JobStatus, ProcessingJob, Stage};

/// Last-known-good view of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub status: JobStatus,
    pub completed_stages: usize,
    pub total_stages: usize,
    pub progress_percent: u8,
    pub requires_review: bool,
    pub pending_reviews: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StageStart,
    StageComplete,
    ReviewRequired,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingEvent {
    pub job_id: String,
    pub kind: EventKind,
    pub stage: Option<Stage>,
    pub message: String,
    pub progress_percent: u8,
    pub timestamp: DateTime<Utc>,
}

impl ProcessingEvent {
    /// Event stamped with the job's current progress.
    #[must_use]
    pub fn new(
        job: &ProcessingJob,
        kind: EventKind,
        stage: Option<Stage>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job.id.clone(),
            kind,
            stage,
            message: message.into(),
            progress_percent: job.progress().progress_percent,
            timestamp: Utc::now(),
        }
    }
}
