//! Processing jobs and their status lifecycle.
//!
//! ```text
//! PENDING → PARSING → NORMALIZING → VALIDATING ─┬→ GENERATING → COMPLETED
//!                                               └→ PM_REVIEW ──┘
//! any non-terminal ─→ FAILED
//! ```
//!
//! `PM_REVIEW → GENERATING` is the resume edge. COMPLETED and FAILED are
//! terminal: no transition leaves them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::progress::ProgressSnapshot;
use crate::review::ReviewItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Parsing,
    Normalizing,
    Validating,
    Generating,
    PmReview,
    Completed,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Parsing => "PARSING",
            Self::Normalizing => "NORMALIZING",
            Self::Validating => "VALIDATING",
            Self::Generating => "GENERATING",
            Self::PmReview => "PM_REVIEW",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position along the forward order. GENERATING and PM_REVIEW share a
    /// rank; FAILED has none because it is reachable from every rank.
    #[must_use]
    pub const fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Parsing => Some(1),
            Self::Normalizing => Some(2),
            Self::Validating => Some(3),
            Self::Generating | Self::PmReview => Some(4),
            Self::Completed => Some(5),
            Self::Failed => None,
        }
    }

    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        if matches!(next, Self::Failed) {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Self::Pending, Self::Parsing)
                | (Self::Parsing, Self::Normalizing)
                | (Self::Normalizing, Self::Validating)
                | (Self::Validating, Self::Generating | Self::PmReview)
                | (Self::PmReview, Self::Generating)
                | (Self::Generating, Self::Completed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid job status transition from {from} to {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// The four canonical pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Parsing,
    Normalizing,
    Validating,
    Generating,
}

impl Stage {
    pub const ALL: [Self; 4] = [
        Self::Parsing,
        Self::Normalizing,
        Self::Validating,
        Self::Generating,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Parsing => "parsing",
            Self::Normalizing => "normalizing",
            Self::Validating => "validating",
            Self::Generating => "generating",
        }
    }

    /// Job status while this stage runs.
    #[must_use]
    pub const fn job_status(&self) -> JobStatus {
        match self {
            Self::Parsing => JobStatus::Parsing,
            Self::Normalizing => JobStatus::Normalizing,
            Self::Validating => JobStatus::Validating,
            Self::Generating => JobStatus::Generating,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Running,
    Success,
    /// Finished, but some inputs were skipped or degraded
    Partial,
    Failed,
}

/// Outcome record for one stage execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    pub status: StageStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub output_summary: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl StageResult {
    #[must_use]
    pub fn start(stage: Stage) -> Self {
        Self {
            stage,
            status: StageStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            output_summary: None,
            errors: Vec::new(),
        }
    }

    /// Note a non-fatal problem. A stage with warnings completes as `Partial`.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn complete(&mut self, summary: impl Into<String>) {
        self.status = if self.errors.is_empty() {
            StageStatus::Success
        } else {
            StageStatus::Partial
        };
        self.output_summary = Some(summary.into());
        self.stamp();
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StageStatus::Failed;
        self.errors.push(error.into());
        self.stamp();
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self.status, StageStatus::Success | StageStatus::Partial)
    }

    fn stamp(&mut self) {
        let now = Utc::now();
        let elapsed = (now - self.started_at).num_milliseconds().max(0);
        self.completed_at = Some(now);
        self.duration_ms = u64::try_from(elapsed).ok();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: String,
    pub status: JobStatus,
    pub document_ids: Vec<String>,
    pub filenames: Vec<String>,
    /// One entry per stage; a re-run replaces the earlier entry
    #[serde(default)]
    pub stages: Vec<StageResult>,
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub review_items: Vec<ReviewItem>,
    #[serde(default)]
    pub requires_review: bool,
    pub error_message: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingJob {
    #[must_use]
    pub fn new(document_ids: Vec<String>, filenames: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            document_ids,
            filenames,
            stages: Vec::new(),
            artifact_id: None,
            review_items: Vec::new(),
            requires_review: false,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next` if the transition table allows it.
    pub fn transition_to(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Transition to FAILED and keep `message`.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition_to(JobStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    pub fn record_stage(&mut self, result: StageResult) {
        match self.stages.iter_mut().find(|s| s.stage == result.stage) {
            Some(existing) => *existing = result,
            None => self.stages.push(result),
        }
        self.touch();
    }

    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn attach_review_items(&mut self, items: impl IntoIterator<Item = ReviewItem>) {
        self.review_items.extend(items);
        self.requires_review = !self.review_items.is_empty();
        self.touch();
    }

    #[must_use]
    pub fn pending_review_count(&self) -> usize {
        self.review_items.iter().filter(|i| !i.resolved).count()
    }

    pub fn review_item_mut(&mut self, item_id: &str) -> Option<&mut ReviewItem> {
        self.review_items.iter_mut().find(|i| i.id == item_id)
    }

    /// Canonical stages finished with `Success` or `Partial`.
    #[must_use]
    pub fn completed_stage_count(&self) -> usize {
        Stage::ALL
            .iter()
            .filter(|stage| self.stage(**stage).is_some_and(StageResult::is_done))
            .count()
    }

    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        let completed = self.completed_stage_count();
        let total = Stage::ALL.len();
        ProgressSnapshot {
            status: self.status,
            completed_stages: completed,
            total_stages: total,
            progress_percent: u8::try_from(completed * 100 / total).unwrap_or(100),
            requires_review: self.requires_review,
            pending_reviews: self.pending_review_count(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
