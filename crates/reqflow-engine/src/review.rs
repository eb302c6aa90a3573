//! The resolution surface for jobs parked in PM_REVIEW.

use reqflow_model::{JobStatus, ProcessingJob, ReviewDecision, ReviewError, ReviewItem};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::error::PipelineError;
use crate::generation::GeneratedArtifact;
use crate::orchestrator::PipelineOrchestrator;
use crate::store::JobWrite;

/// One reviewer decision, as submitted in bulk
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub item_id: String,
    pub decision: ReviewDecision,
    pub notes: Option<String>,
    pub modified_content: Option<Map<String, Value>>,
}

impl Resolution {
    #[must_use]
    pub fn new(item_id: impl Into<String>, decision: ReviewDecision) -> Self {
        Self {
            item_id: item_id.into(),
            decision,
            notes: None,
            modified_content: None,
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn with_modifications(mut self, fields: Map<String, Value>) -> Self {
        self.modified_content = Some(fields);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewStats {
    pub total: usize,
    pub resolved: usize,
    pub pending: usize,
    pub by_issue_type: BTreeMap<String, usize>,
    pub by_decision: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct ReviewDesk {
    orchestrator: Arc<PipelineOrchestrator>,
}

impl ReviewDesk {
    #[must_use]
    pub fn new(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Unresolved items of a job, in creation order.
    pub async fn pending(&self, job_id: &str) -> Result<Vec<ReviewItem>, PipelineError> {
        let job = self.orchestrator.load(job_id).await?;
        Ok(job.review_items.into_iter().filter(|i| !i.resolved).collect())
    }

    /// Resolve one item.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotAwaitingReview`] unless the job is in PM_REVIEW;
    /// [`ReviewError`] for an unknown or already resolved item.
    pub async fn submit(
        &self,
        job_id: &str,
        item_id: &str,
        decision: ReviewDecision,
        notes: Option<String>,
        modified_content: Option<Map<String, Value>>,
    ) -> Result<ReviewItem, PipelineError> {
        let mut job = self.awaiting_review(job_id).await?;
        let item = resolve_in(&mut job, item_id, decision, notes, modified_content)?;
        job.touch();
        self.write_back(&job).await?;
        info!(job_id, item_id, decision = %decision, pending = job.pending_review_count(), "Review item resolved");
        Ok(item)
    }

    /// Resolve several items with one load and one write. Each entry gets its
    /// own result; failures do not stop the rest.
    pub async fn submit_bulk(
        &self,
        job_id: &str,
        resolutions: Vec<Resolution>,
    ) -> Result<Vec<(String, Result<(), ReviewError>)>, PipelineError> {
        let mut job = self.awaiting_review(job_id).await?;
        let results: Vec<_> = resolutions
            .into_iter()
            .map(|r| {
                let outcome = resolve_in(&mut job, &r.item_id, r.decision, r.notes, r.modified_content)
                    .map(|_| ());
                (r.item_id, outcome)
            })
            .collect();
        job.touch();
        self.write_back(&job).await?;
        let applied = results.iter().filter(|(_, r)| r.is_ok()).count();
        info!(job_id, applied, submitted = results.len(), "Bulk review submitted");
        Ok(results)
    }

    pub async fn stats(&self, job_id: &str) -> Result<ReviewStats, PipelineError> {
        let job = self.orchestrator.load(job_id).await?;
        let mut stats = ReviewStats {
            total: job.review_items.len(),
            ..ReviewStats::default()
        };
        for item in &job.review_items {
            *stats
                .by_issue_type
                .entry(item.issue_type.as_str().to_string())
                .or_insert(0) += 1;
            if item.resolved {
                stats.resolved += 1;
            }
            if let Some(decision) = item.decision {
                *stats.by_decision.entry(decision.as_str().to_string()).or_insert(0) += 1;
            }
        }
        stats.pending = stats.total - stats.resolved;
        Ok(stats)
    }

    /// Finish the review and resume the job.
    pub async fn complete(&self, job_id: &str) -> Result<GeneratedArtifact, PipelineError> {
        self.orchestrator.resume_after_review(job_id).await
    }

    /// Store the resolved job, unless it finished (for example was
    /// cancelled) after it was loaded.
    async fn write_back(&self, job: &ProcessingJob) -> Result<(), PipelineError> {
        match self.orchestrator.store().update_job_unless_terminal(job).await? {
            JobWrite::Written => Ok(()),
            JobWrite::Refused(status) => Err(PipelineError::NotAwaitingReview { status }),
        }
    }

    async fn awaiting_review(&self, job_id: &str) -> Result<ProcessingJob, PipelineError> {
        let job = self.orchestrator.load(job_id).await?;
        if job.status != JobStatus::PmReview {
            return Err(PipelineError::NotAwaitingReview { status: job.status });
        }
        Ok(job)
    }
}

fn resolve_in(
    job: &mut ProcessingJob,
    item_id: &str,
    decision: ReviewDecision,
    notes: Option<String>,
    modified_content: Option<Map<String, Value>>,
) -> Result<ReviewItem, ReviewError> {
    let job_id = job.id.clone();
    let item = job
        .review_item_mut(item_id)
        .ok_or_else(|| ReviewError::ItemNotFound {
            job_id,
            item_id: item_id.to_string(),
        })?;
    item.resolve(decision, notes, modified_content)?;
    Ok(item.clone())
}
