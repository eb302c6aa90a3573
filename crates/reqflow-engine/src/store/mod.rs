//! Persistence for jobs, input documents, final requirements and artifacts.
//!
//! Records are keyed by id, so concurrent jobs never contend on a key. Writes
//! to the same key are last-writer-wins, except that a job already stored as
//! COMPLETED or FAILED is never overwritten through
//! [`JobStore::update_job_unless_terminal`].

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use reqflow_model::{InputDocument, JobStatus, ProcessingJob, Requirement};
use reqflow_utils::error::StoreError;

use crate::generation::GeneratedArtifact;

/// Outcome of [`JobStore::update_job_unless_terminal`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobWrite {
    Written,
    /// The stored copy was already terminal; nothing was written.
    Refused(JobStatus),
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn save_job(&self, job: &ProcessingJob) -> Result<(), StoreError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<ProcessingJob>, StoreError>;

    /// Overwrite an existing job. `NotFound` if it was never saved.
    async fn update_job(&self, job: &ProcessingJob) -> Result<(), StoreError>;

    /// Overwrite an existing job unless the stored copy is COMPLETED or
    /// FAILED. The check and the write happen as one step within this
    /// process. `NotFound` if it was never saved.
    async fn update_job_unless_terminal(&self, job: &ProcessingJob) -> Result<JobWrite, StoreError>;

    async fn save_document(&self, document: &InputDocument) -> Result<(), StoreError>;

    /// Documents in the order of `ids`; unknown ids are skipped.
    async fn get_documents(&self, ids: &[String]) -> Result<Vec<InputDocument>, StoreError>;

    /// Replace the final requirement list of a job.
    async fn save_requirements(
        &self,
        job_id: &str,
        requirements: &[Requirement],
    ) -> Result<(), StoreError>;

    /// Requirements of a job in the order of `ids`; unknown ids are skipped.
    async fn get_requirements(
        &self,
        job_id: &str,
        ids: &[String],
    ) -> Result<Vec<Requirement>, StoreError>;

    async fn save_artifact(&self, artifact: &GeneratedArtifact) -> Result<(), StoreError>;

    async fn get_artifact(&self, artifact_id: &str) -> Result<Option<GeneratedArtifact>, StoreError>;
}

/// Pick `ids` out of `all`, keeping the order of `ids`.
pub(crate) fn select_by_id<T: Clone>(all: &[T], ids: &[String], id_of: impl Fn(&T) -> &str) -> Vec<T> {
    ids.iter()
        .filter_map(|id| all.iter().find(|item| id_of(*item) == id.as_str()))
        .cloned()
        .collect()
}
