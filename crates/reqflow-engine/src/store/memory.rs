use async_trait::async_trait;
use reqflow_model::{InputDocument, ProcessingJob, Requirement};
use reqflow_utils::error::StoreError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{JobStore, JobWrite, select_by_id};
use crate::generation::GeneratedArtifact;

/// Process-local store, used by tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: Mutex<HashMap<String, ProcessingJob>>,
    documents: Mutex<HashMap<String, InputDocument>>,
    requirements: Mutex<HashMap<String, Vec<Requirement>>>,
    artifacts: Mutex<HashMap<String, GeneratedArtifact>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn job_count(&self) -> usize {
        lock(&self.jobs).len()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn save_job(&self, job: &ProcessingJob) -> Result<(), StoreError> {
        lock(&self.jobs).insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<ProcessingJob>, StoreError> {
        Ok(lock(&self.jobs).get(job_id).cloned())
    }

    async fn update_job(&self, job: &ProcessingJob) -> Result<(), StoreError> {
        let mut jobs = lock(&self.jobs);
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: "job",
                id: job.id.clone(),
            }),
        }
    }

    async fn update_job_unless_terminal(&self, job: &ProcessingJob) -> Result<JobWrite, StoreError> {
        let mut jobs = lock(&self.jobs);
        match jobs.get_mut(&job.id) {
            Some(slot) if slot.status.is_terminal() => Ok(JobWrite::Refused(slot.status)),
            Some(slot) => {
                *slot = job.clone();
                Ok(JobWrite::Written)
            }
            None => Err(StoreError::NotFound {
                kind: "job",
                id: job.id.clone(),
            }),
        }
    }

    async fn save_document(&self, document: &InputDocument) -> Result<(), StoreError> {
        lock(&self.documents).insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn get_documents(&self, ids: &[String]) -> Result<Vec<InputDocument>, StoreError> {
        let documents = lock(&self.documents);
        Ok(ids.iter().filter_map(|id| documents.get(id).cloned()).collect())
    }

    async fn save_requirements(
        &self,
        job_id: &str,
        requirements: &[Requirement],
    ) -> Result<(), StoreError> {
        lock(&self.requirements).insert(job_id.to_string(), requirements.to_vec());
        Ok(())
    }

    async fn get_requirements(
        &self,
        job_id: &str,
        ids: &[String],
    ) -> Result<Vec<Requirement>, StoreError> {
        let requirements = lock(&self.requirements);
        Ok(requirements
            .get(job_id)
            .map(|all| select_by_id(all, ids, |r| r.id.as_str()))
            .unwrap_or_default())
    }

    async fn save_artifact(&self, artifact: &GeneratedArtifact) -> Result<(), StoreError> {
        lock(&self.artifacts).insert(artifact.id.clone(), artifact.clone());
        Ok(())
    }

    async fn get_artifact(&self, artifact_id: &str) -> Result<Option<GeneratedArtifact>, StoreError> {
        Ok(lock(&self.artifacts).get(artifact_id).cloned())
    }
}
