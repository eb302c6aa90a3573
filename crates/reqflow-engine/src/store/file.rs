use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use reqflow_config::Config;
use reqflow_model::{InputDocument, ProcessingJob, Requirement};
use reqflow_utils::atomic_write::write_file_atomic;
use reqflow_utils::error::StoreError;
use reqflow_utils::paths::ensure_dir_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{JobStore, JobWrite, select_by_id};
use crate::generation::GeneratedArtifact;

const JOBS_DIR: &str = "jobs";
const DOCUMENTS_DIR: &str = "documents";
const REQUIREMENTS_DIR: &str = "requirements";
const ARTIFACTS_DIR: &str = "artifacts";

/// One pretty-printed JSON file per record:
///
/// ```text
/// <root>/jobs/<job_id>.json
/// <root>/documents/<document_id>.json
/// <root>/requirements/<job_id>.json
/// <root>/artifacts/<artifact_id>.json
/// ```
///
/// Every write is atomic, so a crash never leaves a torn record behind. Job
/// writes are serialized through one in-process lock so a conditional update
/// cannot interleave with another job write. Other processes sharing the
/// directory are not coordinated.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: Utf8PathBuf,
    job_lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for dir in [JOBS_DIR, DOCUMENTS_DIR, REQUIREMENTS_DIR, ARTIFACTS_DIR] {
            let path = root.join(dir);
            ensure_dir_all(&path).map_err(|e| StoreError::Io {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(Self {
            root,
            job_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Store rooted at `[storage] dir`.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        Self::new(config.storage_dir())
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Ids become file names, so anything that could escape the directory
    /// is refused.
    fn path_for(&self, kind: &'static str, dir: &str, id: &str) -> Result<Utf8PathBuf, StoreError> {
        let safe = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !safe {
            return Err(StoreError::Serialization {
                kind,
                id: id.to_string(),
                reason: "id is not usable as a file name".to_string(),
            });
        }
        Ok(self.root.join(dir).join(format!("{id}.json")))
    }

    async fn write<T: Serialize + ?Sized>(
        &self,
        kind: &'static str,
        path: Utf8PathBuf,
        id: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialization {
            kind,
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_file_atomic(&target, &json))
            .await
            .map_err(|e| StoreError::Io {
                path: path.to_string(),
                reason: e.to_string(),
            })?
            .map_err(|e| StoreError::Io {
                path: path.to_string(),
                reason: format!("{e:#}"),
            })?;
        debug!(kind, id, path = %path, "Record written");
        Ok(())
    }

    async fn read<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        path: &Utf8Path,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io {
                    path: path.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Serialization {
                kind,
                id: id.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl JobStore for FileStore {
    async fn save_job(&self, job: &ProcessingJob) -> Result<(), StoreError> {
        let path = self.path_for("job", JOBS_DIR, &job.id)?;
        let _guard = self.job_lock.lock().await;
        self.write("job", path, &job.id, job).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<ProcessingJob>, StoreError> {
        let path = self.path_for("job", JOBS_DIR, job_id)?;
        self.read("job", &path, job_id).await
    }

    async fn update_job(&self, job: &ProcessingJob) -> Result<(), StoreError> {
        let path = self.path_for("job", JOBS_DIR, &job.id)?;
        let _guard = self.job_lock.lock().await;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StoreError::NotFound {
                kind: "job",
                id: job.id.clone(),
            });
        }
        self.write("job", path, &job.id, job).await
    }

    async fn update_job_unless_terminal(&self, job: &ProcessingJob) -> Result<JobWrite, StoreError> {
        let path = self.path_for("job", JOBS_DIR, &job.id)?;
        let _guard = self.job_lock.lock().await;
        let stored: ProcessingJob = self.read("job", &path, &job.id).await?.ok_or_else(|| {
            StoreError::NotFound {
                kind: "job",
                id: job.id.clone(),
            }
        })?;
        if stored.status.is_terminal() {
            debug!(job_id = %job.id, status = %stored.status, "Refusing to overwrite a finished job");
            return Ok(JobWrite::Refused(stored.status));
        }
        self.write("job", path, &job.id, job).await?;
        Ok(JobWrite::Written)
    }

    async fn save_document(&self, document: &InputDocument) -> Result<(), StoreError> {
        let path = self.path_for("document", DOCUMENTS_DIR, &document.id)?;
        self.write("document", path, &document.id, document).await
    }

    async fn get_documents(&self, ids: &[String]) -> Result<Vec<InputDocument>, StoreError> {
        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            let path = self.path_for("document", DOCUMENTS_DIR, id)?;
            if let Some(doc) = self.read("document", &path, id).await? {
                documents.push(doc);
            }
        }
        Ok(documents)
    }

    async fn save_requirements(
        &self,
        job_id: &str,
        requirements: &[Requirement],
    ) -> Result<(), StoreError> {
        let path = self.path_for("requirements", REQUIREMENTS_DIR, job_id)?;
        self.write("requirements", path, job_id, requirements).await
    }

    async fn get_requirements(
        &self,
        job_id: &str,
        ids: &[String],
    ) -> Result<Vec<Requirement>, StoreError> {
        let path = self.path_for("requirements", REQUIREMENTS_DIR, job_id)?;
        let all: Vec<Requirement> = self
            .read("requirements", &path, job_id)
            .await?
            .unwrap_or_default();
        Ok(select_by_id(&all, ids, |r| r.id.as_str()))
    }

    async fn save_artifact(&self, artifact: &GeneratedArtifact) -> Result<(), StoreError> {
        let path = self.path_for("artifact", ARTIFACTS_DIR, &artifact.id)?;
        self.write("artifact", path, &artifact.id, artifact).await
    }

    async fn get_artifact(&self, artifact_id: &str) -> Result<Option<GeneratedArtifact>, StoreError> {
        let path = self.path_for("artifact", ARTIFACTS_DIR, artifact_id)?;
        self.read("artifact", &path, artifact_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqflow_model::{ContentRecord, InputKind, JobStatus};
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        (tmp, FileStore::new(root).unwrap())
    }

    #[tokio::test]
    async fn job_round_trips_through_disk() {
        let (_tmp, store) = store();
        let mut job = ProcessingJob::new(vec!["d1".into()], vec!["a.txt".into()]);
        store.save_job(&job).await.unwrap();

        job.transition_to(JobStatus::Parsing).unwrap();
        store.update_job(&job).await.unwrap();

        let loaded = store.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Parsing);
        assert!(store.root().join("jobs").join(format!("{}.json", job.id)).exists());
    }

    #[tokio::test]
    async fn finished_jobs_are_not_overwritten() {
        let (_tmp, store) = store();
        let mut job = ProcessingJob::new(vec![], vec![]);
        store.save_job(&job).await.unwrap();
        job.transition_to(JobStatus::Parsing).unwrap();
        let stale = job.clone();

        job.fail("cancelled").unwrap();
        assert_eq!(store.update_job_unless_terminal(&job).await.unwrap(), JobWrite::Written);
        assert_eq!(
            store.update_job_unless_terminal(&stale).await.unwrap(),
            JobWrite::Refused(JobStatus::Failed)
        );

        let loaded = store.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Failed);
        assert_eq!(loaded.error_message.as_deref(), Some("cancelled"));

        let unsaved = ProcessingJob::new(vec![], vec![]);
        assert!(matches!(
            store.update_job_unless_terminal(&unsaved).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn missing_records_are_none_or_not_found() {
        let (_tmp, store) = store();
        assert!(store.get_job("nope").await.unwrap().is_none());
        let job = ProcessingJob::new(vec![], vec![]);
        assert!(matches!(
            store.update_job(&job).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn documents_come_back_in_requested_order() {
        let (_tmp, store) = store();
        let a = InputDocument::inline(InputKind::Text, "a.txt", ContentRecord::from_text("a"))
            .with_id("doc-a");
        let b = InputDocument::inline(InputKind::Email, "b.eml", ContentRecord::from_text("b"))
            .with_id("doc-b");
        store.save_document(&a).await.unwrap();
        store.save_document(&b).await.unwrap();

        let docs = store
            .get_documents(&["doc-b".into(), "doc-x".into(), "doc-a".into()])
            .await
            .unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, ["b.eml", "a.txt"]);
    }

    #[tokio::test]
    async fn traversal_ids_are_refused() {
        let (_tmp, store) = store();
        for id in ["../escape", "", ".hidden", "a/b"] {
            assert!(store.get_job(id).await.is_err(), "{id:?}");
        }
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let (_tmp, store) = store();
        std::fs::write(store.root().join("jobs/broken.json"), "{not json").unwrap();
        assert!(matches!(
            store.get_job("broken").await,
            Err(StoreError::Serialization { kind: "job", .. })
        ));
    }
}
