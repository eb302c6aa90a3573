//! The stored job reports the stage that is actually running, so a status
//! query made mid-call sees NORMALIZING during extraction and GENERATING
//! while the artifact is built.

mod test_support;

use async_trait::async_trait;
use reqflow::engine::RequirementSetGenerator;
use reqflow::llm::scripted::ScriptedBackend;
use reqflow::llm::{LlmError, LlmInvocation, LlmResult};
use reqflow::{
    ArtifactGenerator, CompletionService, GeneratedArtifact, JobStatus, JobStore, LlmBackend,
    MemoryStore, PipelineError, PipelineOrchestrator, PipelineSettings, Requirement, RetryPolicy,
};
use std::sync::{Arc, Mutex};
use test_support::*;

type Seen = Arc<Mutex<Vec<JobStatus>>>;

/// Records the stored status of the job every time an extraction call is made.
struct StatusOnExtract {
    inner: ScriptedBackend,
    store: Arc<MemoryStore>,
    job_id: Arc<Mutex<Option<String>>>,
    seen: Seen,
}

#[async_trait]
impl LlmBackend for StatusOnExtract {
    fn name(&self) -> &str {
        "status-on-extract"
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let extracting = inv.messages.iter().any(|m| m.content.contains(EXTRACT));
        let job_id = self.job_id.lock().unwrap().clone();
        if extracting && let Some(job_id) = job_id {
            let stored = self.store.get_job(&job_id).await.unwrap().unwrap();
            self.seen.lock().unwrap().push(stored.status);
        }
        self.inner.invoke(inv).await
    }
}

/// Records the stored status while generating, then builds the default artifact.
struct StatusOnGenerate {
    store: Arc<MemoryStore>,
    seen: Seen,
}

#[async_trait]
impl ArtifactGenerator for StatusOnGenerate {
    fn name(&self) -> &str {
        "status-on-generate"
    }

    async fn generate(
        &self,
        job_id: &str,
        requirements: &[Requirement],
        source_documents: &[String],
    ) -> Result<GeneratedArtifact, PipelineError> {
        let stored = self.store.get_job(job_id).await.unwrap().unwrap();
        self.seen.lock().unwrap().push(stored.status);
        RequirementSetGenerator
            .generate(job_id, requirements, source_documents)
            .await
    }
}

#[tokio::test]
async fn stored_status_tracks_the_running_stage() {
    let store = Arc::new(MemoryStore::new());
    let job_id = Arc::new(Mutex::new(None));
    let during_extract: Seen = Arc::default();
    let during_generate: Seen = Arc::default();

    let backend = StatusOnExtract {
        inner: ScriptedBackend::new()
            .respond(EXTRACT, candidates(&["export"]))
            .respond(STORY, STORY_REPLY)
            .respond(SCORE, score(0.95)),
        store: Arc::clone(&store),
        job_id: Arc::clone(&job_id),
        seen: Arc::clone(&during_extract),
    };
    let completion = CompletionService::new(Arc::new(backend)).with_policy(RetryPolicy::immediate(3));
    let orchestrator = PipelineOrchestrator::new(
        Arc::clone(&store) as Arc<dyn JobStore>,
        completion,
        PipelineSettings::default(),
    )
    .with_generator(Arc::new(StatusOnGenerate {
        store: Arc::clone(&store),
        seen: Arc::clone(&during_generate),
    }));

    let docs = [inline_doc("notes.md", "Users export reports as CSV.")];
    let job = orchestrator.submit(&docs).await.unwrap();
    *job_id.lock().unwrap() = Some(job.id.clone());

    let outcome = orchestrator.process(job.clone(), &docs).await.unwrap();
    assert!(outcome.artifact().is_some());

    assert_eq!(*during_extract.lock().unwrap(), [JobStatus::Normalizing]);
    assert_eq!(*during_generate.lock().unwrap(), [JobStatus::Generating]);
    let stored = store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
}
