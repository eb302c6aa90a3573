//! End-to-end pipeline scenarios over a scripted completion backend.
//!
//! Each test drives `PipelineOrchestrator` through the public API with an
//! in-memory store, so the full PENDING → COMPLETED (or PM_REVIEW) path is
//! exercised without a network or model.

mod test_support;

use async_trait::async_trait;
use reqflow::llm::scripted::{ScriptedBackend, ScriptedFailure};
use reqflow::model::{EventKind, StageStatus};
use reqflow::{
    ArtifactGenerator, GeneratedArtifact, InputDocument, IssueType, JobStatus, JobStore,
    PipelineError, PipelineSettings, ProcessOutcome, RecordingSink, Requirement, Stage,
};
use std::sync::Arc;
use std::time::Duration;
use test_support::*;

fn review_off() -> PipelineSettings {
    PipelineSettings {
        review_enabled: false,
        ..PipelineSettings::default()
    }
}

#[tokio::test]
async fn ids_are_dense_across_documents() {
    let backend = ScriptedBackend::new()
        .respond_sequence(
            EXTRACT,
            [
                candidates(&["login", "logout"]),
                r#"{"requirements": []}"#.to_string(),
                candidates(&["audit"]),
            ],
        )
        .respond(STORY, STORY_REPLY)
        .respond(SCORE, score(0.3))
        .respond(
            RELATIONS,
            r#"{"relations": [{"from": "REQ-003", "to": "REQ-001", "type": "depends_on"}]}"#,
        );
    let h = harness(backend, review_off());
    let docs = [
        inline_doc("kickoff.md", "login and logout"),
        inline_doc("empty-ish.md", "nothing relevant"),
        inline_doc("security.md", "audit everything"),
    ];

    let job = h.orchestrator.submit(&docs).await.unwrap();
    let outcome = h.orchestrator.process(job.clone(), &docs).await.unwrap();
    let artifact = outcome.artifact().expect("review is disabled").clone();

    let ids: Vec<_> = artifact.requirements.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["REQ-001", "REQ-002", "REQ-003"]);
    assert_eq!(
        artifact.requirements[2].source.as_ref().unwrap().document_id,
        docs[2].id
    );
    assert_eq!(artifact.relations.incoming("REQ-001"), ["REQ-003"]);
    assert!(artifact.requirements[0].related_ids.is_empty());

    let stored = h.store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.artifact_id.as_deref(), Some(artifact.id.as_str()));
    assert_eq!(stored.progress().progress_percent, 100);
    assert!(h.store.get_artifact(&artifact.id).await.unwrap().is_some());
    let saved = h
        .store
        .get_requirements(&job.id, &["REQ-002".to_string()])
        .await
        .unwrap();
    assert_eq!(saved[0].title, "logout");
}

#[tokio::test]
async fn confident_requirements_complete_in_stage_order() {
    let backend = ScriptedBackend::new()
        .respond(EXTRACT, candidates(&["export", "import"]))
        .respond(STORY, STORY_REPLY)
        .respond(SCORE, score(0.9))
        .respond(RELATIONS, r#"{"relations": []}"#);
    let mut h = harness(backend, PipelineSettings::default());
    let sink = Arc::new(RecordingSink::new());
    h.orchestrator = h.orchestrator.with_sink(sink.clone());
    let docs = [inline_doc("notes.md", "export and import")];

    let job = h.orchestrator.submit(&docs).await.unwrap();
    let outcome = h.orchestrator.process(job.clone(), &docs).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Completed(ref a) if a.requirements.len() == 2));

    let events = sink.events();
    let started: Vec<Stage> = events
        .iter()
        .filter(|e| e.kind == EventKind::StageStart)
        .filter_map(|e| e.stage)
        .collect();
    assert_eq!(started, Stage::ALL);
    let percents: Vec<u8> = events.iter().map(|e| e.progress_percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));

    let stored = h.store.get_job(&job.id).await.unwrap().unwrap();
    assert!(stored.stages.iter().all(|s| s.status == StageStatus::Success));
    assert!(!stored.requires_review);
}

#[tokio::test]
async fn low_confidence_parks_the_job_in_review() {
    let backend = ScriptedBackend::new()
        .respond(EXTRACT, candidates(&["export"]))
        .respond(STORY, STORY_REPLY)
        .respond(SCORE, score(0.4));
    let mut h = harness(backend, PipelineSettings::default());
    let sink = Arc::new(RecordingSink::new());
    h.orchestrator = h.orchestrator.with_sink(sink.clone());
    let docs = [inline_doc("notes.md", "export")];

    let job = h.orchestrator.submit(&docs).await.unwrap();
    let outcome = h.orchestrator.process(job.clone(), &docs).await.unwrap();
    assert_eq!(
        outcome,
        ProcessOutcome::AwaitingReview {
            job_id: job.id.clone(),
            pending: 1
        }
    );

    let stored = h.store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::PmReview);
    assert!(stored.requires_review);
    assert!(stored.artifact_id.is_none());
    assert_eq!(stored.review_items.len(), 1);
    assert_eq!(stored.review_items[0].issue_type, IssueType::LowConfidence);
    assert_eq!(stored.review_items[0].job_id, job.id);

    let snapshot = h.orchestrator.progress(&job.id).await.unwrap();
    assert_eq!(snapshot.completed_stages, 3);
    assert_eq!(snapshot.pending_reviews, 1);
    assert!(snapshot.requires_review);

    assert!(sink.events().iter().any(|e| e.kind == EventKind::ReviewRequired));
}

#[tokio::test]
async fn conflicts_route_with_the_job_id() {
    let settings = PipelineSettings {
        conflict_detection: true,
        ..PipelineSettings::default()
    };
    let backend = ScriptedBackend::new()
        .respond(EXTRACT, candidates(&["sso", "passwords"]))
        .respond(STORY, STORY_REPLY)
        .respond(SCORE, score(0.95))
        .respond(RELATIONS, "[]")
        .respond(
            CONFLICTS,
            r#"{"conflicts": [{"req1": "REQ-002", "req2": "REQ-001", "type": "contradiction", "description": "SSO only vs local passwords"}]}"#,
        );
    let h = harness(backend, settings);
    let docs = [inline_doc("auth.md", "sso and passwords")];

    let job = h.orchestrator.submit(&docs).await.unwrap();
    let outcome = h.orchestrator.process(job.clone(), &docs).await.unwrap();
    assert!(outcome.is_awaiting_review());

    let stored = h.store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.review_items.len(), 1);
    let item = &stored.review_items[0];
    assert_eq!(item.issue_type, IssueType::Conflict);
    assert_eq!(item.requirement_id, "REQ-002");
    assert_eq!(item.job_id, job.id);
}

#[tokio::test]
async fn unparsable_input_fails_the_job() {
    let mut h = harness(ScriptedBackend::new(), PipelineSettings::default());
    let sink = Arc::new(RecordingSink::new());
    h.orchestrator = h.orchestrator.with_sink(sink.clone());
    let docs = [
        InputDocument::from_path("/nonexistent/kickoff.txt"),
        InputDocument::from_path("/nonexistent/deck.pptx"),
    ];

    let job = h.orchestrator.submit(&docs).await.unwrap();
    let err = h.orchestrator.process(job.clone(), &docs).await.unwrap_err();
    assert!(matches!(err, PipelineError::NoParsableContent { attempted: 2 }));

    let stored = h.store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.error_message.as_deref().unwrap().contains("No parsable content"));
    let parsing = stored.stage(Stage::Parsing).unwrap();
    assert_eq!(parsing.status, StageStatus::Failed);
    assert_eq!(h.backend.call_count(), 0);
    assert!(sink.events().iter().any(|e| e.kind == EventKind::Error));
}

struct BrokenRenderer;

#[async_trait]
impl ArtifactGenerator for BrokenRenderer {
    fn name(&self) -> &str {
        "broken"
    }

    async fn generate(
        &self,
        _job_id: &str,
        _requirements: &[Requirement],
        _source_documents: &[String],
    ) -> Result<GeneratedArtifact, PipelineError> {
        Err(PipelineError::Generation(
            "renderer rejected key sk-ant-abcdefghijklmnop".to_string(),
        ))
    }
}

#[tokio::test]
async fn generation_failure_is_recorded_redacted() {
    let backend = ScriptedBackend::new()
        .respond(EXTRACT, candidates(&["export"]))
        .respond(STORY, STORY_REPLY)
        .respond(SCORE, score(0.9));
    let mut h = harness(backend, PipelineSettings::default());
    h.orchestrator = h.orchestrator.with_generator(Arc::new(BrokenRenderer));
    let docs = [inline_doc("notes.md", "export")];

    let job = h.orchestrator.submit(&docs).await.unwrap();
    let err = h.orchestrator.process(job.clone(), &docs).await.unwrap_err();
    assert!(matches!(err, PipelineError::Generation(_)));

    let stored = h.store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    let message = stored.error_message.as_deref().unwrap();
    assert!(message.contains("[REDACTED_KEY]"));
    assert!(!message.contains("abcdefghijklmnop"));
    // Earlier stage results survive the failure.
    assert_eq!(stored.stage(Stage::Validating).unwrap().status, StageStatus::Success);
    assert_eq!(stored.stage(Stage::Generating).unwrap().status, StageStatus::Failed);
}

#[tokio::test]
async fn exhausted_extraction_degrades_instead_of_failing() {
    let backend = ScriptedBackend::new().fail(EXTRACT, ScriptedFailure::Outage);
    let h = harness(backend, PipelineSettings::default());
    let docs = [inline_doc("notes.md", "export")];

    let job = h.orchestrator.submit(&docs).await.unwrap();
    let outcome = h.orchestrator.process(job.clone(), &docs).await.unwrap();
    assert_eq!(outcome.artifact().unwrap().requirements.len(), 0);
    // One record, three attempts, then the record yields nothing.
    assert_eq!(h.backend.calls_matching(EXTRACT), 3);

    let stored = h.store.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.stage(Stage::Normalizing).unwrap().status, StageStatus::Partial);
}

#[tokio::test]
async fn cancel_stops_the_job_at_the_next_boundary() {
    let backend = ScriptedBackend::new()
        .respond(EXTRACT, candidates(&["export"]))
        .respond(STORY, STORY_REPLY)
        .respond(SCORE, score(0.9))
        .with_latency(Duration::from_millis(100));
    let h = harness(backend, PipelineSettings::default());
    let orchestrator = Arc::new(h.orchestrator);
    let docs = vec![inline_doc("notes.md", "export")];

    let job = orchestrator.submit(&docs).await.unwrap();
    let job_id = job.id.clone();
    let running = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.process(job, &docs).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    let cancelled = orchestrator.cancel(&job_id).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Failed);

    let err = running.await.unwrap().unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled { .. }));

    let stored = h.store.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error_message.as_deref(), Some("cancelled"));
    assert!(stored.artifact_id.is_none());
}

#[tokio::test]
async fn cancelling_a_finished_job_is_rejected() {
    let backend = ScriptedBackend::new()
        .respond(EXTRACT, r#"{"requirements": []}"#);
    let h = harness(backend, PipelineSettings::default());
    let docs = [inline_doc("notes.md", "nothing")];

    let job = h.orchestrator.submit(&docs).await.unwrap();
    h.orchestrator.process(job.clone(), &docs).await.unwrap();

    let err = h.orchestrator.cancel(&job.id).await.unwrap_err();
    assert!(matches!(err, PipelineError::Transition(_)));
    let err = h.orchestrator.cancel("no-such-job").await.unwrap_err();
    assert!(matches!(err, PipelineError::JobNotFound { .. }));
}
