#![allow(dead_code)]

use reqflow::llm::scripted::ScriptedBackend;
use reqflow::{
    CompletionService, ContentRecord, InputDocument, InputKind, JobStore, MemoryStore,
    PipelineOrchestrator, PipelineSettings, RetryPolicy,
};
use std::sync::Arc;

pub(crate) const EXTRACT: &str = "[task:extract-candidates]";
pub(crate) const STORY: &str = "[task:user-story]";
pub(crate) const SCORE: &str = "[task:confidence]";
pub(crate) const RELATIONS: &str = "[task:relations]";
pub(crate) const CONFLICTS: &str = "[task:conflicts]";

pub(crate) const STORY_REPLY: &str =
    r#"{"user_story": "As an analyst I want this so that reports are faster", "acceptance_criteria": ["Given data, when exported, then a file is produced"]}"#;

/// Extraction reply with one well-formed candidate per title.
pub(crate) fn candidates(titles: &[&str]) -> String {
    let entries: Vec<String> = titles
        .iter()
        .map(|t| {
            format!(
                r#"{{"title": "{t}", "description": "The system supports {t} for every account", "excerpt": "we need {t}", "type": "FR", "priority": "HIGH", "section": "Scope", "line": "3-4"}}"#
            )
        })
        .collect();
    format!(r#"{{"requirements": [{}]}}"#, entries.join(","))
}

pub(crate) fn score(value: f64) -> String {
    format!(r#"{{"score": {value}, "rationale": "stated in the kickoff notes"}}"#)
}

pub(crate) fn inline_doc(name: &str, text: &str) -> InputDocument {
    InputDocument::inline(
        InputKind::Text,
        name,
        ContentRecord::from_text(text).with_filename(name),
    )
}

pub(crate) struct Harness {
    pub(crate) backend: Arc<ScriptedBackend>,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) orchestrator: PipelineOrchestrator,
}

/// Orchestrator over an in-memory store. Retries are immediate.
pub(crate) fn harness(backend: ScriptedBackend, settings: PipelineSettings) -> Harness {
    let backend = Arc::new(backend);
    let store = Arc::new(MemoryStore::new());
    let completion = CompletionService::new(backend.clone()).with_policy(RetryPolicy::immediate(3));
    let orchestrator = PipelineOrchestrator::new(store.clone() as Arc<dyn JobStore>, completion, settings);
    Harness {
        backend,
        store,
        orchestrator,
    }
}
