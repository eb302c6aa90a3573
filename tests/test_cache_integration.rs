//! Idempotency cache behaviour as the pipeline sees it
//!
//! - the persisted tier is shared by cache instances over one directory
//! - an expired entry counts as a miss and is removed
//! - an identical resubmission reuses the cached normalization

mod test_support;

use anyhow::Result;
use camino::Utf8PathBuf;
use reqflow::llm::scripted::ScriptedBackend;
use reqflow::{IdempotencyCache, JobStatus, JobStore, PipelineSettings};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_support::*;

const HOUR: Duration = Duration::from_secs(3600);

fn cache_dir(temp: &TempDir) -> Result<Utf8PathBuf> {
    Ok(Utf8PathBuf::try_from(temp.path().to_path_buf())?.join("cache"))
}

#[test]
fn test_persisted_entries_survive_a_new_instance() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = cache_dir(&temp)?;

    let key = IdempotencyCache::canonical_key("normalize", &["REQ-001", "REQ-002"])?;
    {
        let cache = IdempotencyCache::new(dir.clone(), HOUR, 8)?;
        cache.set_as(&key, &vec!["login", "logout"], None)?;
        assert_eq!(cache.stats().writes, 1);
    }

    let reopened = IdempotencyCache::new(dir, HOUR, 8)?;
    let value: Vec<String> = reopened.get_as(&key).expect("entry on disk");
    assert_eq!(value, ["login", "logout"]);

    let stats = reopened.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 0);
    // Promoted into memory by the disk hit.
    assert_eq!(stats.memory_entries, 1);
    Ok(())
}

#[test]
fn test_expired_entry_is_a_single_miss() -> Result<()> {
    let temp = TempDir::new()?;
    let cache = IdempotencyCache::new(cache_dir(&temp)?, HOUR, 8)?;

    cache.set_as("parse_short", &"value", Some(Duration::from_millis(5)))?;
    std::thread::sleep(Duration::from_millis(30));

    assert!(cache.get("parse_short").is_none());
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.memory_entries, 0);

    // Gone from disk too: a fresh instance misses.
    let reopened = IdempotencyCache::new(cache_dir(&temp)?, HOUR, 8)?;
    assert!(reopened.get("parse_short").is_none());
    Ok(())
}

#[tokio::test]
async fn test_identical_resubmission_skips_the_backend() -> Result<()> {
    let temp = TempDir::new()?;
    let cache = Arc::new(IdempotencyCache::new(cache_dir(&temp)?, HOUR, 64)?);

    let backend = ScriptedBackend::new()
        .respond(EXTRACT, candidates(&["export", "import"]))
        .respond(STORY, STORY_REPLY)
        .respond(SCORE, score(0.9))
        .respond(RELATIONS, r#"{"relations": []}"#);
    let mut h = harness(backend, PipelineSettings::default());
    h.orchestrator = h.orchestrator.with_cache(Arc::clone(&cache));

    let docs = [inline_doc("notes.md", "export and import").with_id("doc-notes")];

    let first = h.orchestrator.submit(&docs).await?;
    let outcome = h.orchestrator.process(first, &docs).await?;
    let first_ids: Vec<String> = outcome
        .artifact()
        .expect("confident requirements")
        .requirements
        .iter()
        .map(|r| r.id.clone())
        .collect();
    let calls = h.backend.call_count();
    assert!(calls > 0);

    let second = h.orchestrator.submit(&docs).await?;
    let second_id = second.id.clone();
    let outcome = h.orchestrator.process(second, &docs).await?;
    let second_ids: Vec<String> = outcome
        .artifact()
        .expect("confident requirements")
        .requirements
        .iter()
        .map(|r| r.id.clone())
        .collect();

    assert_eq!(first_ids, second_ids);
    assert_eq!(h.backend.call_count(), calls);
    assert!(cache.stats().hits >= 1);

    let stored = h.store.get_job(&second_id).await?.expect("stored job");
    assert_eq!(stored.status, JobStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_degraded_normalization_is_not_cached() -> Result<()> {
    // No confidence rule: every score call fails and the run degrades.
    let backend = ScriptedBackend::new()
        .respond(EXTRACT, candidates(&["export"]))
        .respond(STORY, STORY_REPLY);
    let mut h = harness(backend, PipelineSettings::default());
    let cache = Arc::new(IdempotencyCache::in_memory(HOUR, 64));
    h.orchestrator = h.orchestrator.with_cache(Arc::clone(&cache));

    let docs = [inline_doc("notes.md", "export").with_id("doc-notes")];
    for _ in 0..2 {
        let job = h.orchestrator.submit(&docs).await?;
        h.orchestrator.process(job, &docs).await?;
    }

    assert_eq!(h.backend.calls_matching(EXTRACT), 2);
    Ok(())
}
