//! Job orchestration: parsing → normalizing → validating → generating, with a
//! review gate between validation and generation.
//!
//! The job is persisted before each stage runs and again when it finishes,
//! so the stored record is always the last known good state. Every persist is
//! a conditional write that the store refuses once the stored job is
//! terminal; if someone else marked it FAILED (a cancel), the run stops with
//! [`PipelineError::Cancelled`] and leaves the stored state alone.
//!
//! A job that produced review items stops in PM_REVIEW. Resuming re-runs
//! parsing and normalization from the stored documents, applies the review
//! decisions, and continues to generation.

mod reconcile;

use anyhow::Context;
use reqflow_config::{Config, PipelineSettings};
use reqflow_llm::CompletionService;
use reqflow_model::{
    EventKind, InputDocument, JobStatus, ProcessingEvent, ProcessingJob, ProgressSnapshot,
    Requirement, Stage, StageResult, TransitionError,
};
use reqflow_utils::IdempotencyCache;
use reqflow_utils::logging::{log_cache_stats, log_stage_complete, log_stage_error, log_stage_start, stage_span};
use reqflow_utils::redaction::redact_secrets;
use std::sync::Arc;
use tracing::{Instrument, debug, info, warn};

use crate::error::PipelineError;
use crate::extract::ExtractorRegistry;
use crate::generation::{ArtifactGenerator, GeneratedArtifact, RequirementSetGenerator};
use crate::normalizer::Normalizer;
use crate::parsing::{DocumentParser, ParseOutcome};
use crate::progress::{NoopSink, ProgressSink};
use crate::store::{JobStore, JobWrite};
use crate::validator::{ValidationOutcome, Validator};

use self::reconcile::apply_review_decisions;

const NORMALIZE_CACHE_NAMESPACE: &str = "normalize";

/// How a `process` call ended
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Completed(GeneratedArtifact),
    /// Parked in PM_REVIEW; no artifact exists yet
    AwaitingReview { job_id: String, pending: usize },
}

impl ProcessOutcome {
    #[must_use]
    pub fn artifact(&self) -> Option<&GeneratedArtifact> {
        match self {
            Self::Completed(artifact) => Some(artifact),
            Self::AwaitingReview { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_awaiting_review(&self) -> bool {
        matches!(self, Self::AwaitingReview { .. })
    }
}

pub struct PipelineOrchestrator {
    store: Arc<dyn JobStore>,
    normalizer: Normalizer,
    validator: Validator,
    cache: Option<Arc<IdempotencyCache>>,
    extractors: ExtractorRegistry,
    generator: Arc<dyn ArtifactGenerator>,
    sink: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("normalizer", &self.normalizer)
            .field("validator", &self.validator)
            .field("cache", &self.cache.is_some())
            .field("extractors", &self.extractors)
            .field("generator", &self.generator.name())
            .finish_non_exhaustive()
    }
}

impl PipelineOrchestrator {
    /// Orchestrator with the built-in extractors and generator, no cache and
    /// no progress sink.
    #[must_use]
    pub fn new(
        store: Arc<dyn JobStore>,
        completion: CompletionService,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            normalizer: Normalizer::new(completion.clone()),
            validator: Validator::new(completion, settings),
            cache: None,
            extractors: ExtractorRegistry::with_defaults(),
            generator: Arc::new(RequirementSetGenerator),
            sink: Arc::new(NoopSink),
        }
    }

    /// Wire everything from configuration: completion backend, retry policy,
    /// pipeline settings and, when enabled, the two-tier cache.
    pub fn from_config(config: &Config, store: Arc<dyn JobStore>) -> anyhow::Result<Self> {
        let completion =
            CompletionService::from_config(config).context("Failed to set up the completion service")?;
        let mut orchestrator = Self::new(store, completion, config.pipeline_settings());

        let cache = config.cache_settings();
        if cache.enabled {
            let cache = IdempotencyCache::new(cache.dir.clone(), cache.ttl, cache.max_memory_entries)
                .with_context(|| format!("Failed to open cache at {}", cache.dir))?;
            orchestrator = orchestrator.with_cache(Arc::new(cache));
        }
        Ok(orchestrator)
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<IdempotencyCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn ArtifactGenerator>) -> Self {
        self.generator = generator;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        self.validator.settings()
    }

    /// Create and persist a PENDING job for `documents`.
    pub async fn submit(&self, documents: &[InputDocument]) -> Result<ProcessingJob, PipelineError> {
        let job = ProcessingJob::new(
            documents.iter().map(|d| d.id.clone()).collect(),
            documents.iter().map(|d| d.filename.clone()).collect(),
        );
        self.store.save_job(&job).await?;
        info!(job_id = %job.id, documents = documents.len(), "Job submitted");
        Ok(job)
    }

    /// Run `job` from PENDING until it completes or parks in PM_REVIEW.
    ///
    /// # Errors
    ///
    /// Any stage failure. The job is then stored as FAILED with the
    /// (redacted) error message, unless it was cancelled, in which case the
    /// stored state is left as the canceller wrote it.
    pub async fn process(
        &self,
        mut job: ProcessingJob,
        documents: &[InputDocument],
    ) -> Result<ProcessOutcome, PipelineError> {
        if self.store.get_job(&job.id).await?.is_none() {
            self.store.save_job(&job).await?;
        }
        match self.run(&mut job, documents).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.fail_job(&mut job, &e).await;
                Err(e)
            }
        }
    }

    /// Continue a PM_REVIEW job once every review item is resolved.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotAwaitingReview`] or
    /// [`PipelineError::ReviewIncomplete`] leave the job untouched. Failures
    /// after that mark it FAILED like [`process`](Self::process).
    pub async fn resume_after_review(&self, job_id: &str) -> Result<GeneratedArtifact, PipelineError> {
        let mut job = self.load(job_id).await?;
        if job.status != JobStatus::PmReview {
            return Err(PipelineError::NotAwaitingReview { status: job.status });
        }
        let pending = job.pending_review_count();
        if pending > 0 {
            return Err(PipelineError::ReviewIncomplete { pending });
        }

        info!(job_id, items = job.review_items.len(), "Resuming after review");
        match self.run_resume(&mut job).await {
            Ok(artifact) => Ok(artifact),
            Err(e) => {
                self.fail_job(&mut job, &e).await;
                Err(e)
            }
        }
    }

    /// Mark a job FAILED. A running `process` stops at its next stage
    /// boundary; an in-flight completion call is not interrupted.
    pub async fn cancel(&self, job_id: &str) -> Result<ProcessingJob, PipelineError> {
        let mut job = self.load(job_id).await?;
        job.fail("cancelled")?;
        if let JobWrite::Refused(status) = self.store.update_job_unless_terminal(&job).await? {
            return Err(TransitionError {
                from: status,
                to: JobStatus::Failed,
            }
            .into());
        }
        warn!(job_id, "Job cancelled");
        self.sink
            .emit(ProcessingEvent::new(&job, EventKind::Error, None, "cancelled"));
        Ok(job)
    }

    pub async fn progress(&self, job_id: &str) -> Result<ProgressSnapshot, PipelineError> {
        Ok(self.load(job_id).await?.progress())
    }

    pub async fn load(&self, job_id: &str) -> Result<ProcessingJob, PipelineError> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or_else(|| PipelineError::JobNotFound {
                job_id: job_id.to_string(),
            })
    }

    async fn run(
        &self,
        job: &mut ProcessingJob,
        documents: &[InputDocument],
    ) -> Result<ProcessOutcome, PipelineError> {
        for document in documents {
            self.store.save_document(document).await?;
        }

        job.transition_to(JobStatus::Parsing)?;
        let span = stage_span(&job.id, Stage::Parsing.as_str());
        let parsed = self.parse_stage(job, documents).instrument(span).await?;

        job.transition_to(JobStatus::Normalizing)?;
        let span = stage_span(&job.id, Stage::Normalizing.as_str());
        let requirements = self.normalize_stage(job, &parsed).instrument(span).await?;

        job.transition_to(JobStatus::Validating)?;
        let span = stage_span(&job.id, Stage::Validating.as_str());
        let validation = self.validate_stage(job, &requirements).instrument(span).await?;

        if !validation.review_items.is_empty() {
            let pending = validation.review_items.len();
            job.transition_to(JobStatus::PmReview)?;
            job.attach_review_items(validation.review_items);
            self.persist(job).await?;
            info!(job_id = %job.id, pending, "Job awaiting review");
            self.sink.emit(ProcessingEvent::new(
                job,
                EventKind::ReviewRequired,
                None,
                format!("{pending} item(s) need review"),
            ));
            return Ok(ProcessOutcome::AwaitingReview {
                job_id: job.id.clone(),
                pending,
            });
        }

        job.transition_to(JobStatus::Generating)?;
        let span = stage_span(&job.id, Stage::Generating.as_str());
        let artifact = self.generate_stage(job, validation.approved).instrument(span).await?;
        Ok(ProcessOutcome::Completed(artifact))
    }

    async fn run_resume(&self, job: &mut ProcessingJob) -> Result<GeneratedArtifact, PipelineError> {
        let documents = self.store.get_documents(&job.document_ids).await?;
        if documents.len() < job.document_ids.len() {
            warn!(
                job_id = %job.id,
                stored = documents.len(),
                expected = job.document_ids.len(),
                "Some input documents are missing from the store"
            );
        }

        // Status stays PM_REVIEW while the inputs are re-derived.
        let span = stage_span(&job.id, Stage::Parsing.as_str());
        let parsed = self.parse_stage(job, &documents).instrument(span).await?;
        let span = stage_span(&job.id, Stage::Normalizing.as_str());
        let requirements = self.normalize_stage(job, &parsed).instrument(span).await?;

        let before = requirements.len();
        let requirements = apply_review_decisions(requirements, &job.review_items);
        debug!(job_id = %job.id, dropped = before - requirements.len(), "Review decisions applied");

        job.transition_to(JobStatus::Generating)?;
        let span = stage_span(&job.id, Stage::Generating.as_str());
        self.generate_stage(job, requirements).instrument(span).await
    }

    async fn parse_stage(
        &self,
        job: &mut ProcessingJob,
        documents: &[InputDocument],
    ) -> Result<ParseOutcome, PipelineError> {
        let mut stage = self.begin_stage(job, Stage::Parsing).await?;
        let parser = DocumentParser::new(self.extractors.clone(), self.cache.clone());
        let outcome = parser.parse(documents).await;

        if outcome.parsed.is_empty() {
            let err = PipelineError::NoParsableContent {
                attempted: documents.len(),
            };
            return Err(Self::stage_failed(job, stage, err));
        }
        for skipped in &outcome.skipped {
            stage.warn(skipped.clone());
        }
        let summary = format!("{} of {} document(s) parsed", outcome.parsed.len(), documents.len());
        self.finish_stage(job, stage, summary).await?;
        Ok(outcome)
    }

    async fn normalize_stage(
        &self,
        job: &mut ProcessingJob,
        parsed: &ParseOutcome,
    ) -> Result<Vec<Requirement>, PipelineError> {
        let mut stage = self.begin_stage(job, Stage::Normalizing).await?;
        let records = parsed.records();
        let document_ids = parsed.document_ids();

        let cache_key = self.cache.as_ref().and_then(|_| {
            IdempotencyCache::canonical_key(NORMALIZE_CACHE_NAMESPACE, &(&records, &document_ids))
                .map_err(|e| warn!(error = %e, "Cannot derive normalization cache key"))
                .ok()
        });
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key)
            && let Some(requirements) = cache.get_as::<Vec<Requirement>>(key)
        {
            debug!(job_id = %job.id, count = requirements.len(), "Normalization cache hit");
            log_cache_stats(&cache.stats());
            let summary = format!("{} requirement(s) (cached)", requirements.len());
            self.finish_stage(job, stage, summary).await?;
            return Ok(requirements);
        }

        let report = self.normalizer.normalize_with_report(&records, &document_ids).await;
        for warning in &report.warnings {
            stage.warn(warning.clone());
        }
        if report.requirements.is_empty() {
            stage.warn("no requirements were extracted");
        }

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if report.is_clean() {
                if let Err(e) = cache.set_as(key, &report.requirements, None) {
                    warn!(job_id = %job.id, error = %e, "Failed to cache normalized requirements");
                }
            } else {
                debug!(job_id = %job.id, degraded = report.degraded_calls, "Not caching a degraded normalization");
            }
        }

        let summary = format!(
            "{} requirement(s), {} degraded call(s)",
            report.requirements.len(),
            report.degraded_calls
        );
        self.finish_stage(job, stage, summary).await?;
        Ok(report.requirements)
    }

    async fn validate_stage(
        &self,
        job: &mut ProcessingJob,
        requirements: &[Requirement],
    ) -> Result<ValidationOutcome, PipelineError> {
        let stage = self.begin_stage(job, Stage::Validating).await?;
        let outcome = self.validator.validate(requirements, &job.id).await;
        let summary = format!(
            "{} approved, {} for review",
            outcome.approved.len(),
            outcome.review_items.len()
        );
        self.finish_stage(job, stage, summary).await?;
        Ok(outcome)
    }

    async fn generate_stage(
        &self,
        job: &mut ProcessingJob,
        requirements: Vec<Requirement>,
    ) -> Result<GeneratedArtifact, PipelineError> {
        let stage = self.begin_stage(job, Stage::Generating).await?;
        let artifact = match self
            .generator
            .generate(&job.id, &requirements, &job.filenames)
            .await
        {
            Ok(artifact) => artifact,
            Err(e) => return Err(Self::stage_failed(job, stage, e)),
        };

        self.store.save_requirements(&job.id, &artifact.requirements).await?;
        self.store.save_artifact(&artifact).await?;
        job.artifact_id = Some(artifact.id.clone());

        let summary = format!(
            "{} requirement(s) by {}",
            artifact.requirements.len(),
            artifact.generator
        );
        self.finish_stage(job, stage, summary).await?;

        job.transition_to(JobStatus::Completed)?;
        self.persist(job).await?;
        info!(job_id = %job.id, artifact_id = %artifact.id, "Job completed");
        Ok(artifact)
    }

    async fn begin_stage(&self, job: &mut ProcessingJob, stage: Stage) -> Result<StageResult, PipelineError> {
        job.touch();
        self.persist(job).await?;
        log_stage_start(&job.id, stage.as_str());
        self.sink.emit(ProcessingEvent::new(
            job,
            EventKind::StageStart,
            Some(stage),
            format!("{stage} started"),
        ));
        Ok(StageResult::start(stage))
    }

    async fn finish_stage(
        &self,
        job: &mut ProcessingJob,
        mut result: StageResult,
        summary: String,
    ) -> Result<(), PipelineError> {
        let stage = result.stage;
        result.complete(summary.clone());
        log_stage_complete(&job.id, stage.as_str(), u128::from(result.duration_ms.unwrap_or(0)));
        job.record_stage(result);
        self.persist(job).await?;
        self.sink
            .emit(ProcessingEvent::new(job, EventKind::StageComplete, Some(stage), summary));
        Ok(())
    }

    /// Record the failed stage on the job and hand the error back.
    fn stage_failed(job: &mut ProcessingJob, mut result: StageResult, err: PipelineError) -> PipelineError {
        let message = redact_secrets(&err.to_string());
        result.fail(message.clone());
        log_stage_error(
            &job.id,
            result.stage.as_str(),
            &message,
            u128::from(result.duration_ms.unwrap_or(0)),
        );
        job.record_stage(result);
        err
    }

    /// Write `job` unless the stored copy was finished underneath us.
    async fn persist(&self, job: &ProcessingJob) -> Result<(), PipelineError> {
        match self.store.update_job_unless_terminal(job).await? {
            JobWrite::Written => Ok(()),
            JobWrite::Refused(JobStatus::Failed) => {
                info!(job_id = %job.id, "Job was cancelled; stopping at stage boundary");
                Err(PipelineError::Cancelled {
                    job_id: job.id.clone(),
                })
            }
            JobWrite::Refused(status) => Err(TransitionError {
                from: status,
                to: job.status,
            }
            .into()),
        }
    }

    async fn fail_job(&self, job: &mut ProcessingJob, err: &PipelineError) {
        if matches!(err, PipelineError::Cancelled { .. }) {
            return;
        }

        let message = redact_secrets(&err.to_string());
        if let Err(e) = job.fail(message.clone()) {
            warn!(job_id = %job.id, error = %e, "Job already terminal; not marking failed");
            return;
        }
        match self.store.update_job_unless_terminal(job).await {
            Ok(JobWrite::Written) => {}
            Ok(JobWrite::Refused(status)) => {
                debug!(job_id = %job.id, %status, "Stored job already finished; keeping it");
                return;
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Failed to persist FAILED status");
            }
        }
        warn!(job_id = %job.id, error = %message, "Job failed");
        self.sink
            .emit(ProcessingEvent::new(job, EventKind::Error, None, message));
    }
}
