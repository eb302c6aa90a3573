//! reqflow - requirements intelligence with a human review gate
//!
//! reqflow turns heterogeneous input material (notes, emails, spreadsheets,
//! transcripts) into a confidence-scored list of structured requirements.
//! Uncertain requirements are routed to a reviewer; the job parks in
//! `PM_REVIEW` until every review item is resolved and then resumes into
//! artifact generation.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use reqflow::{Config, InputDocument, ProcessOutcome};
//!
//! # async fn run() -> Result<(), reqflow::ReqflowError> {
//! let config = Config::discover()?;
//! let orchestrator = reqflow::open(&config)?;
//!
//! let documents = vec![InputDocument::from_path("notes/kickoff.md")];
//! let job = orchestrator.submit(&documents).await?;
//! match orchestrator.process(job, &documents).await? {
//!     ProcessOutcome::Completed(artifact) => println!("{} requirements", artifact.requirements.len()),
//!     ProcessOutcome::AwaitingReview { job_id, pending } => {
//!         println!("{job_id}: {pending} item(s) need review");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Crates
//!
//! - `reqflow-model`: jobs, requirements, review items and content records
//! - `reqflow-engine`: normalizer, validator, orchestrator, stores, review desk
//! - `reqflow-llm`: the completion service and its backends
//! - `reqflow-config`: configuration discovery and validation
//! - `reqflow-utils`: errors, logging, redaction and the idempotency cache

mod error;

use std::sync::Arc;

pub use error::ReqflowError;

pub use reqflow_config::{Config, ConfigBuilder, PipelineSettings};
pub use reqflow_engine::{
    ArtifactGenerator, ContentExtractor, ExtractorRegistry, FileStore, GeneratedArtifact,
    JobStore, JobWrite, MemoryStore, NormalizationReport, Normalizer, PipelineError,
    PipelineOrchestrator, ProcessOutcome, ProgressSink, RecordingSink, Resolution, ReviewDesk,
    ReviewStats, ValidationOutcome, Validator,
};
pub use reqflow_llm::{CompletionService, LlmBackend, RetryPolicy};
pub use reqflow_model::{
    ContentRecord, InputDocument, InputKind, IssueType, JobStatus, Priority, ProcessingJob,
    ProgressSnapshot, Requirement, RequirementType, ReviewDecision, ReviewItem, Stage,
};
pub use reqflow_utils::logging::init_tracing;
pub use reqflow_utils::{ErrorCategory, IdempotencyCache, UserFriendlyError};

#[doc(hidden)]
pub use reqflow_config as config;
#[doc(hidden)]
pub use reqflow_engine as engine;
#[doc(hidden)]
pub use reqflow_llm as llm;
#[doc(hidden)]
pub use reqflow_model as model;
#[doc(hidden)]
pub use reqflow_utils as utils;

/// Orchestrator backed by the file store and completion backend named in
/// `config`.
pub fn open(config: &Config) -> Result<PipelineOrchestrator, ReqflowError> {
    config.validate()?;
    let store = FileStore::from_config(config)?;
    let orchestrator = PipelineOrchestrator::from_config(config, Arc::new(store))?;
    tracing::debug!(orchestrator = ?orchestrator, "Pipeline opened");
    Ok(orchestrator)
}

/// Package version
#[must_use]
pub fn reqflow_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
