//! The requirements pipeline: parsing, normalization, validation, review and
//! generation, sequenced by [`PipelineOrchestrator`].

pub mod error;
pub mod extract;
pub mod generation;
pub mod normalizer;
pub mod orchestrator;
pub mod parsing;
pub mod progress;
pub mod review;
pub mod store;
pub mod validator;

pub use error::PipelineError;
pub use extract::{ContentExtractor, ExtractorRegistry, PlainTextExtractor};
pub use generation::{ArtifactGenerator, GeneratedArtifact, RequirementSetGenerator};
pub use normalizer::{NormalizationReport, Normalizer};
pub use orchestrator::{PipelineOrchestrator, ProcessOutcome};
pub use parsing::{DocumentParser, ParseOutcome, ParsedDocument};
pub use progress::{NoopSink, ProgressSink, RecordingSink};
pub use review::{Resolution, ReviewDesk, ReviewStats};
pub use store::{FileStore, JobStore, JobWrite, MemoryStore};
pub use validator::{ValidationOutcome, Validator};
