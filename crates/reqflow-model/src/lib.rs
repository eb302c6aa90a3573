//! Data model shared by the reqflow pipeline.
//!
//! Pure types plus the small amount of behaviour that belongs to them: the job
//! status transition table, review-item resolution, the progress snapshot and
//! the derived relation index. Nothing here performs I/O.

pub mod content;
pub mod job;
pub mod progress;
pub mod relations;
pub mod requirement;
pub mod review;

pub use content::{ContentRecord, InputDocument, InputKind, Section};
pub use job::{JobStatus, ProcessingJob, Stage, StageResult, StageStatus, TransitionError};
pub use progress::{EventKind, ProcessingEvent, ProgressSnapshot};
pub use relations::{RelationIndex, RelationType};
pub use requirement::{Priority, Requirement, RequirementType, SourceReference, ValidationResult};
pub use review::{IssueType, ReviewDecision, ReviewError, ReviewItem};
