//! Foundation utilities shared by every reqflow crate.

pub mod atomic_write;
pub mod cache;
pub mod error;
pub mod logging;
pub mod paths;
pub mod redaction;

pub use cache::{CacheStats, IdempotencyCache};
pub use error::{ErrorCategory, UserFriendlyError};
