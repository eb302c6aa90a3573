//! Structured logging for pipeline runs.
//!
//! Every stage event carries `job_id` and `stage` fields so a single job can be
//! followed through interleaved output from concurrent jobs.

use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::redaction::redact_secrets;

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the default filter is
/// `reqflow=info,warn`, or `reqflow=debug,info` in verbose mode. Verbose mode
/// also prints targets and span close events (which carry span timings).
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("reqflow=debug,info")
            } else {
                EnvFilter::try_new("reqflow=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_target(verbose)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false);

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.with_span_events(FmtSpan::CLOSE).compact())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.compact())
            .try_init()?;
    }

    Ok(())
}

/// Span wrapping one stage of one job.
pub fn stage_span(job_id: &str, stage: &str) -> tracing::Span {
    span!(Level::INFO, "stage", job_id = %job_id, stage = %stage)
}

pub fn log_stage_start(job_id: &str, stage: &str) {
    info!(job_id = %job_id, stage = %stage, "Starting stage");
}

pub fn log_stage_complete(job_id: &str, stage: &str, duration_ms: u128) {
    info!(
        job_id = %job_id,
        stage = %stage,
        duration_ms = %duration_ms,
        "Stage completed"
    );
}

/// Error text is redacted before it reaches any subscriber.
pub fn log_stage_error(job_id: &str, stage: &str, error: &str, duration_ms: u128) {
    let sanitized = redact_secrets(error);
    error!(
        job_id = %job_id,
        stage = %stage,
        duration_ms = %duration_ms,
        error = %sanitized,
        "Stage failed"
    );
}

/// Log cache counters at debug level.
pub fn log_cache_stats(stats: &crate::cache::CacheStats) {
    tracing::debug!(
        hits = stats.hits,
        misses = stats.misses,
        writes = stats.writes,
        evictions = stats.evictions,
        hit_ratio = %format!("{:.2}", stats.hit_ratio()),
        "Idempotency cache statistics"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_run_without_subscriber() {
        let span = stage_span("job-1", "parsing");
        let _guard = span.enter();
        log_stage_start("job-1", "parsing");
        log_stage_complete("job-1", "parsing", 12);
        log_stage_error("job-1", "parsing", "key sk-ant-0123456789abcdef leaked", 3);
    }

    #[test]
    fn init_twice_reports_error_instead_of_panicking() {
        let _ = init_tracing(false);
        assert!(init_tracing(true).is_err());
    }
}
