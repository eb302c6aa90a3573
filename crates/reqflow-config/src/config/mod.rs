mod builder;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use model::*;

use camino::Utf8PathBuf;
use std::time::Duration;

/// Keys tracked in [`Config::source_attribution`].
pub(crate) const TRACKED_KEYS: &[&str] = &[
    "review.auto_approve_threshold",
    "review.enabled",
    "review.conflict_detection",
    "cache.enabled",
    "cache.ttl_hours",
    "cache.max_memory_entries",
    "cache.dir",
    "llm.provider",
    "llm.model",
    "llm.timeout_secs",
    "llm.max_attempts",
    "llm.initial_backoff_ms",
    "llm.max_backoff_ms",
    "storage.dir",
];

impl Config {
    /// Built-in defaults, every key attributed to [`ConfigSource::Default`].
    #[must_use]
    pub fn defaults() -> Self {
        let source_attribution = TRACKED_KEYS
            .iter()
            .map(|k| ((*k).to_string(), ConfigSource::Default))
            .collect();
        Self {
            review: ReviewConfig::default(),
            cache: CacheConfig::default(),
            llm: LlmConfig::default(),
            storage: StorageConfig::default(),
            source_attribution,
        }
    }

    /// Settings the validator and orchestrator consume.
    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        let fallback = PipelineSettings::default();
        PipelineSettings {
            auto_approve_threshold: self
                .review
                .auto_approve_threshold
                .unwrap_or(fallback.auto_approve_threshold),
            review_enabled: self.review.enabled.unwrap_or(fallback.review_enabled),
            conflict_detection: self
                .review
                .conflict_detection
                .unwrap_or(fallback.conflict_detection),
        }
    }

    /// Resolved cache settings; the directory defaults to `<REQFLOW_HOME>/cache`.
    #[must_use]
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            enabled: self.cache.enabled.unwrap_or(true),
            ttl: Duration::from_secs(
                self.cache.ttl_hours.unwrap_or(DEFAULT_CACHE_TTL_HOURS) * 3600,
            ),
            max_memory_entries: self
                .cache
                .max_memory_entries
                .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES),
            dir: self
                .cache
                .dir
                .clone()
                .unwrap_or_else(reqflow_utils::paths::cache_dir),
        }
    }

    /// Storage root; defaults to `<REQFLOW_HOME>/data`.
    #[must_use]
    pub fn storage_dir(&self) -> Utf8PathBuf {
        self.storage
            .dir
            .clone()
            .unwrap_or_else(reqflow_utils::paths::data_dir)
    }

    /// Configured provider name, `claude-cli` when unset.
    #[must_use]
    pub fn llm_provider(&self) -> &str {
        self.llm.provider.as_deref().unwrap_or("claude-cli")
    }

    /// Per-attempt timeout for completion calls.
    #[must_use]
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs.unwrap_or(120))
    }

    /// Config with defaults, review on, cache off. Used by tests that must
    /// not touch the filesystem or environment.
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn minimal_for_testing() -> Self {
        let mut config = Self::defaults();
        config.cache.enabled = Some(false);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::defaults();
        let settings = config.pipeline_settings();
        assert!((settings.auto_approve_threshold - 0.8).abs() < f64::EPSILON);
        assert!(settings.review_enabled);
        assert!(!settings.conflict_detection);

        let cache = config.cache_settings();
        assert!(cache.enabled);
        assert_eq!(cache.ttl, Duration::from_secs(24 * 3600));
        assert_eq!(cache.max_memory_entries, 100);

        assert_eq!(config.llm_provider(), "claude-cli");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn every_tracked_key_has_default_source() {
        let config = Config::defaults();
        for key in TRACKED_KEYS {
            assert_eq!(
                config.source_attribution.get(*key),
                Some(&ConfigSource::Default),
                "{key}"
            );
        }
    }

    #[test]
    fn minimal_for_testing_disables_cache() {
        assert!(!Config::minimal_for_testing().cache_settings().enabled);
    }
}
