use camino::Utf8PathBuf;
use reqflow_utils::error::ConfigError;

use super::{Config, ConfigSource};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding reqflow and deterministic behavior independent
    /// of the user's environment is needed.
    ///
    /// ```rust
    /// use reqflow_config::Config;
    ///
    /// let config = Config::builder()
    ///     .auto_approve_threshold(0.75)
    ///     .conflict_detection(true)
    ///     .build()
    ///     .expect("valid config");
    /// assert!(config.pipeline_settings().conflict_detection);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Fluent builder for [`Config`].
///
/// Values set here are attributed to [`ConfigSource::Programmatic`]; anything
/// left unset keeps its built-in default.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    auto_approve_threshold: Option<f64>,
    review_enabled: Option<bool>,
    conflict_detection: Option<bool>,
    cache_enabled: Option<bool>,
    cache_ttl_hours: Option<u64>,
    cache_max_entries: Option<usize>,
    cache_dir: Option<Utf8PathBuf>,
    storage_dir: Option<Utf8PathBuf>,
    llm_provider: Option<String>,
    model: Option<String>,
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    timeout_secs: Option<u64>,
}

macro_rules! setter {
    ($name:ident, $ty:ty) => {
        #[must_use]
        pub fn $name(mut self, value: $ty) -> Self {
            self.$name = Some(value);
            self
        }
    };
}

impl ConfigBuilder {
    setter!(auto_approve_threshold, f64);
    setter!(review_enabled, bool);
    setter!(conflict_detection, bool);
    setter!(cache_enabled, bool);
    setter!(cache_ttl_hours, u64);
    setter!(cache_max_entries, usize);
    setter!(max_attempts, u32);
    setter!(initial_backoff_ms, u64);
    setter!(max_backoff_ms, u64);
    setter!(timeout_secs, u64);

    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn storage_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn llm_provider(mut self, provider: impl Into<String>) -> Self {
        self.llm_provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Build and validate.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = Config::defaults();
        let mut set = |key: &str| {
            config
                .source_attribution
                .insert(key.to_string(), ConfigSource::Programmatic);
        };

        macro_rules! apply {
            ($value:expr, $key:literal) => {
                if $value.is_some() {
                    set($key);
                }
            };
        }

        apply!(self.auto_approve_threshold, "review.auto_approve_threshold");
        apply!(self.review_enabled, "review.enabled");
        apply!(self.conflict_detection, "review.conflict_detection");
        apply!(self.cache_enabled, "cache.enabled");
        apply!(self.cache_ttl_hours, "cache.ttl_hours");
        apply!(self.cache_max_entries, "cache.max_memory_entries");
        apply!(self.cache_dir, "cache.dir");
        apply!(self.storage_dir, "storage.dir");
        apply!(self.llm_provider, "llm.provider");
        apply!(self.model, "llm.model");
        apply!(self.max_attempts, "llm.max_attempts");
        apply!(self.initial_backoff_ms, "llm.initial_backoff_ms");
        apply!(self.max_backoff_ms, "llm.max_backoff_ms");
        apply!(self.timeout_secs, "llm.timeout_secs");

        config.review.auto_approve_threshold = self.auto_approve_threshold.or(config.review.auto_approve_threshold);
        config.review.enabled = self.review_enabled.or(config.review.enabled);
        config.review.conflict_detection = self.conflict_detection.or(config.review.conflict_detection);
        config.cache.enabled = self.cache_enabled.or(config.cache.enabled);
        config.cache.ttl_hours = self.cache_ttl_hours.or(config.cache.ttl_hours);
        config.cache.max_memory_entries = self.cache_max_entries.or(config.cache.max_memory_entries);
        config.cache.dir = self.cache_dir.or(config.cache.dir);
        config.storage.dir = self.storage_dir.or(config.storage.dir);
        config.llm.provider = self.llm_provider.or(config.llm.provider);
        config.llm.model = self.model.or(config.llm.model);
        config.llm.max_attempts = self.max_attempts.or(config.llm.max_attempts);
        config.llm.initial_backoff_ms = self.initial_backoff_ms.or(config.llm.initial_backoff_ms);
        config.llm.max_backoff_ms = self.max_backoff_ms.or(config.llm.max_backoff_ms);
        config.llm.timeout_secs = self.timeout_secs.or(config.llm.timeout_secs);

        config.validate()?;
        Ok(config)
    }
}
