use std::collections::BTreeMap;

use super::{Config, ConfigSource};

fn stable_source_label(source: &ConfigSource) -> &'static str {
    match source {
        ConfigSource::Default => "default",
        ConfigSource::ConfigFile(_) => "config",
        ConfigSource::Env(_) => "env",
        ConfigSource::Programmatic => "programmatic",
    }
}

fn source_label(source: Option<&ConfigSource>) -> String {
    stable_source_label(source.unwrap_or(&ConfigSource::Default)).to_string()
}

impl Config {
    /// Effective configuration as `key -> (value, source)`, sorted by key.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();

        let mut add = |key: &str, value: Option<String>| {
            if let Some(val) = value {
                let source = source_label(self.source_attribution.get(key));
                config.insert(key.to_string(), (val, source));
            }
        };

        let settings = self.pipeline_settings();
        add(
            "review.auto_approve_threshold",
            Some(settings.auto_approve_threshold.to_string()),
        );
        add("review.enabled", Some(settings.review_enabled.to_string()));
        add(
            "review.conflict_detection",
            Some(settings.conflict_detection.to_string()),
        );

        let cache = self.cache_settings();
        add("cache.enabled", Some(cache.enabled.to_string()));
        add("cache.ttl_hours", self.cache.ttl_hours.map(|v| v.to_string()));
        add(
            "cache.max_memory_entries",
            Some(cache.max_memory_entries.to_string()),
        );
        add("cache.dir", Some(cache.dir.to_string()));

        add("llm.provider", Some(self.llm_provider().to_string()));
        add("llm.model", self.llm.model.clone());
        add("llm.timeout_secs", self.llm.timeout_secs.map(|v| v.to_string()));
        add("llm.max_attempts", self.llm.max_attempts.map(|v| v.to_string()));
        add(
            "llm.initial_backoff_ms",
            self.llm.initial_backoff_ms.map(|v| v.to_string()),
        );
        add(
            "llm.max_backoff_ms",
            self.llm.max_backoff_ms.map(|v| v.to_string()),
        );

        add("storage.dir", Some(self.storage_dir().to_string()));

        config
    }
}
