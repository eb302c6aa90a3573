use reqflow_utils::error::ConfigError;

use super::Config;

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(threshold) = self.review.auto_approve_threshold
            && !(0.0..=1.0).contains(&threshold)
        {
            return Err(invalid(
                "review.auto_approve_threshold",
                format!("{threshold} is outside [0, 1]"),
            ));
        }

        if let Some(ttl) = self.cache.ttl_hours {
            if ttl == 0 {
                return Err(invalid("cache.ttl_hours", "must be at least 1 hour"));
            }
            if ttl > 720 {
                return Err(invalid(
                    "cache.ttl_hours",
                    "exceeds maximum limit of 720 hours (30 days)",
                ));
            }
        }

        if self.cache.max_memory_entries == Some(0) {
            return Err(invalid("cache.max_memory_entries", "must be greater than 0"));
        }

        if let Some(provider) = self.llm.provider.as_deref()
            && !matches!(provider, "anthropic" | "claude-cli")
        {
            return Err(invalid(
                "llm.provider",
                format!("unknown provider '{provider}' (expected anthropic or claude-cli)"),
            ));
        }

        if let Some(attempts) = self.llm.max_attempts
            && !(1..=10).contains(&attempts)
        {
            return Err(invalid(
                "llm.max_attempts",
                format!("{attempts} is outside 1..=10"),
            ));
        }

        if let Some(timeout) = self.llm.timeout_secs
            && timeout < 5
        {
            return Err(invalid("llm.timeout_secs", "must be at least 5 seconds"));
        }

        if let (Some(initial), Some(max)) = (self.llm.initial_backoff_ms, self.llm.max_backoff_ms)
            && initial > max
        {
            return Err(invalid(
                "llm.initial_backoff_ms",
                format!("{initial} exceeds llm.max_backoff_ms ({max})"),
            ));
        }

        if let Some(anthropic) = &self.llm.anthropic
            && let Some(temperature) = anthropic.temperature
            && !(0.0..=1.0).contains(&temperature)
        {
            return Err(invalid(
                "llm.anthropic.temperature",
                format!("{temperature} is outside [0, 1]"),
            ));
        }

        Ok(())
    }
}
