use anyhow::{Context, Result};
use reqflow_utils::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::{CacheConfig, Config, ConfigSource, LlmConfig, ReviewConfig, StorageConfig};

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    review: Option<ReviewConfig>,
    cache: Option<CacheConfig>,
    llm: Option<LlmConfig>,
    storage: Option<StorageConfig>,
}

/// Environment variables that override file and default values.
pub(crate) const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("REQFLOW_AUTO_APPROVE_THRESHOLD", "review.auto_approve_threshold"),
    ("REQFLOW_REVIEW_ENABLED", "review.enabled"),
    ("REQFLOW_CONFLICT_DETECTION", "review.conflict_detection"),
    ("REQFLOW_CACHE_TTL_HOURS", "cache.ttl_hours"),
    ("REQFLOW_CACHE_MAX_ENTRIES", "cache.max_memory_entries"),
    ("REQFLOW_LLM_PROVIDER", "llm.provider"),
];

fn parse_env<T: FromStr>(var: &str, key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: format!("{var}={raw} could not be parsed"),
    })
}

fn parse_bool(var: &str, key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: format!("{var}={raw} is not a boolean"),
        }),
    }
}

impl Config {
    /// Discover and load configuration with precedence: env > file > defaults
    pub fn discover() -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, None)
    }

    /// Discover starting from a specific directory, or load `explicit` if given.
    pub fn discover_from(start_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        Self::discover_with_env(start_dir, explicit, &|var| std::env::var(var).ok())
    }

    /// Path-driven variant with an injected environment lookup, used by tests
    /// to avoid process-global state.
    pub fn discover_with_env(
        start_dir: &Path,
        explicit: Option<&Path>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self::defaults();

        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound {
                        path: path.display().to_string(),
                    }
                    .into());
                }
                Some(path.to_path_buf())
            }
            None => match Self::home_config_file(env) {
                Some(path) => Some(path),
                None => Self::discover_config_file_from(start_dir)?,
            },
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            config.apply_file(file_config, path);
        }

        config.apply_env_overrides(env)?;
        config.validate()?;
        Ok(config)
    }

    /// `$REQFLOW_HOME/config.toml` when the variable is set and the file exists.
    fn home_config_file(env: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
        let home = env("REQFLOW_HOME").filter(|h| !h.is_empty())?;
        let path = PathBuf::from(home).join("config.toml");
        path.exists().then_some(path)
    }

    /// Walk up from `start_dir` looking for `.reqflow/config.toml`, stopping at
    /// repository root markers (.git, .hg, .svn) or the filesystem root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current = Some(start_dir);

        while let Some(dir) = current {
            let config_path = dir.join(".reqflow").join("config.toml");
            if config_path.exists() {
                return Ok(Some(config_path));
            }

            if dir.join(".git").exists() || dir.join(".hg").exists() || dir.join(".svn").exists()
            {
                break;
            }

            current = dir.parent();
        }

        Ok(None)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).map_err(|e| ConfigError::InvalidFile(e.to_string()).into())
    }

    fn apply_file(&mut self, file: TomlConfig, path: &Path) {
        let source = ConfigSource::ConfigFile(path.to_path_buf());
        let attribution = &mut self.source_attribution;
        let mut mark = |key: &str| {
            attribution.insert(key.to_string(), source.clone());
        };

        macro_rules! take {
            ($section:expr, $target:expr, $field:ident, $key:literal) => {
                if $section.$field.is_some() {
                    $target.$field = $section.$field;
                    mark($key);
                }
            };
        }

        if let Some(review) = file.review {
            take!(review, self.review, auto_approve_threshold, "review.auto_approve_threshold");
            take!(review, self.review, enabled, "review.enabled");
            take!(review, self.review, conflict_detection, "review.conflict_detection");
        }

        if let Some(cache) = file.cache {
            take!(cache, self.cache, enabled, "cache.enabled");
            take!(cache, self.cache, ttl_hours, "cache.ttl_hours");
            take!(cache, self.cache, max_memory_entries, "cache.max_memory_entries");
            take!(cache, self.cache, dir, "cache.dir");
        }

        if let Some(llm) = file.llm {
            take!(llm, self.llm, provider, "llm.provider");
            take!(llm, self.llm, model, "llm.model");
            take!(llm, self.llm, timeout_secs, "llm.timeout_secs");
            take!(llm, self.llm, max_attempts, "llm.max_attempts");
            take!(llm, self.llm, initial_backoff_ms, "llm.initial_backoff_ms");
            take!(llm, self.llm, max_backoff_ms, "llm.max_backoff_ms");
            if llm.anthropic.is_some() {
                self.llm.anthropic = llm.anthropic;
            }
            if llm.claude.is_some() {
                self.llm.claude = llm.claude;
            }
        }

        if let Some(storage) = file.storage {
            take!(storage, self.storage, dir, "storage.dir");
        }
    }

    /// Apply `REQFLOW_*` overrides. Empty values are ignored.
    pub fn apply_env_overrides(
        &mut self,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        for (var, key) in ENV_OVERRIDES {
            let Some(raw) = env(var).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            match *key {
                "review.auto_approve_threshold" => {
                    self.review.auto_approve_threshold = Some(parse_env(var, key, &raw)?);
                }
                "review.enabled" => self.review.enabled = Some(parse_bool(var, key, &raw)?),
                "review.conflict_detection" => {
                    self.review.conflict_detection = Some(parse_bool(var, key, &raw)?);
                }
                "cache.ttl_hours" => self.cache.ttl_hours = Some(parse_env(var, key, &raw)?),
                "cache.max_memory_entries" => {
                    self.cache.max_memory_entries = Some(parse_env(var, key, &raw)?);
                }
                "llm.provider" => self.llm.provider = Some(raw.trim().to_string()),
                _ => continue,
            }
            self.source_attribution
                .insert((*key).to_string(), ConfigSource::Env((*var).to_string()));
        }
        Ok(())
    }
}
