use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default confidence at or above which a requirement is auto-approved
pub const DEFAULT_AUTO_APPROVE_THRESHOLD: f64 = 0.8;

/// Default cache entry lifetime in hours
pub const DEFAULT_CACHE_TTL_HOURS: u64 = 24;

/// Default cap on in-process cache entries
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 100;

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in default
    Default,
    /// Loaded from a config file
    ConfigFile(PathBuf),
    /// Overridden by the named environment variable
    Env(String),
    /// Set through [`ConfigBuilder`](super::ConfigBuilder)
    Programmatic,
}

/// Configuration for reqflow pipelines.
///
/// # Discovery
///
/// [`Config::discover()`] searches for `.reqflow/config.toml` upward from the
/// current directory, honours `REQFLOW_HOME`, then applies `REQFLOW_*`
/// environment overrides.
///
/// # Configuration File Format
///
/// ```toml
/// [review]
/// auto_approve_threshold = 0.8
/// enabled = true
/// conflict_detection = false
///
/// [cache]
/// ttl_hours = 24
/// max_memory_entries = 100
///
/// [llm]
/// provider = "anthropic"
/// model = "claude-sonnet-4-20250514"
/// max_attempts = 3
///
/// [llm.anthropic]
/// api_key_env = "ANTHROPIC_API_KEY"
///
/// [storage]
/// dir = ".reqflow/data"
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Review routing settings.
    pub review: ReviewConfig,
    /// Idempotency cache settings.
    pub cache: CacheConfig,
    /// Completion service settings.
    pub llm: LlmConfig,
    /// Job, document and artifact storage.
    pub storage: StorageConfig,
    /// Source attribution for each setting.
    pub source_attribution: HashMap<String, ConfigSource>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewConfig {
    pub auto_approve_threshold: Option<f64>,
    pub enabled: Option<bool>,
    pub conflict_detection: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: Option<bool>,
    pub ttl_hours: Option<u64>,
    pub max_memory_entries: Option<usize>,
    pub dir: Option<Utf8PathBuf>,
}

/// Completion service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// `anthropic` or `claude-cli`
    pub provider: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Attempts per call, including the first
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub anthropic: Option<AnthropicConfig>,
    pub claude: Option<ClaudeConfig>,
}

/// Anthropic HTTP provider configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Claude CLI provider configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClaudeConfig {
    pub binary: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    pub dir: Option<Utf8PathBuf>,
}

/// The pipeline-facing slice of configuration, passed explicitly into the
/// validator and orchestrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub auto_approve_threshold: f64,
    pub review_enabled: bool,
    pub conflict_detection: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            auto_approve_threshold: DEFAULT_AUTO_APPROVE_THRESHOLD,
            review_enabled: true,
            conflict_detection: false,
        }
    }
}

/// Resolved cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_memory_entries: usize,
    pub dir: Utf8PathBuf,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            auto_approve_threshold: Some(DEFAULT_AUTO_APPROVE_THRESHOLD),
            enabled: Some(true),
            conflict_detection: Some(false),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: Some(true),
            ttl_hours: Some(DEFAULT_CACHE_TTL_HOURS),
            max_memory_entries: Some(DEFAULT_CACHE_MAX_ENTRIES),
            dir: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Some("claude-cli".to_string()),
            model: None,
            timeout_secs: Some(120),
            max_attempts: Some(3),
            initial_backoff_ms: Some(1000),
            max_backoff_ms: Some(8000),
            anthropic: None,
            claude: None,
        }
    }
}
