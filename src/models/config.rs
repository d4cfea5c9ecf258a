//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Where ledgers and cache entries live
    #[serde(default)]
    pub paths: PathsConfig,

    /// Cache behavior
    #[serde(default)]
    pub cache: CacheConfig,

    /// Content-extraction service (reader proxy)
    #[serde(default)]
    pub reader: ReaderConfig,

    /// Completion service
    #[serde(default)]
    pub llm: LlmConfig,

    /// Worker pool and checkpointing
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Relevance filter
    #[serde(default)]
    pub filter: FilterConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_days == 0 {
            return Err(AppError::validation("cache.ttl_days must be > 0"));
        }
        if self.reader.requests_per_minute == 0 {
            return Err(AppError::validation(
                "reader.requests_per_minute must be > 0",
            ));
        }
        if self.reader.max_retries == 0 {
            return Err(AppError::validation("reader.max_retries must be > 0"));
        }
        if self.reader.timeout_secs == 0 {
            return Err(AppError::validation("reader.timeout_secs must be > 0"));
        }
        if self.reader.max_content_chars == 0 {
            return Err(AppError::validation(
                "reader.max_content_chars must be > 0",
            ));
        }
        if self.llm.max_retries == 0 {
            return Err(AppError::validation("llm.max_retries must be > 0"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(AppError::validation("llm.timeout_secs must be > 0"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(AppError::validation("llm.model is empty"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(AppError::validation("llm.temperature must be within 0..=2"));
        }
        for factor in [self.reader.backoff_factor, self.llm.backoff_factor] {
            if !factor.is_finite() || factor < 1.0 {
                return Err(AppError::validation("backoff_factor must be a finite value >= 1.0"));
            }
        }
        if self.filter.focus.trim().is_empty() {
            return Err(AppError::validation("filter.focus is empty"));
        }
        if self.pipeline.max_concurrent == 0 {
            return Err(AppError::validation("pipeline.max_concurrent must be > 0"));
        }
        url::Url::parse(&self.reader.base_url)?;
        url::Url::parse(&self.llm.base_url)?;
        Ok(())
    }

    /// Check that the credentials needed for a processing run are present.
    pub fn require_credentials(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            return Err(AppError::config(
                "llm.api_key is empty (set it in config.toml or OPENAI_API_KEY)",
            ));
        }
        Ok(())
    }

    /// Ledger file for a batch.
    pub fn ledger_path(&self, batch: &str) -> PathBuf {
        self.paths.output.join(format!("{batch}.json"))
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding one ledger file per batch
    #[serde(default = "defaults::output_dir")]
    pub output: PathBuf,

    /// Root of the cache store
    #[serde(default = "defaults::cache_dir")]
    pub cache: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output: defaults::output_dir(),
            cache: defaults::cache_dir(),
        }
    }
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Disable to turn every lookup into a miss and every write into a no-op
    #[serde(default = "defaults::cache_enabled")]
    pub enabled: bool,

    /// Entries older than this are treated as absent
    #[serde(default = "defaults::cache_ttl_days")]
    pub ttl_days: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days * 24 * 60 * 60)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::cache_enabled(),
            ttl_days: defaults::cache_ttl_days(),
        }
    }
}

/// Content-extraction service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Reader proxy prefix; the document URL is appended to it
    #[serde(default = "defaults::reader_base_url")]
    pub base_url: String,

    /// Optional bearer token
    #[serde(default)]
    pub api_token: Option<String>,

    /// External ceiling enforced by the rate limiter
    #[serde(default = "defaults::reader_rpm")]
    pub requests_per_minute: u32,

    /// Attempts per fetch, including the first one
    #[serde(default = "defaults::reader_max_retries")]
    pub max_retries: u32,

    /// Delay before retry `n` is `backoff_factor^n` seconds
    #[serde(default = "defaults::backoff_factor")]
    pub backoff_factor: f64,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Content longer than this is truncated before generation
    #[serde(default = "defaults::max_content_chars")]
    pub max_content_chars: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::reader_base_url(),
            api_token: None,
            requests_per_minute: defaults::reader_rpm(),
            max_retries: defaults::reader_max_retries(),
            backoff_factor: defaults::backoff_factor(),
            timeout_secs: defaults::timeout(),
            user_agent: defaults::user_agent(),
            max_content_chars: defaults::max_content_chars(),
        }
    }
}

/// Completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API root, e.g. `https://api.openai.com/v1`
    #[serde(default = "defaults::llm_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "defaults::llm_model")]
    pub model: String,

    #[serde(default = "defaults::temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per completion, including the first one
    #[serde(default = "defaults::llm_max_retries")]
    pub max_retries: u32,

    #[serde(default = "defaults::backoff_factor")]
    pub backoff_factor: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::llm_base_url(),
            api_key: String::new(),
            model: defaults::llm_model(),
            temperature: defaults::temperature(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::llm_max_retries(),
            backoff_factor: defaults::backoff_factor(),
        }
    }
}

/// Worker pool and checkpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Items in flight at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Flush the ledger after this many merged items (0 = only at the end)
    #[serde(default = "defaults::checkpoint_every")]
    pub checkpoint_every: usize,

    /// Pause after each completed item in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            checkpoint_every: defaults::checkpoint_every(),
            request_delay_ms: 0,
        }
    }
}

/// Relevance filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Research focus papers are judged against
    #[serde(default = "defaults::filter_focus")]
    pub focus: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            focus: defaults::filter_focus(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn output_dir() -> PathBuf {
        PathBuf::from("summary")
    }
    pub fn cache_dir() -> PathBuf {
        PathBuf::from("cache")
    }

    pub fn cache_enabled() -> bool {
        true
    }
    pub fn cache_ttl_days() -> u64 {
        30
    }

    pub fn reader_base_url() -> String {
        "https://r.jina.ai".into()
    }
    pub fn reader_rpm() -> u32 {
        20
    }
    pub fn reader_max_retries() -> u32 {
        3
    }
    pub fn backoff_factor() -> f64 {
        2.0
    }
    pub fn timeout() -> u64 {
        300
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; paperflow/0.1)".into()
    }
    pub fn max_content_chars() -> usize {
        200_000
    }

    pub fn llm_base_url() -> String {
        "https://api.openai.com/v1".into()
    }
    pub fn llm_model() -> String {
        "gpt-4o-mini".into()
    }
    pub fn temperature() -> f32 {
        0.1
    }
    pub fn llm_max_retries() -> u32 {
        2
    }

    pub fn max_concurrent() -> usize {
        10
    }
    pub fn checkpoint_every() -> usize {
        10
    }

    pub fn filter_focus() -> String {
        "LLM-based agents and their evolution: single-agent planning, memory, tool use \
         and self-reflection; multi-agent collaboration and communication; agents that \
         improve themselves from experience or feedback"
            .into()
    }
}
