// src/config.rs

//! Configuration loading utilities.
//!
//! File settings come first; well-known environment variables override them
//! so credentials never have to live in `config.toml`.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// API key for the completion service
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
/// Completion service base URL
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
/// Completion model name
pub const ENV_MODEL: &str = "MODEL";
/// Reader proxy bearer token
pub const ENV_READER_TOKEN: &str = "JINA_API_TOKEN";

/// Apply environment overrides using the given lookup.
pub fn apply_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = get(ENV_API_KEY) {
        config.llm.api_key = key;
    }
    if let Some(url) = get(ENV_BASE_URL) {
        config.llm.base_url = url;
    }
    if let Some(model) = get(ENV_MODEL) {
        config.llm.model = model;
    }
    if let Some(token) = get(ENV_READER_TOKEN) {
        config.reader.api_token = Some(token);
    }
}

/// Apply overrides from the process environment.
pub fn apply_env(config: &mut Config) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Load configuration from a TOML file, apply environment overrides and validate.
///
/// A missing file falls back to defaults; a malformed one is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        log::warn!("No config at {}, using defaults", path.display());
        Config::default()
    };
    apply_env(&mut config);
    config.validate()?;
    Ok(config)
}
