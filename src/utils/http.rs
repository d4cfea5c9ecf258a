// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::{LlmConfig, ReaderConfig};

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(user_agent: &str, timeout_secs: u64) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}

/// Client for the content-extraction service.
pub fn create_reader_client(config: &ReaderConfig) -> Result<reqwest::Client> {
    create_async_client(&config.user_agent, config.timeout_secs)
}

/// Client for the completion service.
pub fn create_llm_client(config: &LlmConfig) -> Result<reqwest::Client> {
    create_async_client(concat!("paperflow/", env!("CARGO_PKG_VERSION")), config.timeout_secs)
}
