// src/error.rs

//! Unified error handling for the enrichment pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed before a response was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote service answered with a non-success status
    #[error("{service} returned status {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    /// Remote service asked us to slow down
    #[error("{service} rate limited the request")]
    RateLimited { service: String },

    /// Network failure reported by a non-reqwest transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Completion service returned something we cannot use
    #[error("LLM error ({model}): {message}")]
    Llm { model: String, message: String },

    /// Ledger file exists but cannot be parsed
    #[error("Ledger {path} is corrupt: {message}")]
    LedgerCorrupt { path: String, message: String },

    /// Flush would drop items present in the snapshot on disk
    #[error("Refusing to write ledger {batch}: {next} items would replace {stored} on disk")]
    SnapshotShrunk {
        batch: String,
        stored: usize,
        next: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Stage failed for a specific item
    #[error("Stage {stage} failed for {item}: {message}")]
    Stage {
        stage: String,
        item: String,
        message: String,
    },
}

impl AppError {
    /// Create a status error for a named service.
    pub fn status(service: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            service: service.into(),
            status,
            body: body.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl fmt::Display) -> Self {
        Self::Transport(message.to_string())
    }

    /// Create an LLM error.
    pub fn llm(model: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Llm {
            model: model.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a stage error with context.
    pub fn stage(
        stage: impl Into<String>,
        item: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        Self::Stage {
            stage: stage.into(),
            item: item.into(),
            message: message.to_string(),
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Network failures (including a body cut off mid-read), non-success
    /// statuses and rate limiting are transient. Everything else is a
    /// programming, data or configuration problem and is returned to the
    /// caller on the first attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_status() || e.is_body()
            }
            AppError::Status { .. } | AppError::RateLimited { .. } | AppError::Transport(_) => {
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_transient() {
        assert!(AppError::status("reader", 503, "busy").is_transient());
        assert!(AppError::transport("connection reset").is_transient());
        assert!(
            AppError::RateLimited {
                service: "llm".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!AppError::config("missing key").is_transient());
        assert!(!AppError::llm("gpt", "empty choices").is_transient());
        assert!(!AppError::stage("summary", "A", "boom").is_transient());
    }

    #[test]
    fn test_display() {
        let err = AppError::status("reader", 429, "slow down");
        assert_eq!(err.to_string(), "reader returned status 429: slow down");
    }
}
