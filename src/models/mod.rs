// src/models/mod.rs

//! Domain models for the enrichment pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod paper;
mod stage;

// Re-export all public types
pub use config::{
    CacheConfig, Config, FilterConfig, LlmConfig, PathsConfig, PipelineConfig, ReaderConfig,
};
pub use paper::Paper;
pub use stage::{FieldStatus, StageKind, StageOutput};
