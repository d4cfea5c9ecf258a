// src/lib.rs

//! paperflow: resumable, rate-limited enrichment of paper batches.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod stages;
pub mod storage;
pub mod utils;
