//! Adapters for external services.
//!
//! - `reader`: document text extraction
//! - `llm`: chat completions

pub mod llm;
pub mod reader;

pub use llm::{CompletionClient, CompletionRequest, OpenAiClient};
pub use reader::{ContentFetcher, JinaReader};
