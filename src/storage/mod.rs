//! Storage abstractions for ledgers and cached results.
//!
//! - Ledger: `{output}/{batch}.json`, the durable record of a batch
//! - Cache: `{cache}/{namespace}/{sha256}.json`, disposable memoized results

pub mod cache;
pub mod ledger;
pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Paper;

// Re-export for convenience
pub use cache::{CacheStats, CacheStore, Namespace, SweepReport};
pub use ledger::Ledger;
pub use local::LocalStorage;

/// Trait for ledger storage backends.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Read a batch snapshot. `None` if the batch was never written.
    async fn load_ledger(&self, batch: &str) -> Result<Option<Vec<Paper>>>;

    /// Replace a batch snapshot atomically.
    async fn save_ledger(&self, batch: &str, papers: &[Paper]) -> Result<()>;

    /// Names of all stored batches, sorted.
    async fn list_batches(&self) -> Result<Vec<String>>;
}
