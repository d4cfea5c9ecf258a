//! Processing pipeline.
//!
//! - `rate_limiter`, `retry`: call discipline for external services
//! - `orchestrator`: bounded worker pool and ledger merging
//! - `scan`: dry-run classification
//! - `run`: batch entry points

pub mod guard;
pub mod orchestrator;
pub mod rate_limiter;
pub mod retry;
pub mod run;
pub mod scan;

pub use guard::{SnapshotCheck, SnapshotGuard};
pub use orchestrator::{
    BatchCounts, BatchOrchestrator, BatchReport, CancelFlag, ItemFailure, RunOptions,
};
pub use rate_limiter::RateLimiter;
pub use retry::{RetryPolicy, call_with_retry};
pub use run::{build_orchestrator, connect, load_input, run_batch};
pub use scan::{ScanReport, StageScan, scan, scan_all};
