//! Snapshot guard for ledger flushes.
//!
//! Merging only ever adds or replaces papers, so a flush that would replace
//! the snapshot on disk with fewer papers means the file changed under us
//! (another run on the same batch absorbed more input). The write is aborted
//! instead of dropping those papers.

use crate::error::{AppError, Result};

/// Result of a snapshot check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotCheck {
    /// Safe to proceed with the write
    Safe { stored: usize, next: usize },
    /// No previous snapshot
    ColdStart { next: usize },
    /// Fewer papers than are on disk, abort write
    Shrunk { stored: usize, next: usize },
}

/// Guard comparing the paper count on disk with the count being written.
#[derive(Debug, Clone, Default)]
pub struct SnapshotGuard;

impl SnapshotGuard {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, stored: usize, next: usize) -> SnapshotCheck {
        if stored == 0 {
            return SnapshotCheck::ColdStart { next };
        }
        if next < stored {
            return SnapshotCheck::Shrunk { stored, next };
        }
        SnapshotCheck::Safe { stored, next }
    }

    /// Validate and return Ok if safe, Err if the snapshot shrank.
    pub fn validate(&self, batch: &str, stored: usize, next: usize) -> Result<()> {
        match self.check(stored, next) {
            SnapshotCheck::Safe { stored, next } => {
                log::debug!("Snapshot guard: SAFE ({} papers, was {})", next, stored);
                Ok(())
            }
            SnapshotCheck::ColdStart { next } => {
                log::debug!("Snapshot guard: COLD START ({} papers)", next);
                Ok(())
            }
            SnapshotCheck::Shrunk { stored, next } => {
                log::error!(
                    "Snapshot guard: TRIGGERED for {}! {} → {} papers",
                    batch,
                    stored,
                    next
                );
                Err(AppError::SnapshotShrunk {
                    batch: batch.to_string(),
                    stored,
                    next,
                })
            }
        }
    }
}
