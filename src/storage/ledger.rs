//! In-memory ledger for one batch.
//!
//! The ledger owns the paper list while a batch is being processed. Papers
//! are keyed by `id`; merging replaces a paper wholesale, so a paper is
//! either in its pre-run state or fully updated.

use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::models::Paper;
use crate::pipeline::SnapshotGuard;
use crate::storage::LedgerStorage;
use crate::utils::url::extract_arxiv_id;

#[derive(Debug, Clone)]
pub struct Ledger {
    batch: String,
    papers: Vec<Paper>,
    index: HashMap<String, usize>,
    dirty: bool,
    guard: SnapshotGuard,
}

impl Ledger {
    /// Empty ledger for a batch that has never been written.
    pub fn new(batch: impl Into<String>) -> Self {
        Self {
            batch: batch.into(),
            papers: Vec::new(),
            index: HashMap::new(),
            dirty: false,
            guard: SnapshotGuard::new(),
        }
    }

    /// Build a ledger from a persisted snapshot, rejecting duplicate ids.
    pub fn from_snapshot(batch: impl Into<String>, papers: Vec<Paper>) -> Result<Self> {
        let batch = batch.into();
        let mut index = HashMap::with_capacity(papers.len());
        for (pos, paper) in papers.iter().enumerate() {
            if index.insert(paper.id.clone(), pos).is_some() {
                return Err(AppError::LedgerCorrupt {
                    path: batch,
                    message: format!("duplicate id '{}'", paper.id),
                });
            }
        }

        Ok(Self {
            batch,
            papers,
            index,
            dirty: false,
            guard: SnapshotGuard::new(),
        })
    }

    /// Load the batch from storage, or start empty if it does not exist.
    pub async fn load(storage: &dyn LedgerStorage, batch: &str) -> Result<Self> {
        match storage.load_ledger(batch).await? {
            Some(papers) => {
                log::info!("Loaded ledger {} with {} papers", batch, papers.len());
                Self::from_snapshot(batch, papers)
            }
            None => {
                log::info!("No ledger for {}, starting empty", batch);
                Ok(Self::new(batch))
            }
        }
    }

    /// Add input papers whose id is not yet known. Returns how many were added.
    ///
    /// Papers without an id take the arXiv id found in their link.
    ///
    /// Known papers keep their ledger state; the input never overwrites
    /// derived fields.
    pub fn absorb(&mut self, incoming: impl IntoIterator<Item = Paper>) -> usize {
        let mut added = 0;
        for mut paper in incoming {
            if paper.id.trim().is_empty() {
                match extract_arxiv_id(&paper.link) {
                    Some(id) => paper.id = id,
                    None => {
                        log::warn!("Ignoring input paper without id: {}", paper.short_title(50));
                        continue;
                    }
                }
            }
            if self.index.contains_key(&paper.id) {
                continue;
            }
            self.index.insert(paper.id.clone(), self.papers.len());
            self.papers.push(paper);
            added += 1;
        }
        if added > 0 {
            self.dirty = true;
        }
        added
    }

    /// Replace the stored paper with the same id, or append it.
    pub fn merge(&mut self, paper: Paper) {
        match self.index.get(&paper.id) {
            Some(&pos) => {
                if self.papers[pos] == paper {
                    return;
                }
                self.papers[pos] = paper;
            }
            None => {
                self.index.insert(paper.id.clone(), self.papers.len());
                self.papers.push(paper);
            }
        }
        self.dirty = true;
    }

    /// Write the ledger if anything changed since the last flush.
    ///
    /// The snapshot currently on disk is re-read first; a write that would
    /// leave fewer papers than it holds fails with
    /// [`AppError::SnapshotShrunk`]. Returns whether a write happened.
    pub async fn flush(&mut self, storage: &dyn LedgerStorage) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        let stored = storage
            .load_ledger(&self.batch)
            .await?
            .map_or(0, |papers| papers.len());
        self.guard.validate(&self.batch, stored, self.papers.len())?;
        storage.save_ledger(&self.batch, &self.papers).await?;

        self.dirty = false;
        log::debug!("Flushed ledger {} ({} papers)", self.batch, self.papers.len());
        Ok(true)
    }

    pub fn get(&self, id: &str) -> Option<&Paper> {
        self.index.get(id).map(|&pos| &self.papers[pos])
    }

    pub fn papers(&self) -> &[Paper] {
        &self.papers
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StageKind;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    fn paper(id: &str) -> Paper {
        Paper::new(id, format!("Paper {id}"), format!("https://arxiv.org/abs/{id}"))
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Ledger::from_snapshot("b", vec![paper("A"), paper("A")]).unwrap_err();
        assert!(matches!(err, AppError::LedgerCorrupt { .. }));
    }

    #[test]
    fn test_absorb_keeps_existing_state() {
        let mut done = paper("A");
        done.set_derived(StageKind::Summary, "existing".into());
        let mut ledger = Ledger::from_snapshot("b", vec![done]).unwrap();

        let added = ledger.absorb(vec![paper("A"), paper("B"), paper("B")]);
        assert_eq!(added, 1);
        assert_eq!(ledger.len(), 2);
        assert_eq!(
            ledger.get("A").unwrap().derived(StageKind::Summary),
            Some("existing")
        );
    }

    #[test]
    fn test_absorb_derives_missing_id_from_link() {
        let mut ledger = Ledger::new("b");
        let anonymous = Paper::new("", "T", "https://arxiv.org/abs/2509.18083");
        let hopeless = Paper::new("", "T", "https://example.com");

        assert_eq!(ledger.absorb(vec![anonymous, hopeless]), 1);
        assert!(ledger.get("2509.18083").is_some());
    }

    #[test]
    fn test_merge_unchanged_is_clean() {
        let mut ledger = Ledger::from_snapshot("b", vec![paper("A")]).unwrap();
        ledger.merge(paper("A"));
        assert!(!ledger.is_dirty());

        let mut updated = paper("A");
        updated.set_derived(StageKind::Trace, "trace".into());
        ledger.merge(updated);
        assert!(ledger.is_dirty());
    }

    #[tokio::test]
    async fn test_flush_and_reload() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let mut ledger = Ledger::load(&storage, "b").await.unwrap();
        assert!(ledger.is_empty());
        ledger.absorb(vec![paper("A"), paper("B")]);
        assert!(ledger.flush(&storage).await.unwrap());
        assert!(!ledger.flush(&storage).await.unwrap());

        let reloaded = Ledger::load(&storage, "b").await.unwrap();
        assert_eq!(reloaded.papers(), ledger.papers());
    }

    #[tokio::test]
    async fn test_flush_refuses_to_drop_papers_written_elsewhere() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.save_ledger("b", &[paper("A")]).await.unwrap();

        let mut ledger = Ledger::load(&storage, "b").await.unwrap();
        // A concurrent run on the same batch appends two papers.
        storage
            .save_ledger("b", &[paper("A"), paper("B"), paper("C")])
            .await
            .unwrap();

        let mut updated = paper("A");
        updated.set_derived(StageKind::Summary, "done".into());
        ledger.merge(updated);

        let err = ledger.flush(&storage).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::SnapshotShrunk {
                stored: 3,
                next: 1,
                ..
            }
        ));
        let on_disk = storage.load_ledger("b").await.unwrap().unwrap();
        assert_eq!(on_disk.len(), 3);
        assert!(ledger.is_dirty());
    }
}
