//! Dry run: what a processing pass would do, without doing it.

use crate::error::Result;
use crate::models::{FieldStatus, Paper, StageKind};
use crate::storage::LedgerStorage;

/// Papers needing one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageScan {
    /// Ids whose field is absent or empty
    pub missing: Vec<String>,
    /// Ids whose field holds a failure marker
    pub failed: Vec<String>,
}

impl StageScan {
    pub fn pending(&self) -> usize {
        self.missing.len() + self.failed.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub total: usize,
    pub stages: Vec<(StageKind, StageScan)>,
    /// Papers with at least one pending stage
    pub to_process: usize,
    /// Papers dropped by the relevance filter
    pub excluded: usize,
}

/// Classify every paper against the plan.
pub fn scan(papers: &[Paper], plan: &[StageKind]) -> ScanReport {
    let mut stages: Vec<(StageKind, StageScan)> =
        plan.iter().map(|kind| (*kind, StageScan::default())).collect();
    let mut to_process = 0;
    let mut excluded = 0;

    for paper in papers {
        if paper.is_excluded() {
            excluded += 1;
        }
        let mut pending = false;
        for (kind, scan) in stages.iter_mut() {
            if !paper.needs(*kind) {
                continue;
            }
            match paper.status(*kind) {
                FieldStatus::Missing => scan.missing.push(paper.id.clone()),
                FieldStatus::Failed => scan.failed.push(paper.id.clone()),
                FieldStatus::Done(_) => continue,
            }
            pending = true;
        }
        if pending {
            to_process += 1;
        }
    }

    ScanReport {
        total: papers.len(),
        stages,
        to_process,
        excluded,
    }
}

/// Scan every stored batch, in name order.
///
/// A batch whose ledger cannot be read is logged and left out.
pub async fn scan_all(
    storage: &dyn LedgerStorage,
    plan: &[StageKind],
) -> Result<Vec<(String, ScanReport)>> {
    let mut reports = Vec::new();
    for batch in storage.list_batches().await? {
        match storage.load_ledger(&batch).await {
            Ok(papers) => {
                let papers = papers.unwrap_or_default();
                reports.push((batch, scan(&papers, plan)));
            }
            Err(e) => log::error!("Skipping {}: {}", batch, e),
        }
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    #[test]
    fn test_scan_classifies_fields() {
        let mut done = Paper::new("A", "T", "L");
        done.set_derived(StageKind::Summary, "ok".into());
        done.set_derived(StageKind::Translation, "ok".into());

        let mut failed = Paper::new("B", "T", "L");
        failed.set_derived(StageKind::Summary, "总结生成失败".into());
        failed.set_derived(StageKind::Translation, "ok".into());

        let fresh = Paper::new("C", "T", "L");

        let report = scan(
            &[done, failed, fresh],
            &[StageKind::Summary, StageKind::Translation],
        );
        assert_eq!(report.total, 3);
        assert_eq!(report.to_process, 2);

        let (kind, summary) = &report.stages[0];
        assert_eq!(*kind, StageKind::Summary);
        assert_eq!(summary.failed, vec!["B".to_string()]);
        assert_eq!(summary.missing, vec!["C".to_string()]);
        assert_eq!(report.stages[1].1.pending(), 1);
    }

    #[test]
    fn test_scan_skips_excluded_papers() {
        let mut dropped = Paper::new("A", "T", "L");
        dropped.filter_result = Some(false);
        dropped.filter_reason = Some("Off topic".into());

        let report = scan(&[dropped, Paper::new("B", "T", "L")], &StageKind::ALL);
        assert_eq!(report.excluded, 1);
        assert_eq!(report.to_process, 1);
        assert!(report.stages.iter().all(|(_, s)| s.missing == vec!["B".to_string()]));
    }

    #[tokio::test]
    async fn test_scan_all_covers_every_batch() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let mut done = Paper::new("A", "T", "L");
        done.set_derived(StageKind::Summary, "ok".into());
        storage.save_ledger("2025-10-01", &[done]).await.unwrap();
        storage
            .save_ledger("2025-10-02", &[Paper::new("B", "T", "L")])
            .await
            .unwrap();
        std::fs::write(tmp.path().join("2025-10-03.json"), "[{").unwrap();

        let reports = scan_all(&storage, &[StageKind::Summary]).await.unwrap();
        let names: Vec<_> = reports.iter().map(|(batch, _)| batch.as_str()).collect();
        assert_eq!(names, vec!["2025-10-01", "2025-10-02"]);
        assert_eq!(reports[0].1.to_process, 0);
        assert_eq!(reports[1].1.to_process, 1);
    }
}
