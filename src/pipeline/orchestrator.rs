// src/pipeline/orchestrator.rs

//! Batch orchestrator: runs the stage plan over every paper that still has
//! work, merging finished papers into the ledger.
//!
//! Papers are processed on a bounded pool (`buffer_unordered`). Each worker
//! owns a copy of its paper and hands back either the fully updated copy or
//! an error; only the collecting loop touches the ledger.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Local;
use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{Paper, PipelineConfig, StageKind, StageOutput};
use crate::stages::{ContentSource, StageInput, StagePlan};
use crate::storage::{Ledger, LedgerStorage};

/// Shared stop signal. Setting it stops new papers from being dispatched.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Knobs for one orchestrator pass.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub concurrency: usize,
    /// Flush after this many merged papers; 0 flushes only at the end
    pub checkpoint_every: usize,
    /// Pause after each finished paper
    pub request_delay: Duration,
    /// Dispatch at most this many papers
    pub max_items: Option<usize>,
}

impl RunOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            concurrency: config.max_concurrent,
            checkpoint_every: config.checkpoint_every,
            request_delay: Duration::from_millis(config.request_delay_ms),
            max_items: None,
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Outcome counts of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchCounts {
    pub total: usize,
    pub skipped: usize,
    pub success: usize,
    pub failed: usize,
    /// Needed work but were not dispatched (item limit or cancellation)
    pub deferred: usize,
}

/// Why one paper did not finish cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: String,
    pub reason: String,
    /// Stages that recorded a failure marker; empty when the paper was left untouched
    pub stages: Vec<StageKind>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub counts: BatchCounts,
    pub failures: Vec<ItemFailure>,
    /// Ledger writes performed, including the final one
    pub flushes: usize,
    pub cancelled: bool,
}

/// Result of running the plan for one paper.
enum ItemResult {
    /// Updated paper plus any stages that produced a failure marker
    Finished(Paper, Vec<(StageKind, String)>),
    /// The paper must stay as it was
    Aborted(String, AppError),
}

pub struct BatchOrchestrator {
    plan: StagePlan,
    content: ContentSource,
    model: String,
    options: RunOptions,
    cancel: CancelFlag,
}

impl BatchOrchestrator {
    pub fn new(plan: StagePlan, content: ContentSource, model: impl Into<String>) -> Self {
        Self {
            plan,
            content,
            model: model.into(),
            options: RunOptions::default(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    /// Run one pass over the ledger, flushing at checkpoints and at the end.
    ///
    /// Per-paper failures are reported, never returned. A failed ledger
    /// write is returned as `Err`.
    pub async fn process(
        &self,
        ledger: &mut Ledger,
        storage: &dyn LedgerStorage,
    ) -> Result<BatchReport> {
        let kinds = self.plan.kinds();
        let mut report = BatchReport::default();
        report.counts.total = ledger.len();

        let needs_work: Vec<Paper> = ledger
            .papers()
            .iter()
            .filter(|paper| !paper.is_satisfied(&kinds))
            .cloned()
            .collect();
        report.counts.skipped = report.counts.total - needs_work.len();

        let limit = self.options.max_items.unwrap_or(usize::MAX);
        let work: Vec<Paper> = needs_work.iter().take(limit).cloned().collect();
        log::info!(
            "{} papers: {} already done, {} to process",
            report.counts.total,
            report.counts.skipped,
            work.len()
        );

        let concurrency = self.options.concurrency.max(1);
        let cancel = &self.cancel;
        let mut dispatched = 0usize;
        let mut merged = 0usize;

        let mut results = stream::iter(work)
            .take_while(|_| futures::future::ready(!cancel.is_cancelled()))
            .map(|paper| {
                dispatched += 1;
                self.process_item(paper)
            })
            .buffer_unordered(concurrency);

        while let Some(result) = results.next().await {
            match result {
                ItemResult::Finished(paper, stage_failures) => {
                    let id = paper.id.clone();
                    ledger.merge(paper);
                    merged += 1;

                    if stage_failures.is_empty() {
                        report.counts.success += 1;
                        log::info!("✓ {}", id);
                    } else {
                        report.counts.failed += 1;
                        let reason = stage_failures
                            .iter()
                            .map(|(kind, reason)| format!("{kind}: {reason}"))
                            .collect::<Vec<_>>()
                            .join("; ");
                        log::warn!("✗ {} ({})", id, reason);
                        report.failures.push(ItemFailure {
                            id,
                            reason,
                            stages: stage_failures.into_iter().map(|(kind, _)| kind).collect(),
                        });
                    }

                    if self.options.checkpoint_every > 0
                        && merged % self.options.checkpoint_every == 0
                        && ledger.flush(storage).await?
                    {
                        report.flushes += 1;
                        log::info!("Checkpoint: {} papers merged", merged);
                    }
                }
                ItemResult::Aborted(id, error) => {
                    report.counts.failed += 1;
                    log::warn!("✗ {} left unchanged: {}", id, error);
                    report.failures.push(ItemFailure {
                        id,
                        reason: error.to_string(),
                        stages: Vec::new(),
                    });
                }
            }

            if !self.options.request_delay.is_zero() {
                tokio::time::sleep(self.options.request_delay).await;
            }
        }
        drop(results);

        report.cancelled = self.cancel.is_cancelled();
        report.counts.deferred = needs_work.len() - dispatched;
        if report.cancelled {
            log::warn!(
                "Cancelled: {} papers were not dispatched",
                report.counts.deferred
            );
        }

        if ledger.flush(storage).await? {
            report.flushes += 1;
        }
        Ok(report)
    }

    /// Run every pending stage for one paper on a private copy.
    ///
    /// The full text is fetched once, right before the first stage that
    /// needs it. A relevance check that does not keep the paper ends the
    /// plan for it.
    async fn process_item(&self, paper: Paper) -> ItemResult {
        let pending = self.plan.pending_for(&paper);
        log::debug!(
            "Processing {} ({}): {} stages",
            paper.id,
            paper.short_title(60),
            pending.len()
        );

        let mut content: Option<String> = None;
        let mut updated = paper.clone();
        let mut stage_failures = Vec::new();
        let mut generated = false;
        for stage in pending {
            if stage.needs_content() && content.is_none() {
                let loaded = self.content.load(paper.source_link()).await;
                match loaded {
                    Ok(text) => content = Some(text),
                    Err(e) => return ItemResult::Aborted(paper.id, e),
                }
            }

            let input = StageInput {
                paper: &paper,
                content: content.as_deref(),
            };
            let result = stage.run(input).await;
            let output = match result {
                Ok(output) => output,
                Err(e) => return ItemResult::Aborted(paper.id, e),
            };

            let kind = stage.kind();
            match &output {
                StageOutput::Failed(reason) => stage_failures.push((kind, reason.clone())),
                StageOutput::Completed(text) => generated |= !text.is_empty(),
                StageOutput::Judged { .. } => {}
            }
            updated.record(kind, output);

            if kind == StageKind::Relevance && updated.filter_result != Some(true) {
                if updated.is_excluded() {
                    log::info!("Excluded {}: {}", paper.id, paper.short_title(60));
                }
                break;
            }
        }

        if generated {
            updated.summary_generated_time =
                Some(Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
            updated.summary_model = Some(self.model.clone());
        }
        ItemResult::Finished(updated, stage_failures)
    }
}
