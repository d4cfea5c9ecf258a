// src/pipeline/run.rs

//! Batch entry points: wire services from configuration and run a pass.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Config, Paper, StageKind};
use crate::pipeline::{BatchOrchestrator, BatchReport, CancelFlag, RetryPolicy, RunOptions};
use crate::services::{CompletionClient, ContentFetcher, JinaReader, OpenAiClient};
use crate::stages::{ContentSource, StageDeps, StagePlan};
use crate::storage::{CacheStore, Ledger, LedgerStorage};
use crate::utils::log;

/// Read a JSON array of papers.
pub async fn load_input(path: &Path) -> Result<Vec<Paper>> {
    let bytes = tokio::fs::read(path).await?;
    let papers: Vec<Paper> = serde_json::from_slice(&bytes)
        .map_err(|e| AppError::validation(format!("{}: {}", path.display(), e)))?;
    Ok(papers)
}

/// Assemble an orchestrator from explicit collaborators.
pub fn build_orchestrator(
    config: &Config,
    kinds: &[StageKind],
    fetcher: Arc<dyn ContentFetcher>,
    llm: Arc<dyn CompletionClient>,
    cache: Arc<CacheStore>,
) -> BatchOrchestrator {
    let model = llm.model().to_string();
    let deps = StageDeps {
        llm,
        cache: Arc::clone(&cache),
        retry: RetryPolicy::for_llm(&config.llm),
        temperature: config.llm.temperature,
        focus: config.filter.focus.clone(),
    };
    let content = ContentSource::from_config(fetcher, cache, &config.reader);

    BatchOrchestrator::new(StagePlan::new(kinds, &deps), content, model)
        .with_options(RunOptions::from_config(&config.pipeline))
}

/// Assemble an orchestrator talking to the configured HTTP services.
pub fn connect(
    config: &Config,
    kinds: &[StageKind],
    cache: Arc<CacheStore>,
    cancel: CancelFlag,
) -> Result<BatchOrchestrator> {
    config.require_credentials()?;
    let fetcher: Arc<dyn ContentFetcher> = Arc::new(JinaReader::new(&config.reader)?);
    let llm: Arc<dyn CompletionClient> = Arc::new(OpenAiClient::new(&config.llm)?);
    Ok(build_orchestrator(config, kinds, fetcher, llm, cache).with_cancel(cancel))
}

/// Load a batch ledger, absorb new input, process it and flush.
pub async fn run_batch(
    orchestrator: &BatchOrchestrator,
    storage: &dyn LedgerStorage,
    batch: &str,
    input: Vec<Paper>,
) -> Result<BatchReport> {
    let start_time = Utc::now();
    log::header(&format!("Enriching batch {}", batch));

    log::step(1, 2, "Loading ledger");
    let mut ledger = Ledger::load(storage, batch).await?;
    let added = ledger.absorb(input);
    if added > 0 {
        ::log::info!("Added {} new papers to {}", added, batch);
    }

    let stages = orchestrator
        .plan()
        .kinds()
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    log::step(2, 2, &format!("Running stages: {}", stages));

    let report = orchestrator.process(&mut ledger, storage).await?;

    let elapsed = Utc::now().signed_duration_since(start_time);
    print_report(batch, &report, elapsed.num_seconds());
    Ok(report)
}

/// Print the human-facing summary block for a pass.
pub fn print_report(batch: &str, report: &BatchReport, elapsed_secs: i64) {
    let counts = &report.counts;
    log::summary(
        &format!("Batch {}", batch),
        &[
            ("Total", counts.total.to_string()),
            ("Skipped", counts.skipped.to_string()),
            ("Succeeded", counts.success.to_string()),
            ("Failed", counts.failed.to_string()),
            ("Deferred", counts.deferred.to_string()),
            ("Ledger writes", report.flushes.to_string()),
            ("Elapsed", format!("{}s", elapsed_secs)),
        ],
    );

    if !report.failures.is_empty() {
        log::separator();
        for failure in &report.failures {
            log::sub_item(&format!("{}: {}", failure.id, failure.reason));
        }
    }
    if report.cancelled {
        log::sub_item("Run was cancelled; re-run to process the remaining papers");
    }
}
