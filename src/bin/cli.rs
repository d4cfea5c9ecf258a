//! paperflow CLI
//!
//! Enrich paper batches with summaries, translations, inspiration traces and
//! the optional relevance, insight and evaluation stages.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use paperflow::{
    config,
    error::{AppError, Result},
    models::{Config, FieldStatus, StageKind},
    pipeline::{self, CancelFlag, RunOptions, ScanReport},
    storage::{CacheStore, Ledger, LedgerStorage, LocalStorage},
    utils::log as report,
};

/// paperflow - resumable paper enrichment pipeline
#[derive(Parser, Debug)]
#[command(name = "paperflow", version, about = "Resumable paper enrichment pipeline")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Batch name; the ledger is {output}/{batch}.json
    #[arg(short, long)]
    batch: Option<String>,

    /// JSON array of papers to add to the batch (batch defaults to the file stem)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Stages to run, comma separated
    /// (relevance, summary, translation, trace, insights, evaluation)
    #[arg(long, default_value = "summary,translation,trace")]
    stages: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enrich every paper of a batch that still has work
    Process {
        #[command(flatten)]
        batch: BatchArgs,

        /// Papers processed concurrently
        #[arg(short, long)]
        workers: Option<usize>,

        /// Process at most this many papers
        #[arg(long)]
        max_items: Option<usize>,

        /// Ignore cached results but still write fresh ones
        #[arg(long)]
        refresh_cache: bool,

        /// Disable the cache entirely
        #[arg(long, conflicts_with = "refresh_cache")]
        no_cache: bool,

        /// Only report what would be processed
        #[arg(long)]
        dry_run: bool,
    },

    /// Report missing and failed fields without processing.
    /// Scans every stored batch when neither --batch nor --input is given.
    Scan {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Inspect or clean the cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Validate configuration
    Validate,

    /// Show stored batches
    Info,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Entry counts per namespace
    Stats,
    /// Delete expired entries
    Sweep,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Batch name from `--batch`, or the stem of `--input`.
fn resolve_batch(args: &BatchArgs) -> Result<String> {
    if let Some(batch) = &args.batch {
        return Ok(batch.clone());
    }
    args.input
        .as_deref()
        .and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::config("either --batch or --input is required"))
}

/// Ledger papers plus any new papers from `--input`.
async fn load_papers(storage: &LocalStorage, batch: &str, args: &BatchArgs) -> Result<Ledger> {
    let mut ledger = Ledger::load(storage, batch).await?;
    if let Some(input) = &args.input {
        let papers = pipeline::load_input(input).await?;
        let added = ledger.absorb(papers);
        log::info!("{} new papers from {}", added, input.display());
    }
    Ok(ledger)
}

fn print_scan(batch: &str, scan: &ScanReport) {
    let mut items = vec![("Total", scan.total.to_string())];
    for (kind, stage) in &scan.stages {
        items.push((
            kind.as_str(),
            format!("{} missing, {} failed", stage.missing.len(), stage.failed.len()),
        ));
    }
    items.push(("Excluded", scan.excluded.to_string()));
    items.push(("To process", scan.to_process.to_string()));
    report::summary(&format!("Scan of {}", batch), &items);

    for (kind, stage) in &scan.stages {
        for id in &stage.failed {
            log::debug!("{} failed for {}", kind, id);
        }
    }
}

/// Cancel the run on Ctrl-C. In-flight papers finish; nothing new starts.
fn install_ctrl_c(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, finishing in-flight papers...");
            cancel.cancel();
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::load_config(&cli.config)?;
    log::debug!("Loaded configuration from {}", cli.config.display());

    let storage = LocalStorage::new(&config.paths.output);

    match cli.command {
        Command::Process {
            batch: args,
            workers,
            max_items,
            refresh_cache,
            no_cache,
            dry_run,
        } => {
            let batch = resolve_batch(&args)?;
            let kinds = StageKind::parse_list(&args.stages)?;

            if dry_run {
                let ledger = load_papers(&storage, &batch, &args).await?;
                print_scan(&batch, &pipeline::scan(ledger.papers(), &kinds));
                return Ok(());
            }

            let cache = CacheStore::from_config(&config.paths.cache, &config.cache)
                .with_enabled(config.cache.enabled && !no_cache)
                .with_bypass_reads(refresh_cache);

            let cancel = CancelFlag::new();
            install_ctrl_c(cancel.clone());

            let mut options = RunOptions::from_config(&config.pipeline);
            if let Some(workers) = workers {
                options.concurrency = workers;
            }
            options.max_items = max_items;

            let orchestrator = pipeline::connect(&config, &kinds, Arc::new(cache), cancel)?
                .with_options(options);

            let input = match &args.input {
                Some(path) => pipeline::load_input(path).await?,
                None => Vec::new(),
            };
            let outcome = pipeline::run_batch(&orchestrator, &storage, &batch, input).await?;

            if outcome.counts.failed > 0 {
                log::warn!(
                    "{} papers failed; re-run to retry them",
                    outcome.counts.failed
                );
            }
        }

        Command::Scan { batch: args } => {
            let kinds = StageKind::parse_list(&args.stages)?;
            if args.batch.is_none() && args.input.is_none() {
                let reports = pipeline::scan_all(&storage, &kinds).await?;
                if reports.is_empty() {
                    log::info!("No batches found in {}", config.paths.output.display());
                }
                for (batch, scan) in &reports {
                    print_scan(batch, scan);
                }
            } else {
                let batch = resolve_batch(&args)?;
                let ledger = load_papers(&storage, &batch, &args).await?;
                print_scan(&batch, &pipeline::scan(ledger.papers(), &kinds));
            }
        }

        Command::Cache { action } => {
            let cache = CacheStore::from_config(&config.paths.cache, &config.cache);
            match action {
                CacheAction::Stats => {
                    let stats = cache.stats().await;
                    let mut items: Vec<(&str, String)> = stats
                        .namespaces
                        .iter()
                        .map(|(ns, count)| (ns.as_str(), count.to_string()))
                        .collect();
                    items.push(("Total", stats.total.to_string()));
                    report::summary(
                        &format!("Cache at {}", config.paths.cache.display()),
                        &items,
                    );
                }
                CacheAction::Sweep => {
                    let swept = cache.sweep().await;
                    report::summary(
                        "Cache sweep",
                        &[
                            ("Scanned", swept.scanned.to_string()),
                            ("Removed", swept.removed.to_string()),
                        ],
                    );
                }
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            log::info!("✓ Config OK");
            match config.require_credentials() {
                Ok(()) => log::info!("✓ Credentials present"),
                Err(e) => log::warn!("{}", e),
            }
        }

        Command::Info => show_info(&config, &storage).await?,
    }

    Ok(())
}

async fn show_info(config: &Config, storage: &LocalStorage) -> Result<()> {
    log::info!("Ledger directory: {}", config.paths.output.display());
    log::info!("Cache directory: {}", config.paths.cache.display());
    log::info!("Model: {}", config.llm.model);

    let batches = storage.list_batches().await?;
    if batches.is_empty() {
        log::info!("No batches found yet.");
        return Ok(());
    }

    report::header("Batches");
    for batch in batches {
        match Ledger::load(storage, &batch).await {
            Ok(ledger) => {
                let done = ledger
                    .papers()
                    .iter()
                    .filter(|p| p.is_satisfied(&StageKind::DEFAULT))
                    .count();
                let failed = ledger
                    .papers()
                    .iter()
                    .filter(|p| {
                        StageKind::ALL
                            .iter()
                            .any(|k| p.status(*k) == FieldStatus::Failed)
                    })
                    .count();
                report::sub_item(&format!(
                    "{}: {} papers, {} complete, {} with failures",
                    batch,
                    ledger.len(),
                    done,
                    failed
                ));
            }
            Err(e) => report::sub_item(&format!("{}: unreadable ({})", batch, e)),
        }
    }
    Ok(())
}
