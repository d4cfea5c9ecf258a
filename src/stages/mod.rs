//! Enrichment stages.
//!
//! A stage turns one paper (plus its fetched text, when it needs it) into the
//! value of one derived field. Stages consult the cache before calling out
//! and report external failures as [`StageOutput::Failed`]; an `Err` means
//! the paper must be left untouched.

pub mod content;
pub mod evaluation;
mod generate;
pub mod insights;
pub mod relevance;
pub mod summary;
pub mod trace;
pub mod translation;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Paper, StageKind, StageOutput};
use crate::pipeline::RetryPolicy;
use crate::services::CompletionClient;
use crate::storage::CacheStore;

pub use content::ContentSource;
pub use evaluation::EvaluationStage;
pub use insights::InsightsStage;
pub use relevance::RelevanceStage;
pub use summary::SummaryStage;
pub use trace::TraceStage;
pub use translation::TranslationStage;

/// What a stage gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    pub paper: &'a Paper,
    /// Full text, present when the stage declared `needs_content`
    pub content: Option<&'a str>,
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Whether the paper's full text must be fetched before `run`.
    fn needs_content(&self) -> bool;

    async fn run(&self, input: StageInput<'_>) -> Result<StageOutput>;
}

/// Shared collaborators of the LLM-backed stages.
#[derive(Clone)]
pub struct StageDeps {
    pub llm: Arc<dyn CompletionClient>,
    pub cache: Arc<CacheStore>,
    pub retry: RetryPolicy,
    pub temperature: f32,
    /// Research focus the relevance filter judges against
    pub focus: String,
}

/// Ordered list of stages run for every paper.
#[derive(Clone)]
pub struct StagePlan {
    stages: Vec<Arc<dyn Stage>>,
}

impl StagePlan {
    /// Build the standard stages for `kinds`, in pipeline order.
    pub fn new(kinds: &[StageKind], deps: &StageDeps) -> Self {
        let mut kinds = kinds.to_vec();
        kinds.sort();
        kinds.dedup();

        let stages = kinds
            .into_iter()
            .map(|kind| -> Arc<dyn Stage> {
                match kind {
                    StageKind::Relevance => Arc::new(RelevanceStage::new(deps.clone())),
                    StageKind::Summary => Arc::new(SummaryStage::new(deps.clone())),
                    StageKind::Translation => Arc::new(TranslationStage::new(deps.clone())),
                    StageKind::Trace => Arc::new(TraceStage::new(deps.clone())),
                    StageKind::Insights => Arc::new(InsightsStage::new(deps.clone())),
                    StageKind::Evaluation => Arc::new(EvaluationStage::new(deps.clone())),
                }
            })
            .collect();
        Self { stages }
    }

    /// Use custom stage implementations, run in the given order.
    pub fn from_stages(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    /// Stages that still have work for `paper`.
    pub fn pending_for(&self, paper: &Paper) -> Vec<Arc<dyn Stage>> {
        self.stages
            .iter()
            .filter(|stage| paper.needs(stage.kind()))
            .cloned()
            .collect()
    }
}
