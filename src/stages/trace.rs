//! Inspiration trace (`inspiration_trace`): how the authors likely arrived
//! at their idea, reconstructed from the full text.

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{StageKind, StageOutput};
use crate::stages::generate::{fingerprint, generate};
use crate::stages::{Stage, StageDeps, StageInput};

const SYSTEM_PROMPT: &str = "You are a research mentor who reconstructs the reasoning \
behind papers: the observations, gaps and hypotheses that led to the final method. \
You answer in Chinese.";

pub struct TraceStage {
    deps: StageDeps,
}

impl TraceStage {
    pub fn new(deps: StageDeps) -> Self {
        Self { deps }
    }

    fn prompt(title: &str, content: &str) -> String {
        format!(
            "Trace the line of thought behind the paper \"{title}\".\n\n\
             Paper content:\n{content}\n\n\
             Cover, in order:\n\
             1. The observation or problem that started the work\n\
             2. Why existing approaches fall short\n\
             3. The key insight or hypothesis\n\
             4. How that insight became the concrete method\n\
             5. How the experiments confirm the insight\n\n\
             Keep it logical and concise. Keep technical terms in English."
        )
    }
}

#[async_trait]
impl Stage for TraceStage {
    fn kind(&self) -> StageKind {
        StageKind::Trace
    }

    fn needs_content(&self) -> bool {
        true
    }

    async fn run(&self, input: StageInput<'_>) -> Result<StageOutput> {
        let content = input
            .content
            .ok_or_else(|| AppError::stage(self.kind().as_str(), &input.paper.id, "no content"))?;

        let key = fingerprint(self.kind(), &input.paper.title, content);
        generate(
            &self.deps,
            self.kind(),
            &key,
            SYSTEM_PROMPT,
            Self::prompt(&input.paper.title, content),
        )
        .await
    }
}
