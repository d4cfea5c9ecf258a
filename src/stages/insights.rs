//! Research insights (`research_insights`) drawn from the abstract.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{StageKind, StageOutput};
use crate::stages::generate::{fingerprint, generate};
use crate::stages::{Stage, StageDeps, StageInput};

const SYSTEM_PROMPT: &str = "You are a senior researcher who distills what a paper \
teaches the field. You answer in Chinese.";

pub struct InsightsStage {
    deps: StageDeps,
}

impl InsightsStage {
    pub fn new(deps: StageDeps) -> Self {
        Self { deps }
    }

    fn prompt(title: &str, abstract_text: &str) -> String {
        format!(
            "Analyze the research insights of the paper \"{title}\".\n\n\
             Abstract:\n{abstract_text}\n\n\
             Cover:\n\
             1. The core problem and why it matters now\n\
             2. The key idea that sets this work apart\n\
             3. What it suggests for follow-up research\n\
             4. Questions it leaves open\n\n\
             Be concise. Keep technical terms in English."
        )
    }
}

#[async_trait]
impl Stage for InsightsStage {
    fn kind(&self) -> StageKind {
        StageKind::Insights
    }

    fn needs_content(&self) -> bool {
        false
    }

    async fn run(&self, input: StageInput<'_>) -> Result<StageOutput> {
        let abstract_text = input.paper.summary.trim();
        if abstract_text.is_empty() {
            return Ok(StageOutput::Completed(String::new()));
        }

        let key = fingerprint(self.kind(), &input.paper.title, abstract_text);
        generate(
            &self.deps,
            self.kind(),
            &key,
            SYSTEM_PROMPT,
            Self::prompt(&input.paper.title, abstract_text),
        )
        .await
    }
}
