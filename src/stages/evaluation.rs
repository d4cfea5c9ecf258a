//! Critical evaluation (`critical_evaluation`) of the claims in the abstract.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{StageKind, StageOutput};
use crate::stages::generate::{fingerprint, generate};
use crate::stages::{Stage, StageDeps, StageInput};

const SYSTEM_PROMPT: &str = "You are a rigorous peer reviewer. You weigh claims \
against evidence and answer in Chinese.";

pub struct EvaluationStage {
    deps: StageDeps,
}

impl EvaluationStage {
    pub fn new(deps: StageDeps) -> Self {
        Self { deps }
    }

    fn prompt(title: &str, abstract_text: &str) -> String {
        format!(
            "Critically evaluate the paper \"{title}\" based on its abstract.\n\n\
             Abstract:\n{abstract_text}\n\n\
             Cover:\n\
             1. Strengths\n\
             2. Weaknesses and likely limitations\n\
             3. Whether the described evaluation supports the claims\n\
             4. An overall assessment in one sentence\n\n\
             Be fair and specific. Keep technical terms in English."
        )
    }
}

#[async_trait]
impl Stage for EvaluationStage {
    fn kind(&self) -> StageKind {
        StageKind::Evaluation
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
