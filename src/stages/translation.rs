//! Abstract translation (`summary_translation`).

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{StageKind, StageOutput};
use crate::stages::generate::{fingerprint, generate};
use crate::stages::{Stage, StageDeps, StageInput};

const SYSTEM_PROMPT: &str = "You are a professional translator of academic papers. \
You translate English abstracts into accurate, fluent Chinese.";

pub struct TranslationStage {
    deps: StageDeps,
}

impl TranslationStage {
    pub fn new(deps: StageDeps) -> Self {
        Self { deps }
    }

    fn prompt(abstract_text: &str) -> String {
        format!(
            "Translate the following English abstract into Chinese.\n\n\
             1. Stay accurate and academic\n\
             2. Keep technical terms in English with a Chinese gloss in parentheses\n\
             3. Read naturally to a Chinese researcher\n\
             4. Preserve the structure and emphasis of the original\n\n\
             Abstract:\n{abstract_text}\n\n\
             Translation:"
        )
    }
}

#[async_trait]
impl Stage for TranslationStage {
    fn kind(&self) -> StageKind {
        StageKind::Translation
    }

    fn needs_content(&self) -> bool {
        false
    }

    /// An empty abstract translates to an empty string without a call.
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
            Self::prompt(abstract_text),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Paper;
    use crate::pipeline::RetryPolicy;
    use crate::services::{CompletionClient, CompletionRequest};
    use crate::storage::{CacheStore, LocalStorage};
    use std::sync::Arc;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl CompletionClient for Echo {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            Ok(format!("translated({})", request.user_prompt.len()))
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    fn stage() -> TranslationStage {
        TranslationStage::new(StageDeps {
            llm: Arc::new(Echo),
            cache: Arc::new(
                CacheStore::new(LocalStorage::new("unused"), Duration::from_secs(1))
                    .with_enabled(false),
            ),
            retry: RetryPolicy::default(),
            temperature: 0.1,
            focus: String::new(),
        })
    }

    #[tokio::test]
    async fn test_empty_abstract_yields_empty_translation() {
        let paper = Paper::new("A", "T", "L");
        let output = stage()
            .run(StageInput {
                paper: &paper,
                content: None,
            })
            .await
            .unwrap();
        assert_eq!(output, StageOutput::Completed(String::new()));
    }

    #[tokio::test]
    async fn test_translates_abstract_without_content() {
        let mut paper = Paper::new("A", "T", "L");
        paper.summary = "We study agents.".into();
        let output = stage()
            .run(StageInput {
                paper: &paper,
                content: None,
            })
            .await
            .unwrap();
        assert!(matches!(output, StageOutput::Completed(text) if text.starts_with("translated")));
    }
}
