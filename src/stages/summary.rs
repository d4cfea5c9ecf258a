//! Full-text summary (`summary2`).

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{StageKind, StageOutput};
use crate::stages::generate::{fingerprint, generate};
use crate::stages::{Stage, StageDeps, StageInput};

const SYSTEM_PROMPT: &str = "You are an academic assistant who reads research papers \
and writes precise, high-quality summaries in Chinese.";

pub struct SummaryStage {
    deps: StageDeps,
}

impl SummaryStage {
    pub fn new(deps: StageDeps) -> Self {
        Self { deps }
    }

    fn prompt(content: &str) -> String {
        format!(
            "Write a professional academic summary of the paper below.\n\n\
             Paper content:\n{content}\n\n\
             Answer in Chinese using this shape:\n\
             This paper aims to [problem or goal]. For [input, data or setting], \
             we propose [core method], and validate it on [datasets or benchmarks] \
             with [metrics].\n\n\
             Requirements:\n\
             1. Be concise and focus on the core contribution\n\
             2. Keep technical terms in English\n\
             3. Emphasize the method and the experimental evidence\n\
             4. Stay under 200 characters"
        )
    }
}

#[async_trait]
impl Stage for SummaryStage {
    fn kind(&self) -> StageKind {
        StageKind::Summary
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
            Self::prompt(content),
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
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct CountingLlm {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CompletionClient for CountingLlm {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::status("llm", 500, "boom"));
            }
            assert!(request.user_prompt.contains("body text"));
            Ok("generated".into())
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    fn stage(tmp: &TempDir, llm: Arc<CountingLlm>) -> SummaryStage {
        SummaryStage::new(StageDeps {
            llm,
            cache: Arc::new(CacheStore::new(
                LocalStorage::new(tmp.path()),
                Duration::from_secs(3600),
            )),
            retry: RetryPolicy::new(2, 2.0).with_unit(Duration::from_millis(1)),
            temperature: 0.1,
            focus: String::new(),
        })
    }

    #[tokio::test]
    async fn test_second_run_hits_cache() {
        let tmp = TempDir::new().unwrap();
        let llm = Arc::new(CountingLlm {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let stage = stage(&tmp, Arc::clone(&llm));
        let paper = Paper::new("A", "Title", "L");
        let input = StageInput {
            paper: &paper,
            content: Some("body text"),
        };

        let first = stage.run(input).await.unwrap();
        let second = stage.run(input).await.unwrap();
        assert_eq!(first, StageOutput::Completed("generated".into()));
        assert_eq!(first, second);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_become_failed_output() {
        let tmp = TempDir::new().unwrap();
        let llm = Arc::new(CountingLlm {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let stage = stage(&tmp, Arc::clone(&llm));
        let paper = Paper::new("A", "Title", "L");

        let output = stage
            .run(StageInput {
                paper: &paper,
                content: Some("body text"),
            })
            .await
            .unwrap();
        assert!(output.is_failed());
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_content_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let llm = Arc::new(CountingLlm {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let paper = Paper::new("A", "Title", "L");
        let result = stage(&tmp, llm)
            .run(StageInput {
                paper: &paper,
                content: None,
            })
            .await;
        assert!(result.is_err());
    }
}
