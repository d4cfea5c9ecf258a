//! Relevance filter (`filter_reason` + `filter_result`).
//!
//! Judges title and abstract against the configured research focus. The
//! raw reply is cached; the verdict is parsed from it on every run.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{StageKind, StageOutput};
use crate::stages::generate::{fingerprint, generate};
use crate::stages::{Stage, StageDeps, StageInput};
use crate::utils::text::truncate_chars;

const SYSTEM_PROMPT: &str = "You are a professional assistant who screens academic papers. \
Judge precisely whether a paper matches the given research focus.";

const RESULT_LABELS: [&str; 3] = ["结果", "Result", "result"];
const REASON_LABELS: [&str; 3] = ["理由", "Reason", "reason"];

pub struct RelevanceStage {
    deps: StageDeps,
}

impl RelevanceStage {
    pub fn new(deps: StageDeps) -> Self {
        Self { deps }
    }

    fn prompt(focus: &str, title: &str, abstract_text: &str) -> String {
        format!(
            "Research focus: {focus}\n\n\
             Keep the paper only if its core contribution builds, improves or evolves \
             methods within this focus. Exclude papers that merely apply existing methods \
             to another domain, and papers mainly about infrastructure, safety or alignment.\n\n\
             Title: {title}\n\
             Abstract: {abstract_text}\n\n\
             Answer in exactly this format:\n\
             Result: true or false\n\
             Reason: one short paragraph in Chinese"
        )
    }
}

/// Strip `label:` or `label：` from the start of a line.
fn strip_label<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    labels.iter().find_map(|label| {
        let rest = line.strip_prefix(label)?;
        rest.strip_prefix(':')
            .or_else(|| rest.strip_prefix('：'))
            .map(str::trim)
    })
}

/// Parse a `Result: ... / Reason: ...` reply.
///
/// Everything after the reason label is the reason. A reply without a
/// result line counts as irrelevant.
pub(crate) fn parse_verdict(reply: &str) -> (bool, String) {
    let mut relevant = None;
    let mut reason: Vec<&str> = Vec::new();
    let mut in_reason = false;

    for line in reply.lines().map(str::trim) {
        if in_reason {
            if !line.is_empty() {
                reason.push(line);
            }
        } else if let Some(value) = strip_label(line, &RESULT_LABELS) {
            relevant = Some(value.eq_ignore_ascii_case("true"));
        } else if let Some(first) = strip_label(line, &REASON_LABELS) {
            in_reason = true;
            if !first.is_empty() {
                reason.push(first);
            }
        }
    }

    match relevant {
        Some(relevant) if !reason.is_empty() => (relevant, reason.join(" ")),
        Some(relevant) => (relevant, "No reason given".to_string()),
        None => (
            false,
            format!("Unparseable verdict: {}", truncate_chars(reply, 100)),
        ),
    }
}

#[async_trait]
impl Stage for RelevanceStage {
    fn kind(&self) -> StageKind {
        StageKind::Relevance
    }

    fn needs_content(&self) -> bool {
        false
    }

    async fn run(&self, input: StageInput<'_>) -> Result<StageOutput> {
        let title = input.paper.title.trim();
        let abstract_text = input.paper.summary.trim();
        if title.is_empty() || abstract_text.is_empty() {
            return Ok(StageOutput::Failed("missing title or abstract".into()));
        }

        let key = fingerprint(
            self.kind(),
            &format!("{}:{}", self.deps.focus, title),
            abstract_text,
        );
        let output = generate(
            &self.deps,
            self.kind(),
            &key,
            SYSTEM_PROMPT,
            Self::prompt(&self.deps.focus, title, abstract_text),
        )
        .await?;

        Ok(match output {
            StageOutput::Completed(reply) => {
                let (relevant, reason) = parse_verdict(&reply);
                StageOutput::Judged { relevant, reason }
            }
            other => other,
        })
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

    #[test]
    fn test_parse_verdict_multiline_reason() {
        let (relevant, reason) = parse_verdict("结果: true\n理由：提出了新的多智能体框架。\n\n并验证了效果。");
        assert!(relevant);
        assert_eq!(reason, "提出了新的多智能体框架。 并验证了效果。");
    }

    #[test]
    fn test_parse_verdict_english_labels() {
        let (relevant, reason) = parse_verdict("Result: FALSE\nReason: Applies GPT-4 to finance.");
        assert!(!relevant);
        assert_eq!(reason, "Applies GPT-4 to finance.");
    }

    #[test]
    fn test_unparseable_reply_is_irrelevant() {
        let (relevant, reason) = parse_verdict("I think so");
        assert!(!relevant);
        assert!(reason.starts_with("Unparseable verdict"));
    }

    struct Verdict(&'static str);

    #[async_trait]
    impl CompletionClient for Verdict {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            assert!(request.user_prompt.contains("LLM agents"));
            Ok(self.0.to_string())
        }

        fn model(&self) -> &str {
            "verdict"
        }
    }

    fn stage(reply: &'static str) -> RelevanceStage {
        RelevanceStage::new(StageDeps {
            llm: Arc::new(Verdict(reply)),
            cache: Arc::new(
                CacheStore::new(LocalStorage::new("unused"), Duration::from_secs(1))
                    .with_enabled(false),
            ),
            retry: RetryPolicy::default(),
            temperature: 0.1,
            focus: "LLM agents".into(),
        })
    }

    #[tokio::test]
    async fn test_run_returns_verdict() {
        let mut paper = Paper::new("A", "Agent Societies", "L");
        paper.summary = "We build a society of agents.".into();

        let output = stage("Result: true\nReason: Multi-agent framework.")
            .run(StageInput {
                paper: &paper,
                content: None,
            })
            .await
            .unwrap();
        assert_eq!(
            output,
            StageOutput::Judged {
                relevant: true,
                reason: "Multi-agent framework.".into()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_abstract_fails_without_call() {
        let paper = Paper::new("A", "Agent Societies", "L");
        let output = stage("unused")
            .run(StageInput {
                paper: &paper,
                content: None,
            })
            .await
            .unwrap();
        assert!(output.is_failed());
    }
}
