//! Cached LLM generation shared by the text stages.

use crate::error::Result;
use crate::models::{StageKind, StageOutput};
use crate::pipeline::call_with_retry;
use crate::services::CompletionRequest;
use crate::stages::StageDeps;
use crate::storage::Namespace;
use crate::utils::text::prefix;

/// Characters of the source text that go into a fingerprint.
pub(crate) const FINGERPRINT_PREFIX: usize = 1000;

/// Cache fingerprint for a stage over a title and a source text.
pub(crate) fn fingerprint(kind: StageKind, title: &str, source: &str) -> String {
    format!("{}:{}:{}", kind, title, prefix(source, FINGERPRINT_PREFIX))
}

/// Return the cached result for `fingerprint`, or generate and cache it.
///
/// Completion failures that survive the retry policy become
/// [`StageOutput::Failed`].
pub(crate) async fn generate(
    deps: &StageDeps,
    kind: StageKind,
    fingerprint: &str,
    system_prompt: &str,
    user_prompt: String,
) -> Result<StageOutput> {
    if let Some(hit) = deps
        .cache
        .get::<String>(Namespace::Generated, fingerprint)
        .await
    {
        log::debug!("{} cache hit", kind);
        return Ok(StageOutput::Completed(hit));
    }

    let request = CompletionRequest {
        system_prompt: system_prompt.to_string(),
        user_prompt,
        model: deps.llm.model().to_string(),
        temperature: deps.temperature,
    };

    match call_with_retry(&deps.retry, None, || deps.llm.complete(&request)).await {
        Ok(text) => {
            deps.cache.set(Namespace::Generated, fingerprint, &text).await;
            Ok(StageOutput::Completed(text))
        }
        Err(e) => {
            log::warn!("{} generation failed: {}", kind, e);
            Ok(StageOutput::Failed(e.to_string()))
        }
    }
}
