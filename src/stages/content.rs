//! Full-text prerequisite shared by the content stages.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::ReaderConfig;
use crate::pipeline::{RateLimiter, RetryPolicy, call_with_retry};
use crate::services::ContentFetcher;
use crate::storage::{CacheStore, Namespace};
use crate::utils::text::truncate_content;

/// Loads a paper's text once, through cache, rate limiter and retries.
#[derive(Clone)]
pub struct ContentSource {
    fetcher: Arc<dyn ContentFetcher>,
    cache: Arc<CacheStore>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    max_chars: usize,
}

impl ContentSource {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        cache: Arc<CacheStore>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        max_chars: usize,
    ) -> Self {
        Self {
            fetcher,
            cache,
            limiter,
            retry,
            max_chars,
        }
    }

    /// Wire up from reader settings.
    pub fn from_config(
        fetcher: Arc<dyn ContentFetcher>,
        cache: Arc<CacheStore>,
        config: &ReaderConfig,
    ) -> Self {
        Self::new(
            fetcher,
            cache,
            Arc::new(RateLimiter::new(config.requests_per_minute)),
            RetryPolicy::for_reader(config),
            config.max_content_chars,
        )
    }

    /// Text for `link`, truncated to the configured length.
    pub async fn load(&self, link: &str) -> Result<String> {
        let link = link.trim();
        if link.is_empty() {
            return Err(AppError::validation("paper has no link"));
        }

        if let Some(content) = self.cache.get::<String>(Namespace::Content, link).await {
            log::debug!("Content cache hit for {}", link);
            return Ok(content);
        }

        let raw = call_with_retry(&self.retry, Some(self.limiter.as_ref()), || {
            self.fetcher.fetch(link)
        })
        .await?;
        if raw.trim().is_empty() {
            return Err(AppError::stage("content", link, "empty document"));
        }

        let content = truncate_content(&raw, self.max_chars);
        if content != raw {
            log::info!("Content for {} truncated to {} chars", link, self.max_chars);
        }
        self.cache.set(Namespace::Content, link, &content).await;
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixed {
        body: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentFetcher for Fixed {
        async fn fetch(&self, _link: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.to_string())
        }
    }

    fn source(tmp: &TempDir, fetcher: Arc<Fixed>, max_chars: usize) -> ContentSource {
        let cache = CacheStore::new(LocalStorage::new(tmp.path()), Duration::from_secs(3600));
        ContentSource::new(
            fetcher,
            Arc::new(cache),
            Arc::new(RateLimiter::with_interval(Duration::ZERO)),
            RetryPolicy::new(2, 2.0).with_unit(Duration::from_millis(1)),
            max_chars,
        )
    }

    #[tokio::test]
    async fn test_second_load_is_served_from_cache() {
        let tmp = TempDir::new().unwrap();
        let fetcher = Arc::new(Fixed {
            body: "full text",
            calls: AtomicUsize::new(0),
        });
        let source = source(&tmp, Arc::clone(&fetcher), 100);

        assert_eq!(source.load("2401.00001").await.unwrap(), "full text");
        assert_eq!(source.load("2401.00001").await.unwrap(), "full text");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_long_content_is_truncated() {
        let tmp = TempDir::new().unwrap();
        let fetcher = Arc::new(Fixed {
            body: "abcdefghij",
            calls: AtomicUsize::new(0),
        });
        let source = source(&tmp, fetcher, 4);

        let content = source.load("x").await.unwrap();
        assert_eq!(content, "abcd\n\n[Content truncated]");
    }

    #[tokio::test]
    async fn test_empty_document_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let fetcher = Arc::new(Fixed {
            body: "  ",
            calls: AtomicUsize::new(0),
        });
        let source = source(&tmp, fetcher, 100);

        assert!(source.load("x").await.is_err());
        assert!(source.load("").await.is_err());
    }
}
