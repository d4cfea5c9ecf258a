//! Bounded retries with exponential backoff.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;
use crate::models::{LlmConfig, ReaderConfig};
use crate::pipeline::RateLimiter;

/// Longest single wait between attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// How often and how patiently to retry a call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_retries: u32,
    pub backoff_factor: f64,
    /// Base delay; retry `n` waits `unit * backoff_factor^n`
    pub unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            backoff_factor,
            unit: Duration::from_secs(1),
        }
    }

    pub fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    pub fn for_reader(config: &ReaderConfig) -> Self {
        Self::new(config.max_retries, config.backoff_factor)
    }

    pub fn for_llm(config: &LlmConfig) -> Self {
        Self::new(config.max_retries, config.backoff_factor)
    }

    /// Delay after failed attempt `attempt` (0-based), capped at
    /// [`MAX_BACKOFF`].
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.unit.as_secs_f64() * self.backoff_factor.powi(exp);
        Duration::try_from_secs_f64(secs).map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 2.0)
    }
}

/// Run `op` until it succeeds, fails permanently or runs out of attempts.
///
/// Only errors for which [`AppError::is_transient`] holds are retried. When
/// a limiter is given every attempt waits for a slot first.
///
/// [`AppError::is_transient`]: crate::error::AppError::is_transient
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    limiter: Option<&RateLimiter>,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_retries.max(1);
    let mut attempt = 0;
    loop {
        if let Some(limiter) = limiter {
            limiter.acquire().await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < attempts => {
                let delay = policy.delay(attempt);
                log::warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:.1}s",
                    attempt + 1,
                    attempts,
                    e,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    log::error!("Giving up after {} attempts: {}", attempts, e);
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, 2.0).with_unit(Duration::from_millis(1))
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let policy = RetryPolicy::new(3, 2.0);
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::new(100, 2.0);
        assert_eq!(policy.delay(8), Duration::from_secs(256));
        assert_eq!(policy.delay(9), MAX_BACKOFF);
        assert_eq!(policy.delay(70), MAX_BACKOFF);
        assert_eq!(policy.delay(u32::MAX), MAX_BACKOFF);
        assert_eq!(RetryPolicy::new(3, f64::INFINITY).delay(1), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_transient_error_exhausts_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = call_with_retry(&fast(3), None, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::status("reader", 503, "unavailable"))
        })
        .await;

        assert!(matches!(result, Err(AppError::Status { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = call_with_retry(&fast(3), None, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::llm("m", "empty response"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = call_with_retry(&fast(3), None, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AppError::transport("reset"))
            } else {
                Ok("ok")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_limiter_gates_every_attempt() {
        let limiter = RateLimiter::with_interval(Duration::from_millis(30));
        let start = std::time::Instant::now();
        let result: Result<()> = call_with_retry(&fast(3), Some(&limiter), || async {
            Err(AppError::transport("down"))
        })
        .await;

        assert!(result.is_err());
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
