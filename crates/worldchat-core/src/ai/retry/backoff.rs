use std::future::Future;
use std::time::Duration;

use crate::constants::generation::{BASE_RETRY_DELAY_MS, MAX_RETRIES, MAX_RETRY_DELAY_MS};

/// Errors that know whether another attempt may succeed
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

/// Rate limits, overload and gateway failures
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504 | 529)
}

/// Exponential backoff parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries allowed after the initial attempt
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay_ms: BASE_RETRY_DELAY_MS,
            max_delay_ms: MAX_RETRY_DELAY_MS,
        }
    }
}

impl RetryConfig {
    /// A config that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// `min(base * 2^n, max)` for the n-th consecutive failure (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Run `operation`, retrying retryable failures with backoff
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < config.max_retries && error.is_retryable() => {
                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retryable failure: {}",
                    error
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Flaky(bool);

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(retryable={})", self.0)
        }
    }

    impl IsRetryable for Flaky {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_delay_curve_is_capped() {
        let config = RetryConfig::default();
        let delays: Vec<u64> = (0..5)
            .map(|n| config.delay_for_attempt(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![5000, 10000, 20000, 30000, 30000]);
        assert_eq!(config.delay_for_attempt(200).as_millis(), 30000);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_recovers() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<u32, Flaky> = with_retry(&RetryConfig::default(), || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(Flaky(true))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_stops_on_fatal_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), Flaky> = with_retry(&RetryConfig::default(), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(Flaky(false)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_gives_up_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let config = RetryConfig::default().with_max_retries(2);
        let result: Result<(), Flaky> = with_retry(&config, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(Flaky(true)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
