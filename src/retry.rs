//! Bounded retry wrapping of fetch attempts.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Default retry budget: one initial attempt plus two retries.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

const BASE_DELAY: Duration = Duration::from_millis(100);

/// Applies bounded retries on transient failure around an adapter call.
///
/// Only `Network` and `HttpStatus(5xx)` failures are retried; `HttpStatus(4xx)`
/// and `Decode` pass through immediately. Between attempts the policy sleeps
/// with exponential backoff. After the budget is exhausted the last failure
/// is returned.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        RetryPolicy {
            max_retries,
            base_delay: BASE_DELAY,
        }
    }

    /// Override the backoff base delay.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Run `attempt` until it succeeds, fails non-transiently, or the retry
    /// budget runs out.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_transient() || attempts > self.max_retries {
                        return Err(e);
                    }

                    debug!(
                        "Fetch failed (attempt {}/{}), retrying: {}",
                        attempts,
                        self.max_retries + 1,
                        e
                    );

                    let delay = self.base_delay * 2_u32.pow(attempts - 1);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicUsize::new(0);

        let result = RetryPolicy::default()
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(FetchError::Network("unreachable".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.expect("Expected eventual success"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_returns_last_failure() {
        let calls = AtomicUsize::new(0);

        let result: Result<()> = RetryPolicy::default()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::HttpStatus(503)) }
            })
            .await;

        assert_eq!(result.expect_err("Expected failure"), FetchError::HttpStatus(503));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_error_fails_immediately() {
        let calls = AtomicUsize::new(0);

        let result: Result<()> = RetryPolicy::default()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::HttpStatus(404)) }
            })
            .await;

        assert_eq!(result.expect_err("Expected failure"), FetchError::HttpStatus(404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_decode_error_fails_immediately() {
        let calls = AtomicUsize::new(0);

        let result: Result<()> = RetryPolicy::default()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::Decode("garbled".to_string())) }
            })
            .await;

        assert!(matches!(
            result.expect_err("Expected failure"),
            FetchError::Decode(_)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let calls = AtomicUsize::new(0);

        let result: Result<()> = RetryPolicy::new(0)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::Network("unreachable".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
