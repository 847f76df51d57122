//! Retry policy.
//!
//! # Responsibilities
//! - Decide whether a failed attempt is worth repeating
//! - Sleep between attempts according to the backoff schedule
//! - Bound the number of attempts
//!
//! # Design Decisions
//! - Only infrastructure kinds are retried by default
//! - Business failures return immediately, untouched
//! - After the last attempt the final error is returned as-is
//! - The wall-clock budget is enforced outside, so waits can be cut short

use std::collections::HashSet;
use std::future::Future;

use crate::backend::{BackendResult, ErrorKind};
use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    tries: u32,
    backoff: Backoff,
    retry_on: HashSet<ErrorKind>,
}

impl RetryPolicy {
    /// `tries` counts the first attempt; values below 1 are raised to 1.
    pub fn new(tries: u32, backoff: Backoff, retry_on: HashSet<ErrorKind>) -> Self {
        Self { tries: tries.max(1), backoff, retry_on }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.tries,
            Backoff::from_config(config),
            config.retry_on.iter().copied().collect(),
        )
    }

    pub fn tries(&self) -> u32 {
        self.tries
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retry_on.contains(&kind)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// runs out of attempts. `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> BackendResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        let mut attempt = 1;
        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.is_retryable(err.kind) {
                tracing::debug!(attempt, kind = %err.kind, "Error is not retryable");
                return Err(err);
            }
            if attempt >= self.tries {
                tracing::warn!(attempts = attempt, error = %err, "Retries exhausted");
                return Err(err);
            }

            let wait = self.backoff.delay_for(attempt);
            tracing::info!(
                attempt,
                max_attempts = self.tries,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "Retrying backend call"
            );
            metrics::record_retry(err.kind.as_str());
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_policy(tries: u32) -> RetryPolicy {
        let backoff = Backoff::new(Duration::ZERO, Duration::ZERO, 1.0, (0.0, 0.0));
        RetryPolicy::new(tries, backoff, ErrorKind::infra())
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(BackendError::connection("refused"))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let result: BackendResult<()> = fast_policy(3)
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(BackendError::io(format!("attempt {attempt}"))) }
            })
            .await;
        assert_eq!(result.unwrap_err().message, "attempt 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_business_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: BackendResult<()> = fast_policy(3)
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BackendError::validation("bad prompt")) }
            })
            .await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::Validation);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tries_floor() {
        assert_eq!(fast_policy(0).tries(), 1);
    }
}
