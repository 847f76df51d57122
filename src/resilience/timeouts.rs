//! Wall-clock budgets.
//!
//! The budget wraps everything beneath it (breaker admission, every retry
//! attempt, every backoff sleep). When it fires the inner future is dropped,
//! which cancels in-flight I/O and any pending sleep.

use std::future::Future;
use std::time::Duration;

use crate::error::{RelayError, RelayResult};

/// Run `fut` with a hard deadline of `budget`.
pub async fn with_deadline<T, Fut>(budget: Duration, fut: Fut) -> RelayResult<T>
where
    Fut: Future<Output = RelayResult<T>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::TimeoutExceeded { budget }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires() {
        let start = tokio::time::Instant::now();
        let result: RelayResult<()> = with_deadline(Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(RelayError::TimeoutExceeded { .. })));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        let result = with_deadline(Duration::from_secs(5), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
