//! A pooled Worker and its resilient call pipeline.
//!
//! # Responsibilities
//! - Own one backend client and one circuit breaker handle
//! - Compose deadline ⊇ breaker ⊇ retry ⊇ backend call in `invoke`
//! - Log and count every invocation outcome

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::backend::prompt::Prompt;
use crate::backend::ChatBackend;
use crate::config::{AgentConfig, BreakerConfig, BreakerScope};
use crate::conversation::CallRequest;
use crate::error::RelayResult;
use crate::observability::{metrics, truncate_for_log};
use crate::resilience::{with_deadline, CircuitBreaker, RetryPolicy};

/// One backend client coupled with one circuit breaker.
///
/// Held exclusively by one caller at a time through a `WorkerLease`.
pub struct Worker {
    id: usize,
    backend: Arc<dyn ChatBackend>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    prompt: Arc<Prompt>,
    preview_chars: usize,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("breaker", &self.breaker.name())
            .field("state", &self.breaker.state())
            .finish()
    }
}

impl Worker {
    /// Creation-order index in the pool.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Run one chat call with a hard wall-clock `budget`.
    ///
    /// The breaker sees a single outcome per call: the final result of the
    /// whole retry sequence. When the budget fires, the in-flight attempt or
    /// backoff sleep is dropped, the breaker counts one failure and
    /// `TimeoutExceeded` is returned.
    pub async fn invoke(&self, request: &CallRequest, budget: Duration) -> RelayResult<String> {
        let started = Instant::now();
        let completion = self.prompt.build(request);
        let message = truncate_for_log(&request.message, self.preview_chars);

        tracing::info!(
            worker_id = self.id,
            user_id = %request.requester.user_id,
            username = %request.requester.username,
            conversation_id = %request.conversation_id,
            history_len = completion.history.len(),
            %message,
            "Invoking backend"
        );

        let backend = &self.backend;
        let completion = &completion;
        let result = with_deadline(
            budget,
            self.breaker.call(move || {
                self.retry.run(move |attempt| {
                    tracing::debug!(worker_id = self.id, attempt, "Backend attempt");
                    backend.complete(completion)
                })
            }),
        )
        .await;

        let elapsed = started.elapsed();
        match &result {
            Ok(reply) => {
                tracing::info!(
                    worker_id = self.id,
                    user_id = %request.requester.user_id,
                    username = %request.requester.username,
                    conversation_id = %request.conversation_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    reply = %truncate_for_log(reply, self.preview_chars),
                    "Backend replied"
                );
                metrics::record_invocation("success", elapsed);
            }
            Err(err) => {
                tracing::error!(
                    worker_id = self.id,
                    user_id = %request.requester.user_id,
                    username = %request.requester.username,
                    conversation_id = %request.conversation_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    kind = err.label(),
                    error = %err,
                    %message,
                    "Invocation failed"
                );
                metrics::record_invocation(err.label(), elapsed);
            }
        }

        result
    }
}

/// Everything needed to turn a backend client into a Worker.
#[derive(Debug, Clone)]
pub struct WorkerBlueprint {
    prompt: Arc<Prompt>,
    retry: RetryPolicy,
    breaker: BreakerConfig,
    shared_breaker: Option<Arc<CircuitBreaker>>,
    preview_chars: usize,
}

impl WorkerBlueprint {
    pub fn new(
        prompt: Prompt,
        retry: RetryPolicy,
        breaker: BreakerConfig,
        preview_chars: usize,
    ) -> Self {
        let shared_breaker = match breaker.scope {
            BreakerScope::Shared => Some(Arc::new(CircuitBreaker::from_config("pool", &breaker))),
            BreakerScope::PerWorker => None,
        };
        Self {
            prompt: Arc::new(prompt),
            retry,
            breaker,
            shared_breaker,
            preview_chars,
        }
    }

    pub fn from_config(config: &AgentConfig, prompt: Prompt) -> Self {
        Self::new(
            prompt,
            RetryPolicy::from_config(&config.retry),
            config.breaker.clone(),
            config.log_preview_chars,
        )
    }

    pub fn scope(&self) -> BreakerScope {
        self.breaker.scope
    }

    pub fn build(&self, id: usize, backend: Arc<dyn ChatBackend>) -> Worker {
        let breaker = match &self.shared_breaker {
            Some(shared) => Arc::clone(shared),
            None => Arc::new(CircuitBreaker::from_config(format!("worker-{id}"), &self.breaker)),
        };
        Worker {
            id,
            backend,
            breaker,
            retry: self.retry.clone(),
            prompt: Arc::clone(&self.prompt),
            preview_chars: self.preview_chars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, BackendResult, CompletionRequest, ErrorKind};
    use crate::conversation::Requester;
    use crate::error::RelayError;
    use crate::resilience::Backoff;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    struct FlakyBackend {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ChatBackend for FlakyBackend {
        async fn complete(&self, request: &CompletionRequest) -> BackendResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(BackendError::connection("refused"));
            }
            Ok(format!("echo: {}", request.message))
        }
    }

    fn blueprint(scope: BreakerScope, threshold: u32) -> WorkerBlueprint {
        let retry = RetryPolicy::new(
            3,
            Backoff::new(Duration::ZERO, Duration::ZERO, 1.0, (0.0, 0.0)),
            ErrorKind::infra(),
        );
        let breaker = BreakerConfig {
            failure_threshold: threshold,
            scope,
            ..BreakerConfig::default()
        };
        WorkerBlueprint::new(Prompt::new("persona"), retry, breaker, 40)
    }

    fn request() -> CallRequest {
        CallRequest::new("hello", Requester::new("1", "ann"), Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_retries_inside_one_breaker_call() {
        let backend = Arc::new(FlakyBackend {
            failures_left: AtomicU32::new(2),
            calls: AtomicU32::new(0),
        });
        let worker = blueprint(BreakerScope::PerWorker, 1).build(0, backend.clone());

        let reply = worker.invoke(&request(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(reply, "echo: hello");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(worker.breaker().failure_count(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_count_once() {
        let backend = Arc::new(FlakyBackend {
            failures_left: AtomicU32::new(u32::MAX),
            calls: AtomicU32::new(0),
        });
        let worker = blueprint(BreakerScope::PerWorker, 5).build(3, backend.clone());

        let err = worker.invoke(&request(), Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, RelayError::Backend(ref e) if e.kind == ErrorKind::Connection));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(worker.breaker().failure_count(), 1);
        assert_eq!(worker.breaker().name(), "worker-3");
    }

    #[test]
    fn test_breaker_scope() {
        let backend: Arc<dyn ChatBackend> = Arc::new(FlakyBackend {
            failures_left: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        });

        let shared = blueprint(BreakerScope::Shared, 5);
        let (a, b) = (shared.build(0, backend.clone()), shared.build(1, backend.clone()));
        assert!(Arc::ptr_eq(a.breaker(), b.breaker()));

        let per_worker = blueprint(BreakerScope::PerWorker, 5);
        let (a, b) = (per_worker.build(0, backend.clone()), per_worker.build(1, backend));
        assert!(!Arc::ptr_eq(a.breaker(), b.breaker()));
    }
}
