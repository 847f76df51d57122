//! Bounded, lazily populated worker pool.
//!
//! # Responsibilities
//! - Hand out Workers exclusively, at most `capacity` at a time
//! - Create Workers on demand, never more than `capacity` over the pool's life
//! - Block callers when every Worker is busy, up to the acquire timeout
//! - Take Workers back on every exit path through `WorkerLease`

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::Instant;

use crate::backend::BackendFactory;
use crate::config::PoolConfig;
use crate::error::{RelayError, RelayResult};
use crate::observability::metrics;
use crate::workers::worker::{Worker, WorkerBlueprint};

/// Pool of Workers sharing one blueprint and one backend factory.
pub struct WorkerPool {
    capacity: usize,
    acquire_timeout: Option<Duration>,
    factory: Arc<dyn BackendFactory>,
    blueprint: WorkerBlueprint,
    /// One permit per Worker that may be held at once.
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<Worker>>,
    /// Serializes Worker construction.
    creation: tokio::sync::Mutex<()>,
    created: AtomicUsize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("capacity", &self.capacity)
            .field("created", &self.created())
            .field("idle", &self.idle_count())
            .field("available", &self.available())
            .finish()
    }
}

impl WorkerPool {
    pub fn new(
        config: &PoolConfig,
        blueprint: WorkerBlueprint,
        factory: Arc<dyn BackendFactory>,
    ) -> Self {
        let capacity = config.capacity.max(1);
        tracing::info!(
            capacity,
            acquire_timeout_secs = config.acquire_timeout_secs,
            breaker_scope = ?blueprint.scope(),
            "Worker pool ready"
        );
        Self {
            capacity,
            acquire_timeout: config.acquire_timeout(),
            factory,
            blueprint,
            permits: Arc::new(Semaphore::new(capacity)),
            idle: Mutex::new(VecDeque::with_capacity(capacity)),
            creation: tokio::sync::Mutex::new(()),
            created: AtomicUsize::new(0),
        }
    }

    /// Take a Worker for exclusive use.
    ///
    /// Returns an idle Worker if one exists, otherwise creates one while
    /// `created < capacity`, otherwise waits for a release. Fails with
    /// `PoolExhausted` when the acquire timeout elapses first.
    pub async fn acquire(self: &Arc<Self>) -> RelayResult<WorkerLease> {
        let permit = self.wait_for_permit().await?;

        let worker = match self.pop_idle() {
            Some(worker) => worker,
            None => self.create_worker().await?,
        };
        tracing::debug!(worker_id = worker.id(), "Worker acquired");

        Ok(WorkerLease {
            worker: Some(worker),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    async fn wait_for_permit(&self) -> RelayResult<OwnedSemaphorePermit> {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => return Ok(permit),
            Err(TryAcquireError::Closed) => {
                return Err(RelayError::PoolExhausted { waited: Duration::ZERO })
            }
            Err(TryAcquireError::NoPermits) => {}
        }

        tracing::debug!(capacity = self.capacity, "All workers busy, waiting");
        let started = Instant::now();
        let acquire = Arc::clone(&self.permits).acquire_owned();
        let acquired = match self.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, acquire).await.ok(),
            None => Some(acquire.await),
        };

        match acquired {
            Some(Ok(permit)) => Ok(permit),
            _ => {
                let waited = started.elapsed();
                tracing::warn!(
                    capacity = self.capacity,
                    waited_ms = waited.as_millis() as u64,
                    "Worker pool exhausted"
                );
                metrics::record_pool_exhausted();
                Err(RelayError::PoolExhausted { waited })
            }
        }
    }

    fn pop_idle(&self) -> Option<Worker> {
        self.idle.lock().expect("worker pool mutex poisoned").pop_front()
    }

    async fn create_worker(&self) -> RelayResult<Worker> {
        let _creating = self.creation.lock().await;

        // Someone may have released while we waited for the lock.
        if let Some(worker) = self.pop_idle() {
            return Ok(worker);
        }

        let id = self.created.load(Ordering::Acquire);
        if id >= self.capacity {
            // Unreachable while every holder owns a permit.
            return Err(RelayError::PoolExhausted { waited: Duration::ZERO });
        }

        let backend = self.factory.build(id).map_err(|err| {
            tracing::error!(worker_id = id, error = %err, "Failed to build backend client");
            RelayError::Backend(err)
        })?;
        let created = self.created.fetch_add(1, Ordering::AcqRel) + 1;

        tracing::info!(worker_id = id, created, capacity = self.capacity, "Created worker");
        metrics::record_pool_created(created);
        Ok(self.blueprint.build(id, backend))
    }

    /// Return a Worker to the idle set. A full idle set drops the call.
    pub(crate) fn release(&self, worker: Worker) {
        let mut idle = self.idle.lock().expect("worker pool mutex poisoned");
        if idle.len() >= self.capacity {
            tracing::warn!(worker_id = worker.id(), "Idle set full, ignoring release");
            return;
        }
        tracing::debug!(worker_id = worker.id(), "Worker released");
        idle.push_back(worker);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Workers constructed so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().expect("worker pool mutex poisoned").len()
    }

    /// Workers that can be acquired right now without waiting.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Exclusive hold on a Worker. Dropping it returns the Worker to the pool.
pub struct WorkerLease {
    worker: Option<Worker>,
    pool: Arc<WorkerPool>,
    // Dropped after `Drop::drop` has put the Worker back.
    _permit: OwnedSemaphorePermit,
}

impl WorkerLease {
    /// Return the Worker now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for WorkerLease {
    type Target = Worker;

    fn deref(&self) -> &Worker {
        self.worker
            .as_ref()
            .expect("worker lease accessed after release")
    }
}

impl std::fmt::Debug for WorkerLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLease").field("worker", &self.worker).finish()
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.pool.release(worker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::prompt::Prompt;
    use crate::backend::{BackendError, BackendResult, ChatBackend, CompletionRequest};
    use crate::config::AgentConfig;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl ChatBackend for Echo {
        async fn complete(&self, request: &CompletionRequest) -> BackendResult<String> {
            Ok(request.message.clone())
        }
    }

    fn pool(capacity: usize, acquire_timeout_secs: u64) -> Arc<WorkerPool> {
        let config = PoolConfig { capacity, acquire_timeout_secs };
        let blueprint = WorkerBlueprint::from_config(&AgentConfig::default(), Prompt::new("p"));
        let factory = |_id: usize| -> BackendResult<Arc<dyn ChatBackend>> { Ok(Arc::new(Echo)) };
        Arc::new(WorkerPool::new(&config, blueprint, Arc::new(factory)))
    }

    #[tokio::test]
    async fn test_lazy_creation_and_reuse() {
        let pool = pool(3, 1);
        assert_eq!(pool.created(), 0);

        let lease = pool.acquire().await.unwrap();
        assert_eq!(lease.id(), 0);
        assert_eq!(pool.created(), 1);
        lease.release();
        assert_eq!(pool.idle_count(), 1);

        let lease = pool.acquire().await.unwrap();
        assert_eq!(lease.id(), 0);
        assert_eq!(pool.created(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_timeout() {
        let pool = pool(1, 2);
        let _held = pool.acquire().await.unwrap();

        let err = pool.acquire().await.unwrap_err();
        match err {
            RelayError::PoolExhausted { waited } => assert_eq!(waited, Duration::from_secs(2)),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(pool.created(), 1);
    }

    #[tokio::test]
    async fn test_factory_failure_does_not_consume_capacity() {
        let config = PoolConfig { capacity: 1, acquire_timeout_secs: 1 };
        let blueprint = WorkerBlueprint::from_config(&AgentConfig::default(), Prompt::new("p"));
        let factory = |_id: usize| -> BackendResult<Arc<dyn ChatBackend>> {
            Err(BackendError::validation("missing model"))
        };
        let pool = Arc::new(WorkerPool::new(&config, blueprint, Arc::new(factory)));

        assert!(matches!(pool.acquire().await, Err(RelayError::Backend(_))));
        assert_eq!(pool.created(), 0);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_release_into_full_idle_set_is_noop() {
        let pool = pool(1, 1);
        let blueprint = WorkerBlueprint::from_config(&AgentConfig::default(), Prompt::new("p"));
        pool.release(blueprint.build(7, Arc::new(Echo)));
        pool.release(blueprint.build(8, Arc::new(Echo)));
        assert_eq!(pool.idle_count(), 1);
    }
}
