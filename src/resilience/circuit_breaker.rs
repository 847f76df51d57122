//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: backend assumed down, calls fail fast
//! - Half-Open: one trial call decides whether the backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive counted failures >= threshold
//! Open → Half-Open: first admission after the recovery timeout has elapsed
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails with a counted error
//! ```
//!
//! # Design Decisions
//! - Excluded error kinds never change the failure count or the state
//! - A single trial in Half-Open; concurrent callers fail fast
//! - Outcomes are reported through a `CallPermit`; dropping it unsettled
//!   (deadline or cancellation) counts as one failure, so a hanging backend
//!   trips the breaker and a hanging trial reopens it
//! - Outcomes reported against a stale state are ignored

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::backend::{BackendError, BackendResult, ErrorKind};
use crate::config::BreakerConfig;
use crate::error::{RelayError, RelayResult};
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    excluded: HashSet<ErrorKind>,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        failure_threshold: u32,
        recovery_timeout: Duration,
        excluded: HashSet<ErrorKind>,
    ) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            excluded,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &BreakerConfig) -> Self {
        Self::new(
            name,
            config.failure_threshold,
            config.recovery_timeout(),
            config.excluded.iter().copied().collect(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }

    /// Ask to place a call.
    pub fn admit(&self) -> RelayResult<CallPermit<'_>> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(CallPermit::new(self, false)),
            CircuitState::Open => {
                let recovered = inner
                    .opened_at
                    .map_or(true, |opened| opened.elapsed() > self.recovery_timeout);
                if !recovered {
                    return Err(self.rejected());
                }
                self.transition(&mut inner, CircuitState::HalfOpen);
                inner.trial_in_flight = true;
                tracing::info!(breaker = %self.name, "Admitting trial call");
                Ok(CallPermit::new(self, true))
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(self.rejected());
                }
                inner.trial_in_flight = true;
                Ok(CallPermit::new(self, true))
            }
        }
    }

    /// Run `f` under the breaker: reject fast when open, record the outcome otherwise.
    pub async fn call<T, F, Fut>(&self, f: F) -> RelayResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        let permit = self.admit()?;
        match f().await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(err) => {
                permit.fail(&err);
                Err(RelayError::Backend(err))
            }
        }
    }

    fn rejected(&self) -> RelayError {
        tracing::debug!(breaker = %self.name, "Call rejected, circuit open");
        RelayError::CircuitOpen { breaker: self.name.clone() }
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen if trial => {
                inner.trial_in_flight = false;
                inner.failure_count = 0;
                inner.opened_at = None;
                self.transition(&mut inner, CircuitState::Closed);
            }
            state => {
                tracing::debug!(breaker = %self.name, %state, "Ignoring late success");
            }
        }
    }

    fn on_failure(&self, trial: bool, err: &BackendError) {
        if self.excluded.contains(&err.kind) {
            let mut inner = self.lock();
            if trial && inner.state == CircuitState::HalfOpen {
                inner.trial_in_flight = false;
            }
            tracing::debug!(breaker = %self.name, kind = %err.kind, "Excluded error, not counted");
            return;
        }
        self.count_failure(trial, err.kind.as_str());
    }

    fn on_abandoned(&self, trial: bool) {
        tracing::debug!(breaker = %self.name, trial, "Call abandoned before settling");
        self.count_failure(trial, "abandoned");
    }

    fn count_failure(&self, trial: bool, reason: &str) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                tracing::debug!(
                    breaker = %self.name,
                    reason,
                    failures = inner.failure_count,
                    threshold = self.failure_threshold,
                    "Counted failure"
                );
                if inner.failure_count >= self.failure_threshold {
                    inner.opened_at = Some(Instant::now());
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen if trial => {
                inner.trial_in_flight = false;
                inner.opened_at = Some(Instant::now());
                self.transition(&mut inner, CircuitState::Open);
            }
            state => {
                tracing::debug!(breaker = %self.name, %state, reason, "Ignoring late failure");
            }
        }
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        match to {
            CircuitState::Open => tracing::warn!(
                breaker = %self.name,
                %from,
                failures = inner.failure_count,
                recovery_secs = self.recovery_timeout.as_secs(),
                "Circuit opened"
            ),
            _ => tracing::info!(breaker = %self.name, %from, %to, "Circuit state changed"),
        }
        metrics::record_breaker_transition(to.as_str());
    }
}

/// Admission ticket for one call through a `CircuitBreaker`.
#[must_use = "report the outcome with succeed() or fail()"]
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self { breaker, trial, settled: false }
    }

    /// Whether this permit is the half-open trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    pub fn fail(mut self, err: &BackendError) {
        self.settled = true;
        self.breaker.on_failure(self.trial, err);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_abandoned(self.trial);
        }
    }
}
