//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define relay metrics (invocations, latency, retries, breaker, pool, scores)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `relay_invocations_total` (counter): worker invocations by outcome
//! - `relay_invocation_duration_seconds` (histogram): end-to-end invoke latency
//! - `relay_retries_total` (counter): retry attempts by error kind
//! - `relay_breaker_transitions_total` (counter): breaker transitions by target state
//! - `relay_pool_workers_created` (gauge): workers created so far
//! - `relay_pool_exhausted_total` (counter): acquire calls that timed out
//! - `relay_scores` (histogram): score distribution
//! - `relay_scoring_failures_total` (counter): scoring calls that fell back to 0
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op, so tests need no setup
//! - Label values are static strings only

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    ::metrics::describe_counter!("relay_invocations_total", "Worker invocations by outcome");
    ::metrics::describe_histogram!(
        "relay_invocation_duration_seconds",
        "End-to-end worker invocation latency"
    );
    ::metrics::describe_counter!("relay_retries_total", "Retry attempts by error kind");
    ::metrics::describe_counter!(
        "relay_breaker_transitions_total",
        "Circuit breaker transitions by target state"
    );
    ::metrics::describe_gauge!("relay_pool_workers_created", "Workers created by the pool");
    ::metrics::describe_counter!("relay_pool_exhausted_total", "Acquire calls that timed out");
    ::metrics::describe_histogram!("relay_scores", "Exchange scores");
    ::metrics::describe_counter!("relay_scoring_failures_total", "Scoring calls that fell back to 0");

    tracing::info!(%addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_invocation(outcome: &'static str, elapsed: Duration) {
    ::metrics::counter!("relay_invocations_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("relay_invocation_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_retry(kind: &'static str) {
    ::metrics::counter!("relay_retries_total", "kind" => kind).increment(1);
}

pub fn record_breaker_transition(to: &'static str) {
    ::metrics::counter!("relay_breaker_transitions_total", "to" => to).increment(1);
}

pub fn record_pool_created(created: usize) {
    ::metrics::gauge!("relay_pool_workers_created").set(created as f64);
}

pub fn record_pool_exhausted() {
    ::metrics::counter!("relay_pool_exhausted_total").increment(1);
}

pub fn record_score(score: u8) {
    ::metrics::histogram!("relay_scores").record(f64::from(score));
}

pub fn record_scoring_failure(reason: &'static str) {
    ::metrics::counter!("relay_scoring_failures_total", "reason" => reason).increment(1);
}
