//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Worker.invoke:
//!     → timeouts.rs (hard wall-clock budget around everything below)
//!     → circuit_breaker.rs (fail fast when open, record the final outcome)
//!     → retries.rs (repeat infra failures with backoff.rs waits)
//!     → ChatBackend::complete
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every call has a deadline
//! - The breaker sees one outcome per call, after retries
//! - Only infrastructure failures are retried or counted
//! - Each layer is a plain async function, composed in the worker

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use backoff::Backoff;
pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitState};
pub use retries::RetryPolicy;
pub use timeouts::with_deadline;
