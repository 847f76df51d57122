//! Resilient chat relay library.
//!
//! Calls an unreliable language-model backend on behalf of many concurrent
//! users: a bounded worker pool, per-call wall-clock budgets, circuit
//! breaking, jittered retries, and best-effort scoring of each exchange.

pub mod backend;
pub mod config;
pub mod conversation;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod scoring;
pub mod service;
pub mod workers;

pub use config::schema::RelayConfig;
pub use error::{RelayError, RelayResult, FALLBACK_REPLY};
pub use lifecycle::Shutdown;
pub use service::{ChatService, Reply};
pub use workers::{WorkerLease, WorkerPool};
