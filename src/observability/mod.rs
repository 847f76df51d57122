//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pool, breaker, retry, worker and scorer produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Every invocation log line carries user ID, username and conversation ID
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, truncate_for_log};
pub use metrics::init_metrics;
