//! Crate-level error taxonomy.
//!
//! # Design Decisions
//! - Backend failures keep their `ErrorKind` so retry and breaker logic can classify them
//! - Pool, breaker and deadline failures are distinct variants for logs and metrics
//! - Every variant collapses to the same user-facing text at the service boundary

use std::time::Duration;

use thiserror::Error;

use crate::backend::BackendError;

/// The single reply shown to a user when anything in the call pipeline fails.
pub const FALLBACK_REPLY: &str =
    "I ran into a problem while answering. Please call me again in a few minutes...";

/// Errors surfaced by the pool and the resilient call pipeline.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    /// The backend call failed (after any retries).
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The breaker rejected the call without invoking the backend.
    #[error("circuit breaker '{breaker}' is open")]
    CircuitOpen { breaker: String },

    /// The wall-clock budget for the whole call elapsed.
    #[error("call exceeded its wall-clock budget of {budget:?}")]
    TimeoutExceeded { budget: Duration },

    /// No worker became available within the acquire timeout.
    #[error("no worker available after waiting {waited:?}")]
    PoolExhausted { waited: Duration },
}

impl RelayError {
    /// Stable snake_case tag for logs and metric labels.
    pub fn label(&self) -> &'static str {
        match self {
            RelayError::Backend(err) => err.kind.as_str(),
            RelayError::CircuitOpen { .. } => "circuit_open",
            RelayError::TimeoutExceeded { .. } => "timeout_exceeded",
            RelayError::PoolExhausted { .. } => "pool_exhausted",
        }
    }

    /// The text a user sees for this failure. Always the generic fallback.
    pub fn user_message(&self) -> &'static str {
        FALLBACK_REPLY
    }
}

/// Result type for pipeline operations.
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ErrorKind;

    #[test]
    fn test_labels_distinguish_failures() {
        let err = RelayError::from(BackendError::new(ErrorKind::Connection, "refused"));
        assert_eq!(err.label(), "connection");

        let err = RelayError::CircuitOpen { breaker: "worker-0".into() };
        assert_eq!(err.label(), "circuit_open");
        assert!(err.to_string().contains("worker-0"));

        let err = RelayError::PoolExhausted { waited: Duration::from_secs(3) };
        assert_eq!(err.label(), "pool_exhausted");
    }

    #[test]
    fn test_user_message_is_generic() {
        let errors = [
            RelayError::TimeoutExceeded { budget: Duration::from_secs(300) },
            RelayError::CircuitOpen { breaker: "pool".into() },
            RelayError::from(BackendError::new(ErrorKind::Validation, "bad input")),
        ];
        for err in errors {
            assert_eq!(err.user_message(), FALLBACK_REPLY);
        }
    }
}
