//! Language-model backend subsystem.
//!
//! # Data Flow
//! ```text
//! Worker.invoke / ScoringPipeline.score
//!     → prompt.rs (system prompt + per-request instructions)
//!     → ChatBackend::complete (openai.rs over HTTP)
//!     → reply text, or BackendError tagged with an ErrorKind
//! ```
//!
//! # Design Decisions
//! - Failures are classified where they happen; resilience layers only read `ErrorKind`
//! - Infra kinds (connection, timeout, I/O) are retryable and trip breakers
//! - Business kinds (validation, type mismatch) are neither
//! - The pool only knows `BackendFactory`; one client per Worker

pub mod openai;
pub mod prompt;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::HistoryEntry;

/// Classification of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Could not establish a connection.
    Connection,
    /// The backend did not answer within its own request timeout.
    Timeout,
    /// Generic transport fault, throttling or server-side error.
    Io,
    /// The request was rejected as malformed.
    Validation,
    /// The backend answered with something we could not interpret.
    TypeMismatch,
}

impl ErrorKind {
    /// Infrastructure failures: worth retrying, counted by breakers.
    pub fn is_infra(self) -> bool {
        matches!(self, ErrorKind::Connection | ErrorKind::Timeout | ErrorKind::Io)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Io => "io",
            ErrorKind::Validation => "validation",
            ErrorKind::TypeMismatch => "type_mismatch",
        }
    }

    /// Default retryable set.
    pub fn infra() -> HashSet<ErrorKind> {
        [ErrorKind::Connection, ErrorKind::Timeout, ErrorKind::Io].into_iter().collect()
    }

    /// Default breaker exclusion set.
    pub fn business() -> HashSet<ErrorKind> {
        [ErrorKind::Validation, ErrorKind::TypeMismatch].into_iter().collect()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified backend failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct BackendError {
    pub kind: ErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }
}

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Everything the backend needs to produce one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Persona / task prompt, shared by every request of a pipeline.
    pub system_prompt: Arc<str>,
    /// Per-request instructions (requester name, current time).
    pub instructions: Option<String>,
    /// Prior turns, oldest first.
    pub history: Vec<HistoryEntry>,
    /// The new user message.
    pub message: String,
}

/// A client for the remote language model.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one completion request and return the reply text.
    async fn complete(&self, request: &CompletionRequest) -> BackendResult<String>;
}

/// Builds backend clients for new Workers.
///
/// Called at most `capacity` times over the life of a pool.
pub trait BackendFactory: Send + Sync {
    fn build(&self, worker_id: usize) -> BackendResult<Arc<dyn ChatBackend>>;
}

impl<F> BackendFactory for F
where
    F: Fn(usize) -> BackendResult<Arc<dyn ChatBackend>> + Send + Sync,
{
    fn build(&self, worker_id: usize) -> BackendResult<Arc<dyn ChatBackend>> {
        self(worker_id)
    }
}
