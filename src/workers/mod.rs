//! Worker pool subsystem.
//!
//! # Data Flow
//! ```text
//! ChatService.respond
//!     → pool.rs (acquire: idle Worker, new Worker, or wait)
//!     → worker.rs (invoke: deadline ⊇ breaker ⊇ retry ⊇ backend)
//!     → WorkerLease dropped → Worker back in the idle set
//! ```
//!
//! # Design Decisions
//! - A semaphore with `capacity` permits bounds concurrent holders
//! - Workers are created lazily and never destroyed
//! - Release happens in `Drop`, so timeouts and panics cannot leak Workers
//! - Breaker scope (per Worker or pool-wide) comes from the blueprint

pub mod pool;
pub mod worker;

pub use pool::{WorkerLease, WorkerPool};
pub use worker::{Worker, WorkerBlueprint};
