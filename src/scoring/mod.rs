//! Exchange scoring subsystem.
//!
//! # Data Flow
//! ```text
//! ChatService (after a delivered reply, in a spawned task)
//!     → pipeline.rs (deadline ⊇ retry ⊇ backend, parse, clamp)
//!     → store.rs (ScoreStore::record)
//! ```

pub mod pipeline;
pub mod store;

pub use pipeline::{clamp_score, parse_score, ScoringPipeline};
pub use store::{InMemoryScoreStore, ScoreStore};
