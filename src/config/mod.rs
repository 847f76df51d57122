//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, resolve prompt file)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → handed to the pool, scorer and observability at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the pool is built once per process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets (API key) come from the environment, never the file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AgentConfig, BackendConfig, BreakerConfig, BreakerScope, LogFormat, ObservabilityConfig,
    PoolConfig, RelayConfig, RetryConfig, ScoringConfig,
};
