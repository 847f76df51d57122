//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::ErrorKind;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Remote language-model endpoint.
    pub backend: BackendConfig,

    /// Worker pool sizing.
    pub pool: PoolConfig,

    /// Primary chat pipeline (timeout, breaker, retries).
    pub agent: AgentConfig,

    /// Exchange scoring pipeline.
    pub scoring: ScoringConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Backend endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of an OpenAI-compatible API (e.g., "https://api.openai.com/v1").
    pub base_url: String,

    /// Model name sent with every request.
    pub model: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Per-HTTP-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Inline system prompt.
    pub system_prompt: String,

    /// Optional file to read the system prompt from (overrides `system_prompt`).
    pub system_prompt_path: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: 60,
            system_prompt: "You are a warm, curious conversational companion. \
                            Answer briefly and stay in character."
                .to_string(),
            system_prompt_path: None,
        }
    }
}

impl BackendConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|key| !key.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of workers (and backend clients) ever created.
    pub capacity: usize,

    /// How long `acquire` waits for a free worker. 0 waits forever.
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            acquire_timeout_secs: 30,
        }
    }
}

impl PoolConfig {
    pub fn acquire_timeout(&self) -> Option<Duration> {
        match self.acquire_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Primary chat pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Hard wall-clock budget per call, retries included.
    pub call_timeout_secs: u64,

    /// Number of prior turns sent with each request.
    pub history_limit: usize,

    /// Characters of message content included in log lines.
    pub log_preview_chars: usize,

    /// Circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Retry settings.
    pub retry: RetryConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: 300,
            history_limit: 15,
            log_preview_chars: 120,
            breaker: BreakerConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Which workers share a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BreakerScope {
    /// Each worker owns its breaker; health is tracked per pool slot.
    #[default]
    PerWorker,
    /// One breaker guards every worker in the pool.
    Shared,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive counted failures before the breaker opens.
    pub failure_threshold: u32,

    /// Seconds the breaker stays open before admitting a trial call.
    pub recovery_timeout_secs: u64,

    /// Error kinds that never count as failures.
    pub excluded: Vec<ErrorKind>,

    /// Breaker scope.
    pub scope: BreakerScope,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
            excluded: vec![ErrorKind::Validation, ErrorKind::TypeMismatch],
            scope: BreakerScope::PerWorker,
        }
    }
}

impl BreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts, the first one included.
    pub tries: u32,

    /// Wait before the first retry, in seconds.
    pub delay_secs: f64,

    /// Upper bound on the exponential part of the wait, in seconds.
    pub max_delay_secs: f64,

    /// Multiplicative backoff factor.
    pub backoff: f64,

    /// Additive jitter range `[low, high)` in seconds.
    pub jitter: [f64; 2],

    /// Error kinds worth retrying.
    pub retry_on: Vec<ErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            tries: 3,
            delay_secs: 1.0,
            max_delay_secs: 10.0,
            backoff: 2.0,
            jitter: [0.0, 1.0],
            retry_on: vec![ErrorKind::Connection, ErrorKind::Timeout, ErrorKind::Io],
        }
    }
}

/// Scoring pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Score completed exchanges.
    pub enabled: bool,

    /// Wall-clock budget per scoring call. 0 disables the budget.
    pub timeout_secs: u64,

    /// Prompt instructing the backend how to rate an exchange.
    pub system_prompt: String,

    /// Retry settings, independent from the agent's.
    pub retry: RetryConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 120,
            system_prompt: "You review a single exchange between a user and an agent. \
                            Rate how sincere and meaningful the user's message is on a \
                            scale from 0 to 100. Reply only with JSON: {\"score\": <integer>}."
                .to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl ScoringConfig {
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: RelayConfig = toml::from_str("[pool]\ncapacity = 2\n").unwrap();
        assert_eq!(config.pool.capacity, 2);
        assert_eq!(config.pool.acquire_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.agent.call_timeout(), Duration::from_secs(300));
        assert_eq!(config.agent.breaker.failure_threshold, 5);
        assert_eq!(config.agent.breaker.scope, BreakerScope::PerWorker);
        assert_eq!(config.agent.retry.tries, 3);
        assert!(config.scoring.enabled);
    }

    #[test]
    fn test_full_toml() {
        let raw = r#"
            [pool]
            acquire_timeout_secs = 0

            [agent.breaker]
            failure_threshold = 2
            excluded = ["validation"]
            scope = "shared"

            [agent.retry]
            tries = 5
            jitter = [0.5, 0.75]
            retry_on = ["connection"]

            [scoring]
            timeout_secs = 0

            [observability]
            log_format = "json"
        "#;
        let config: RelayConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.pool.acquire_timeout(), None);
        assert_eq!(config.agent.breaker.scope, BreakerScope::Shared);
        assert_eq!(config.agent.breaker.excluded, vec![ErrorKind::Validation]);
        assert_eq!(config.agent.retry.jitter, [0.5, 0.75]);
        assert_eq!(config.agent.retry.retry_on, vec![ErrorKind::Connection]);
        assert_eq!(config.scoring.timeout(), None);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
