//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacity > 0, tries >= 1, sane backoff)
//! - Check the backend URL parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::{RelayConfig, RetryConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = Url::parse(&config.backend.base_url) {
        errors.push(ValidationError::new("backend.base_url", e.to_string()));
    }
    if config.backend.model.trim().is_empty() {
        errors.push(ValidationError::new("backend.model", "must not be empty"));
    }
    if config.backend.request_timeout_secs == 0 {
        errors.push(ValidationError::new("backend.request_timeout_secs", "must be > 0"));
    }

    if config.pool.capacity == 0 {
        errors.push(ValidationError::new("pool.capacity", "must be > 0"));
    }

    if config.agent.call_timeout_secs == 0 {
        errors.push(ValidationError::new("agent.call_timeout_secs", "must be > 0"));
    }
    if config.agent.breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("agent.breaker.failure_threshold", "must be >= 1"));
    }

    validate_retry("agent.retry", &config.agent.retry, &mut errors);
    validate_retry("scoring.retry", &config.scoring.retry, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_retry(prefix: &str, retry: &RetryConfig, errors: &mut Vec<ValidationError>) {
    if retry.tries == 0 {
        errors.push(ValidationError::new(format!("{prefix}.tries"), "must be >= 1"));
    }
    if !retry.delay_secs.is_finite() || retry.delay_secs < 0.0 {
        errors.push(ValidationError::new(format!("{prefix}.delay_secs"), "must be >= 0"));
    }
    if !retry.max_delay_secs.is_finite() || retry.max_delay_secs < retry.delay_secs {
        errors.push(ValidationError::new(
            format!("{prefix}.max_delay_secs"),
            "must be >= delay_secs",
        ));
    }
    if !retry.backoff.is_finite() || retry.backoff < 1.0 {
        errors.push(ValidationError::new(format!("{prefix}.backoff"), "must be >= 1.0"));
    }
    let [low, high] = retry.jitter;
    if !low.is_finite() || !high.is_finite() || low < 0.0 || low > high {
        errors.push(ValidationError::new(
            format!("{prefix}.jitter"),
            "must satisfy 0 <= low <= high",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = RelayConfig::default();
        config.pool.capacity = 0;
        config.backend.base_url = "not a url".into();
        config.agent.retry.tries = 0;
        config.scoring.retry.jitter = [2.0, 1.0];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(errors.len(), 4);
        assert!(fields.contains(&"pool.capacity"));
        assert!(fields.contains(&"backend.base_url"));
        assert!(fields.contains(&"agent.retry.tries"));
        assert!(fields.contains(&"scoring.retry.jitter"));
    }

    #[test]
    fn test_backoff_below_one_rejected() {
        let mut config = RelayConfig::default();
        config.agent.retry.backoff = 0.5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].to_string(), "agent.retry.backoff: must be >= 1.0");
    }
}
