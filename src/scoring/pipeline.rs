//! Best-effort exchange scoring.
//!
//! # Responsibilities
//! - Ask the backend to rate one user/agent exchange
//! - Retry infra failures with its own policy
//! - Absorb every failure into a score of 0
//!
//! # Design Decisions
//! - No breaker: scoring never blocks the chat path, so fast-fail buys nothing
//! - Out-of-range scores are clamped, never rejected
//! - Accepts `{"score": n}` or a bare number from the backend

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::backend::prompt::Prompt;
use crate::backend::{BackendError, BackendResult, ChatBackend, CompletionRequest};
use crate::config::ScoringConfig;
use crate::error::RelayError;
use crate::observability::metrics;
use crate::resilience::{with_deadline, RetryPolicy};

pub struct ScoringPipeline {
    backend: Arc<dyn ChatBackend>,
    retry: RetryPolicy,
    prompt: Prompt,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for ScoringPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringPipeline")
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ScoringPipeline {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        retry: RetryPolicy,
        prompt: Prompt,
        timeout: Option<Duration>,
    ) -> Self {
        Self { backend, retry, prompt, timeout }
    }

    pub fn from_config(config: &ScoringConfig, backend: Arc<dyn ChatBackend>) -> Self {
        Self::new(
            backend,
            RetryPolicy::from_config(&config.retry),
            Prompt::new(config.system_prompt.as_str()),
            config.timeout(),
        )
    }

    /// Rate an exchange. Always returns a value in `0..=100`.
    pub async fn score(&self, user_message: &str, agent_reply: &str) -> u8 {
        let request = CompletionRequest {
            system_prompt: self.prompt.system_prompt().into(),
            instructions: None,
            history: Vec::new(),
            message: format!("User: {user_message}\nAgent: {agent_reply}"),
        };

        let backend = &self.backend;
        let request = &request;
        let attempt = async {
            let raw = self.retry.run(move |_| backend.complete(request)).await?;
            Ok::<_, RelayError>(parse_score(&raw)?)
        };
        let result = match self.timeout {
            Some(budget) => with_deadline(budget, attempt).await,
            None => attempt.await,
        };

        match result {
            Ok(raw) => {
                let score = clamp_score(raw);
                if f64::from(score) != raw {
                    tracing::debug!(raw, score, "Clamped out-of-range score");
                }
                metrics::record_score(score);
                score
            }
            Err(err) => {
                tracing::warn!(kind = err.label(), error = %err, "Scoring failed, defaulting to 0");
                metrics::record_scoring_failure(err.label());
                0
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScoreReply {
    score: f64,
}

/// Extract a numeric score from backend output.
pub fn parse_score(raw: &str) -> BackendResult<f64> {
    let text = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if let Ok(reply) = serde_json::from_str::<ScoreReply>(text) {
        return Ok(reply.score);
    }
    text.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| BackendError::type_mismatch(format!("unparseable score: {text:?}")))
}

/// Round and clamp into `0..=100`.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score_formats() {
        assert_eq!(parse_score(r#"{"score": 87}"#).unwrap(), 87.0);
        assert_eq!(parse_score("```json\n{\"score\": 12.6}\n```").unwrap(), 12.6);
        assert_eq!(parse_score(" 42 ").unwrap(), 42.0);
        assert!(parse_score("very sincere").is_err());
        assert!(parse_score("NaN").is_err());
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(150.0), 100);
        assert_eq!(clamp_score(-5.0), 0);
        assert_eq!(clamp_score(12.6), 13);
        assert_eq!(clamp_score(f64::NAN), 0);
    }
}
