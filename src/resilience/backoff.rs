//! Exponential backoff with additive jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Wait schedule between retry attempts.
///
/// The wait before retry `n` (1-based) is
/// `min(max_delay, delay * factor^(n-1)) + uniform(jitter.0, jitter.1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    delay: Duration,
    max_delay: Duration,
    factor: f64,
    jitter: (f64, f64),
}

impl Backoff {
    pub fn new(delay: Duration, max_delay: Duration, factor: f64, jitter: (f64, f64)) -> Self {
        Self { delay, max_delay, factor, jitter }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        let [low, high] = config.jitter;
        Self::new(
            secs(config.delay_secs),
            secs(config.max_delay_secs),
            config.backoff,
            (low, high),
        )
    }

    /// Capped exponential part of the wait before retry `retry`.
    pub fn base_delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let raw = self.delay.as_secs_f64() * self.factor.powi(exponent);
        secs(raw).min(self.max_delay)
    }

    /// One jitter sample from `[low, high)`. A degenerate range yields `low`.
    pub fn jitter(&self) -> Duration {
        let (low, high) = self.jitter;
        if high <= low {
            return secs(low);
        }
        secs(rand::thread_rng().gen_range(low..high))
    }

    /// Full wait before retry `retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        self.base_delay(retry).saturating_add(self.jitter())
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

// Negative and NaN inputs clamp to zero; overflow saturates.
fn secs(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}
