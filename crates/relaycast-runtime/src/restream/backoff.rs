//! Retry backoff policy.
//!
//! The delay for attempt `n` (0-indexed) is `first × factor^n`, clamped to
//! `max`. The base is derived purely from the attempt number, so delays
//! grow strictly until the cap regardless of when previous attempts ran.

use std::time::Duration;

use crate::config::RetryConfig;

/// Exponential retry backoff.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Multiplicative growth factor (`>= 1.0`).
    pub factor: f64,
    /// Maximum delay cap.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    /// Defaults matching the destination retry policy: 5s doubling,
    /// capped at 60s.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(5),
            factor: 2.0,
            max: Duration::from_secs(60),
        }
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            first: config.base_delay(),
            factor: 2.0,
            max: config.max_delay(),
        }
    }
}

impl BackoffPolicy {
    /// Delay for the given attempt number (0-indexed).
    #[must_use]
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped_secs)
        }
    }
}
