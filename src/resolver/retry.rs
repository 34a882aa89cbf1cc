//! Retry budget and jittered backoff.

use crate::config::Settings;
use rand::Rng;
use std::time::Duration;

/// How often, and how patiently, retryable failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first.
    pub budget: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(budget: u32) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.min_backoff = min;
        self.max_backoff = max;
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.retry_budget).with_backoff(
            Duration::from_millis(settings.backoff.min_ms),
            Duration::from_millis(settings.backoff.max_ms),
        )
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.budget + 1
    }

    /// A uniformly random delay in `[min_backoff, max_backoff]`.
    ///
    /// Spreads retries from parallel checks hitting the same registry.
    pub fn backoff(&self) -> Duration {
        if self.max_backoff <= self.min_backoff {
            return self.min_backoff;
        }
        rand::rng().random_range(self.min_backoff..=self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            budget: 2,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
        }
    }
}
