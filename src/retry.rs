//! Retry policy for vision-model calls.
//!
//! The conversion is a human-supervised batch job, so the default policy
//! never gives up: every failure waits a fixed 15 seconds and resends the
//! identical request. Library callers and tests inject a bounded policy
//! (and usually a zero delay) through
//! [`crate::config::ConversionConfigBuilder::retry_policy`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wait after a failed call.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(15);

/// How long to wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryDelay {
    /// Same delay after every failure.
    Fixed(Duration),
    /// `base * 2^(failures - 1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

/// Attempt budget plus delay strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `None` retries forever.
    pub max_attempts: Option<u32>,
    pub delay: RetryDelay,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::forever(DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Retry indefinitely with a fixed delay.
    pub fn forever(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay: RetryDelay::Fixed(delay),
        }
    }

    /// At most `max_attempts` calls in total, fixed delay between them.
    pub fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            delay: RetryDelay::Fixed(delay),
        }
    }

    /// Replace the delay strategy.
    pub fn with_delay(mut self, delay: RetryDelay) -> Self {
        self.delay = delay;
        self
    }

    /// Whether another attempt is allowed after `failures` failed calls.
    pub fn should_retry(&self, failures: u32) -> bool {
        match self.max_attempts {
            None => true,
            Some(max) => failures < max,
        }
    }

    /// Delay before the attempt following the `failures`-th failure (1-based).
    pub fn delay_after(&self, failures: u32) -> Duration {
        match self.delay {
            RetryDelay::Fixed(d) => d,
            RetryDelay::Exponential { base, max } => {
                let exp = failures.saturating_sub(1).min(31);
                base.saturating_mul(1u32 << exp).min(max)
            }
        }
    }
}
