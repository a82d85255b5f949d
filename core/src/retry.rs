//! Retry policy for transport-level failures.
//!
//! Delay before retry `n` (1-based) is `backoff_factor * 2^(n-1)`, capped at
//! `max_backoff`, then jittered by `jitter_factor` in both directions.
//! HTTP rejections are never retried; this policy is consulted only when no
//! response arrived.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_FACTOR: Duration = Duration::from_millis(20);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(120);
pub const DEFAULT_JITTER_FACTOR: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub retries: u32,
    pub backoff_factor: Duration,
    pub max_backoff: Duration,
    /// Fraction (0.0 to 1.0) of each delay to randomize by.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_backoff: DEFAULT_MAX_BACKOFF,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Policy that gives up after the first failure.
    pub fn none() -> Self {
        Self {
            retries: 0,
            ..Self::default()
        }
    }

    /// Whether another attempt is allowed after `retries_done` retries.
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.retries
    }

    /// Un-jittered delay before retry `retry` (1-based).
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(30);
        let delay = self.backoff_factor.saturating_mul(2_u32.saturating_pow(exponent));
        delay.min(self.max_backoff)
    }

    /// Delay to sleep before retry `retry` (1-based), jitter included.
    pub fn delay(&self, retry: u32) -> Duration {
        apply_jitter(self.base_delay(retry), self.jitter_factor, self.max_backoff).min(self.max_backoff)
    }
}

/// Non-finite or non-positive factors mean no jitter; a jittered value that
/// does not fit in a `Duration` becomes `ceiling`.
fn apply_jitter(duration: Duration, jitter_factor: f64, ceiling: Duration) -> Duration {
    if !jitter_factor.is_finite() || jitter_factor <= 0.0 || duration.is_zero() {
        return duration;
    }

    let range = duration.as_secs_f64() * jitter_factor.min(1.0);
    let offset = rand::rng().random_range(-range..=range);

    Duration::try_from_secs_f64((duration.as_secs_f64() + offset).max(0.0)).unwrap_or(ceiling)
}
