//! Bounded redelivery with non-decreasing backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::FailureClass;

/// Redelivery policy for transient failures.
///
/// `max_attempts` counts every delivery including the first, so a policy
/// with `max_attempts = 3` allows at most two retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of deliveries (including the initial one).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Growth factor applied per attempt. Values below 1.0 are treated as 1.0.
    pub multiplier: f64,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

/// What to do after a failed delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Redeliver as attempt `attempt` after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Stop and dead-letter the record.
    GiveUp { reason: String },
}

impl RetryPolicy {
    /// A policy with the same delay before every retry.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
        }
    }

    /// Returns the delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let secs = (self.initial_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }

    /// Decides whether a failure on attempt `attempt` should be redelivered.
    pub fn decide(&self, attempt: u32, class: FailureClass) -> RetryDecision {
        if class == FailureClass::Permanent {
            return RetryDecision::GiveUp {
                reason: "permanent failure".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp {
                reason: format!("retries exhausted after {attempt} attempts"),
            };
        }

        RetryDecision::Retry {
            attempt: attempt + 1,
            delay: self.delay_for_attempt(attempt),
        }
    }
}
