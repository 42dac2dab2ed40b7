// Bounded retry with exponential backoff

use crate::core::config::millis;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Try again after the given delay
    Retry(Duration),
    /// Budget exhausted; the failure is permanent
    GiveUp,
}

/// Retry budget and backoff curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(rename = "baseBackoffMs", with = "millis")]
    pub base_backoff: Duration,

    /// Upper bound for any single delay
    #[serde(rename = "maxBackoffMs", with = "millis")]
    pub max_backoff: Duration,

    /// Growth factor between consecutive retries
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Default budget for the critical resource
    pub fn critical() -> Self {
        Self {
            max_attempts: 3,
            ..Self::background()
        }
    }

    /// Default budget for background resources
    pub fn background() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::background()
        }
    }

    /// Set the attempt budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the first retry delay
    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    /// Delay before the retry that follows attempt number `attempt` (1-based)
    ///
    /// `scale` comes from the current quality tier.
    pub fn backoff(&self, attempt: u32, scale: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent) * scale.max(0.0);
        let secs = self.base_backoff.as_secs_f64() * factor;
        let capped = secs.min(self.max_backoff.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    /// Decide what follows a failure of attempt number `attempt`
    pub fn on_failure(&self, attempt: u32, retryable: bool, scale: f64) -> FailureAction {
        if retryable && attempt < self.max_attempts.max(1) {
            FailureAction::Retry(self.backoff(attempt, scale))
        } else {
            FailureAction::GiveUp
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::background();
        assert_eq!(policy.backoff(1, 1.0), Duration::from_millis(250));
        assert_eq!(policy.backoff(2, 1.0), Duration::from_millis(500));
        assert_eq!(policy.backoff(3, 1.0), Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_capped() {
        let policy = RetryPolicy::background();
        assert_eq!(policy.backoff(30, 1.0), policy.max_backoff);
    }

    #[test]
    fn test_backoff_scaled_by_tier() {
        let policy = RetryPolicy::background();
        assert_eq!(policy.backoff(1, 4.0), Duration::from_millis(1000));
    }

    #[test]
    fn test_budget() {
        let policy = RetryPolicy::critical();
        assert!(matches!(policy.on_failure(1, true, 1.0), FailureAction::Retry(_)));
        assert!(matches!(policy.on_failure(2, true, 1.0), FailureAction::Retry(_)));
        assert_eq!(policy.on_failure(3, true, 1.0), FailureAction::GiveUp);
    }

    #[test]
    fn test_non_retryable_gives_up() {
        let policy = RetryPolicy::background();
        assert_eq!(policy.on_failure(1, false, 1.0), FailureAction::GiveUp);
    }

    #[test]
    fn test_none_never_retries() {
        assert_eq!(RetryPolicy::none().on_failure(1, true, 1.0), FailureAction::GiveUp);
    }
}
