//! Retry policies with fixed, linear or exponential backoff and an upper cap.
//!
//! Used by the readiness prober: attempt `k` (1-indexed) is followed by a
//! wait of `delay_ms(k - 1)` before attempt `k + 1`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::config::BackoffStrategy;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// How many attempts are allowed and how long to wait between them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub strategy: BackoffStrategy,
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        strategy: BackoffStrategy,
        base_delay_ms: u64,
        max_delay_ms: u64,
    ) -> Self {
        RetryPolicy {
            max_attempts,
            strategy,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Whether another attempt may follow the given number of completed ones.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Delay in milliseconds after the attempt with 0-based index `attempt`.
    ///
    /// Exponential: `min(base * 2^attempt, cap)`.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let raw = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay_ms,
            BackoffStrategy::Linear => self.base_delay_ms.saturating_mul(attempt as u64 + 1),
            BackoffStrategy::Exponential => self
                .base_delay_ms
                .saturating_mul(2u64.saturating_pow(attempt)),
        };
        raw.min(self.max_delay_ms)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.delay_ms(attempt))
    }
}

impl Default for RetryPolicy {
    /// Default: 30 attempts, exponential from 2s, capped at 60s.
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 30,
            strategy: BackoffStrategy::Exponential,
            base_delay_ms: 2_000,
            max_delay_ms: 60_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 30);
        assert_eq!(p.max_delay_ms, 60_000);
        assert!(matches!(p.strategy, BackoffStrategy::Exponential));
    }

    #[test]
    fn should_retry_within_budget() {
        let p = RetryPolicy::new(3, BackoffStrategy::Fixed, 100, 100);
        assert!(p.should_retry(0));
        assert!(p.should_retry(2));
        assert!(!p.should_retry(3));
        assert!(!p.should_retry(4));
    }

    #[test]
    fn fixed_delay() {
        let p = RetryPolicy::new(12, BackoffStrategy::Fixed, 10_000, 10_000);
        assert_eq!(p.delay_ms(0), 10_000);
        assert_eq!(p.delay_ms(11), 10_000);
    }

    #[test]
    fn linear_delay() {
        let p = RetryPolicy::new(5, BackoffStrategy::Linear, 1000, 2500);
        assert_eq!(p.delay_ms(0), 1000);
        assert_eq!(p.delay_ms(1), 2000);
        assert_eq!(p.delay_ms(2), 2500);
    }

    #[test]
    fn exponential_delay_is_capped() {
        let p = RetryPolicy::new(30, BackoffStrategy::Exponential, 2_000, 60_000);
        assert_eq!(p.delay_ms(0), 2_000);
        assert_eq!(p.delay_ms(1), 4_000);
        assert_eq!(p.delay_ms(4), 32_000);
        assert_eq!(p.delay_ms(5), 60_000);
        assert_eq!(p.delay_ms(28), 60_000);
    }

    #[test]
    fn exponential_delay_does_not_overflow() {
        let p = RetryPolicy::new(200, BackoffStrategy::Exponential, u64::MAX / 2, u64::MAX);
        assert_eq!(p.delay_ms(100), u64::MAX);
    }
}
