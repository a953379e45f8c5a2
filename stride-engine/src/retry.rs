//! Conflict Retry
//!
//! Backoff between attempts when a ledger commit loses the optimistic
//! version race. Every attempt re-reads the snapshot, so a retry never
//! reuses stale state.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Backoff strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Retry immediately
    None,
    /// Fixed delay between retries
    Fixed { delay_ms: u64 },
    /// Exponential backoff
    Exponential {
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Exponential {
            initial_delay_ms: 5,
            max_delay_ms: 200,
            multiplier: 2.0,
        }
    }
}

impl RetryStrategy {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            RetryStrategy::None => Duration::ZERO,
            RetryStrategy::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            RetryStrategy::Exponential {
                initial_delay_ms,
                max_delay_ms,
                multiplier,
            } => {
                let exp = attempt.saturating_sub(1).min(30) as i32;
                let delay = (*initial_delay_ms as f64) * multiplier.powi(exp);
                let delay = delay.min(*max_delay_ms as f64).max(0.0);
                Duration::from_millis(delay as u64)
            }
        }
    }
}

/// Bounded retry budget for version conflicts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub strategy: RetryStrategy,
    /// Add up to half the delay again at random so racing writers spread out
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            strategy: RetryStrategy::default(),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            strategy: RetryStrategy::None,
            jitter: false,
        }
    }

    /// Whether another attempt is allowed after `attempts` have run
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.strategy.delay_for_attempt(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let spread = (base.as_millis() as u64 / 2).max(1);
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_is_capped() {
        let strategy = RetryStrategy::Exponential {
            initial_delay_ms: 10,
            max_delay_ms: 50,
            multiplier: 2.0,
        };
        assert_eq!(strategy.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(strategy.delay_for_attempt(2), Duration::from_millis(20));
        assert_eq!(strategy.delay_for_attempt(3), Duration::from_millis(40));
        assert_eq!(strategy.delay_for_attempt(4), Duration::from_millis(50));
        assert_eq!(strategy.delay_for_attempt(100), Duration::from_millis(50));
    }

    #[test]
    fn test_budget() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(policy.max_attempts));
        assert!(!RetryPolicy::no_retry().should_retry(1));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy {
            max_attempts: 3,
            strategy: RetryStrategy::Fixed { delay_ms: 10 },
            jitter: true,
        };
        for _ in 0..20 {
            let d = policy.backoff(1);
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(15));
        }
    }
}
