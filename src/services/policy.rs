use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// How retry delays grow between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every retry
    Fixed,
    /// Delay grows linearly with the attempt number
    Linear,
    /// Delay doubles per attempt, with up to 50% random jitter added
    ExponentialJitter,
}

/// Retry policy for transport-class step errors. Assertion failures are
/// deterministic outcomes and are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub strategy: BackoffStrategy,
    /// Retries after the initial attempt
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Linear => self.base_delay * attempt,
            BackoffStrategy::ExponentialJitter => {
                let exp = self.base_delay * (1 << (attempt - 1).min(16));
                let jitter = SmallRng::from_entropy().gen_range(0.0..=0.5);
                exp.mul_f64(1.0 + jitter)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::ExponentialJitter,
            max_retries: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

/// Per-step wall-clock budget. Exceeding it counts as a transport error,
/// eligible for retry until the policy exhausts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    pub duration: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30),
        }
    }
}
