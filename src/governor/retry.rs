use rand::Rng;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::llm::RawResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// `base * 2^attempt`, capped at `max_delay`. No jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Upper bound (exclusive) of the jitter added to a delay.
    pub fn jitter_bound(delay: Duration) -> Duration {
        delay / 4
    }

    /// `delay_for(attempt)` plus jitter in `[0, delay/4)`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        (delay + random_jitter(delay)).min(self.max_delay)
    }
}

fn random_jitter(delay: Duration) -> Duration {
    let max_jitter_ms = RetryPolicy::jitter_bound(delay).as_millis() as u64;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..max_jitter_ms))
}

/// Classified result of one attempt.
#[derive(Debug)]
pub enum CallOutcome {
    Ok(RawResult),
    Retryable(Error),
    Fatal(Error),
}

impl From<Result<RawResult>> for CallOutcome {
    fn from(result: Result<RawResult>) -> Self {
        match result {
            Ok(raw) => CallOutcome::Ok(raw),
            Err(e) if e.is_retryable() => CallOutcome::Retryable(e),
            Err(e) => CallOutcome::Fatal(e),
        }
    }
}
