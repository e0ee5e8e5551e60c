use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Run-wide admission control for LLM calls.
///
/// Tokens refill continuously at `refill_per_second` up to `capacity`. Each
/// call takes one token; a caller that cannot get one before the admission
/// deadline fails with `RateLimitExceeded`.
#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    refill_per_second: f64,
    capacity: f64,
    admission_timeout: Duration,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, refill_per_second: f64, capacity: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_second).min(capacity);
        self.last_refill = now;
    }
}

impl TokenBucket {
    /// Starts full.
    pub fn new(refill_per_second: f64, burst_capacity: u32, admission_timeout: Duration) -> Self {
        let capacity = f64::from(burst_capacity.max(1));
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            refill_per_second: refill_per_second.max(f64::MIN_POSITIVE),
            capacity,
            admission_timeout,
        }
    }

    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        state.refill(self.refill_per_second, self.capacity);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub async fn acquire(&self) -> Result<()> {
        // No deadline when the timeout overflows the clock.
        let deadline = Instant::now().checked_add(self.admission_timeout);

        loop {
            let wait_secs = {
                let mut state = self.state.lock().await;
                state.refill(self.refill_per_second, self.capacity);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                (1.0 - state.tokens) / self.refill_per_second
            };

            let remaining_secs = deadline
                .map(|d| d.saturating_duration_since(Instant::now()).as_secs_f64())
                .unwrap_or(f64::INFINITY);
            // Compared as f64: a tiny refill rate yields a wait no Duration can hold.
            if !wait_secs.is_finite() || !(wait_secs <= remaining_secs) {
                return Err(Error::RateLimitExceeded(format!(
                    "no request slot within {:?}",
                    self.admission_timeout
                )));
            }

            let wait = Duration::from_secs_f64(wait_secs);
            tracing::debug!("Waiting {:?} for a request slot", wait);
            tokio::time::sleep(wait).await;
        }
    }

    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        state.refill(self.refill_per_second, self.capacity);
        state.tokens
    }
}
