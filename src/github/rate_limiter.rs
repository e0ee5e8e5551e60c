use reqwest::header::HeaderMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

use crate::error::{Error, Result};

/// Client-side view of the GitHub API quota.
///
/// Independent of the LLM token bucket: exhausting one never throttles the
/// other.
pub struct RateLimiter {
    state: Arc<Mutex<RateLimitState>>,
    requests_per_minute: u32,
    max_wait: Duration,
}

struct RateLimitState {
    remaining: u32,
    reset_at: Option<Instant>,
    requests_this_minute: u32,
    minute_start: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(300, Duration::from_secs(60))
    }

    /// `max_wait` bounds how long `wait` sleeps for a quota reset before
    /// giving up with `Error::RateLimited`.
    pub fn with_limits(requests_per_minute: u32, max_wait: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateLimitState {
                remaining: 5000,
                reset_at: None,
                requests_this_minute: 0,
                minute_start: Instant::now(),
            })),
            requests_per_minute: requests_per_minute.max(1),
            max_wait,
        }
    }

    pub async fn wait(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.remaining == 0 {
            if let Some(reset_at) = state.reset_at {
                let now = Instant::now();
                if reset_at > now {
                    let wait_duration = reset_at - now;
                    if wait_duration > self.max_wait {
                        return Err(Error::RateLimited(wait_duration.as_secs()));
                    }
                    drop(state);
                    tracing::info!("GitHub quota exhausted, waiting {:?}", wait_duration);
                    sleep(wait_duration).await;
                    state = self.state.lock().await;
                }
            }
            // Quota resets at reset_at; the next response refreshes the real figure.
            state.remaining = 1;
            state.reset_at = None;
        }

        let minute_elapsed = state.minute_start.elapsed();
        if minute_elapsed < Duration::from_secs(60) {
            if state.requests_this_minute >= self.requests_per_minute {
                let wait_time = Duration::from_secs(60) - minute_elapsed;
                drop(state);
                tracing::debug!("Soft rate limiting, waiting {:?}", wait_time);
                sleep(wait_time).await;
                state = self.state.lock().await;
                state.requests_this_minute = 0;
                state.minute_start = Instant::now();
            }
        } else {
            state.requests_this_minute = 0;
            state.minute_start = Instant::now();
        }

        state.requests_this_minute += 1;
        Ok(())
    }

    pub async fn update_from_headers(&self, headers: &HeaderMap) {
        let header_value = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
        };

        let Some(remaining) = header_value("x-ratelimit-remaining") else {
            return;
        };
        let reset = header_value("x-ratelimit-reset");

        let mut state = self.state.lock().await;
        state.remaining = remaining.min(u32::MAX as u64) as u32;
        if let Some(reset_timestamp) = reset {
            let now = chrono::Utc::now().timestamp().max(0) as u64;
            state.reset_at = (reset_timestamp > now)
                .then(|| Instant::now() + Duration::from_secs(reset_timestamp - now));
        }
    }

    /// Seconds until the quota resets, when it is currently exhausted.
    pub async fn exhausted_for(&self) -> Option<u64> {
        let state = self.state.lock().await;
        if state.remaining > 0 {
            return None;
        }
        let now = Instant::now();
        Some(
            state
                .reset_at
                .filter(|reset| *reset > now)
                .map(|reset| (reset - now).as_secs())
                .unwrap_or(0),
        )
    }

    pub async fn remaining(&self) -> u32 {
        self.state.lock().await.remaining
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
