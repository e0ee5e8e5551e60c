pub mod retry;
pub mod token_bucket;

pub use retry::{CallOutcome, RetryPolicy};
pub use token_bucket::TokenBucket;

use std::future::Future;

use crate::error::Result;
use crate::llm::RawResult;

/// Wraps every LLM call in admission control and retry with backoff.
#[derive(Debug)]
pub struct Governor {
    bucket: TokenBucket,
    policy: RetryPolicy,
}

impl Governor {
    pub fn new(bucket: TokenBucket, policy: RetryPolicy) -> Self {
        Self { bucket, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` until it succeeds, fails fatally, or exhausts
    /// `max_retries`. Failing to get a request slot counts as retryable.
    pub async fn call<F, Fut>(&self, mut operation: F) -> Result<RawResult>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RawResult>>,
    {
        let mut attempt = 0u32;
        loop {
            let outcome = match self.bucket.acquire().await {
                Ok(()) => CallOutcome::from(operation().await),
                Err(e) => CallOutcome::Retryable(e),
            };

            match outcome {
                CallOutcome::Ok(raw) => return Ok(raw),
                CallOutcome::Fatal(e) => return Err(e),
                CallOutcome::Retryable(e) => {
                    if attempt >= self.policy.max_retries {
                        tracing::warn!("Giving up after {} attempts: {}", attempt + 1, e);
                        return Err(e);
                    }
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        "Attempt {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
