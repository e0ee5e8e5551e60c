use std::sync::atomic::{AtomicU64, Ordering};

use crate::governor::Governor;
use crate::llm::{pricing, TokenUsage};
use crate::models::UsageSummary;

/// Token usage reported by providers over a run.
#[derive(Debug, Default)]
pub struct UsageTracker {
    requests: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl UsageTracker {
    pub fn record(&self, usage: TokenUsage) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.input_tokens
            .fetch_add(usage.input_tokens, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(usage.output_tokens, Ordering::Relaxed);
    }

    pub fn totals(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
        }
    }

    pub fn summary(&self, model: &str) -> UsageSummary {
        let totals = self.totals();
        UsageSummary {
            requests: self.requests.load(Ordering::Relaxed),
            input_tokens: totals.input_tokens,
            output_tokens: totals.output_tokens,
            estimated_cost_usd: pricing::estimate_cost(model, totals),
        }
    }
}

/// State shared by every chunk worker of one run.
#[derive(Debug)]
pub struct RunContext {
    pub governor: Governor,
    pub usage: UsageTracker,
}

impl RunContext {
    pub fn new(governor: Governor) -> Self {
        Self {
            governor,
            usage: UsageTracker::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_summary_includes_cost() {
        let tracker = UsageTracker::default();
        tracker.record(TokenUsage {
            input_tokens: 1_500,
            output_tokens: 200,
        });
        tracker.record(TokenUsage {
            input_tokens: 500,
            output_tokens: 800,
        });

        let summary = tracker.summary("gpt-4");
        assert_eq!(summary.requests, 2);
        assert_eq!(summary.input_tokens, 2_000);
        assert_eq!(summary.output_tokens, 1_000);
        assert!((summary.estimated_cost_usd - 0.12).abs() < 1e-9);
    }
}
