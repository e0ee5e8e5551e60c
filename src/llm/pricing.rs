use crate::llm::provider::TokenUsage;

pub const DEFAULT_CONTEXT_WINDOW: usize = 8_000;

/// Context window and list price (USD per 1K tokens) of a known model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelProfile {
    pub context_window: usize,
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

const PROFILES: &[(&str, ModelProfile)] = &[
    (
        "gpt-4-turbo-preview",
        ModelProfile {
            context_window: 128_000,
            input_per_1k: 0.01,
            output_per_1k: 0.03,
        },
    ),
    (
        "gpt-4",
        ModelProfile {
            context_window: 8_192,
            input_per_1k: 0.03,
            output_per_1k: 0.06,
        },
    ),
    (
        "gpt-3.5-turbo",
        ModelProfile {
            context_window: 16_385,
            input_per_1k: 0.0005,
            output_per_1k: 0.0015,
        },
    ),
    (
        "claude-3-opus-20240229",
        ModelProfile {
            context_window: 200_000,
            input_per_1k: 0.015,
            output_per_1k: 0.075,
        },
    ),
    (
        "claude-3-sonnet-20240229",
        ModelProfile {
            context_window: 200_000,
            input_per_1k: 0.003,
            output_per_1k: 0.015,
        },
    ),
];

impl ModelProfile {
    /// Exact model-name lookup.
    pub fn lookup(model: &str) -> Option<ModelProfile> {
        PROFILES
            .iter()
            .find(|(name, _)| *name == model)
            .map(|(_, profile)| *profile)
    }

    pub fn cost(&self, usage: TokenUsage) -> f64 {
        (usage.input_tokens as f64 / 1000.0) * self.input_per_1k
            + (usage.output_tokens as f64 / 1000.0) * self.output_per_1k
    }
}

pub fn context_window_for(model: &str) -> usize {
    ModelProfile::lookup(model)
        .map(|p| p.context_window)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}

/// Zero for models without a known price.
pub fn estimate_cost(model: &str, usage: TokenUsage) -> f64 {
    ModelProfile::lookup(model)
        .map(|p| p.cost(usage))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_context_windows() {
        assert_eq!(context_window_for("gpt-4"), 8_192);
        assert_eq!(context_window_for("claude-3-opus-20240229"), 200_000);
        assert_eq!(context_window_for("some-local-model"), DEFAULT_CONTEXT_WINDOW);
    }

    #[test]
    fn test_cost_estimate() {
        let usage = TokenUsage {
            input_tokens: 2_000,
            output_tokens: 1_000,
        };
        let cost = estimate_cost("gpt-4", usage);
        assert!((cost - 0.12).abs() < 1e-9);
        assert_eq!(estimate_cost("unknown", usage), 0.0);
    }
}
