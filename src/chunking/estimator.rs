/// Approximate tokenizer.
///
/// Counts bytes rather than chars, so multi-byte text is over-estimated
/// instead of under-estimated. Ratios are slightly below each vendor's
/// observed average for source code to leave a safety margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenEstimator {
    bytes_per_token: f64,
}

impl TokenEstimator {
    pub fn new(bytes_per_token: f64) -> Self {
        Self {
            bytes_per_token: if bytes_per_token.is_finite() && bytes_per_token > 0.0 {
                bytes_per_token
            } else {
                1.0
            },
        }
    }

    pub fn for_model(model: &str) -> Self {
        let lower = model.to_lowercase();
        if lower.starts_with("gpt-4") || lower.starts_with("gpt-5") || lower.starts_with("o1") {
            Self::new(3.8)
        } else if lower.starts_with("gpt-3.5") {
            Self::new(3.6)
        } else if lower.contains("claude") {
            Self::new(3.3)
        } else {
            Self::new(3.0)
        }
    }

    pub fn bytes_per_token(&self) -> f64 {
        self.bytes_per_token
    }

    pub fn estimate(&self, text: &str) -> usize {
        self.estimate_bytes(text.len())
    }

    pub fn estimate_bytes(&self, bytes: usize) -> usize {
        (bytes as f64 / self.bytes_per_token).ceil() as usize
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(4.0)
    }
}
