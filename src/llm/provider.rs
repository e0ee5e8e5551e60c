use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Unvalidated model output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    pub text: String,
    /// Present when the vendor returned schema-constrained JSON directly.
    pub structured: Option<Value>,
    pub usage: TokenUsage,
}

impl RawResult {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, prompt: &str, response_schema: &Value) -> Result<RawResult>;
    fn max_context_tokens(&self) -> usize;
    fn name(&self) -> &str;
    fn model(&self) -> &str;
}

/// Completion tokens requested from every vendor.
pub const MAX_RESPONSE_TOKENS: u32 = 1024;

const MAX_ERROR_BODY_CHARS: usize = 500;

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        truncated.push_str("...");
        truncated
    }
}

/// Maps a non-success vendor response onto the retry taxonomy.
pub(crate) fn classify_http_failure(provider: &str, status: StatusCode, body: &str) -> Error {
    let body = truncate_body(body);
    match status.as_u16() {
        429 => Error::RateLimitExceeded(format!("{} API returned 429: {}", provider, body)),
        401 | 403 => Error::LLMApi(format!("{} API rejected credentials ({})", provider, status)),
        // 529 is Anthropic's "overloaded"
        500..=599 => Error::TransientProvider(format!("{} API error ({}): {}", provider, status, body)),
        _ if body.contains("overloaded") => {
            Error::TransientProvider(format!("{} API overloaded ({}): {}", provider, status, body))
        }
        _ => Error::LLMApi(format!("{} API error ({}): {}", provider, status, body)),
    }
}

pub(crate) fn classify_send_error(provider: &str, error: reqwest::Error) -> Error {
    if error.is_timeout() || error.is_connect() {
        Error::TransientProvider(format!("{} request failed: {}", provider, error))
    } else {
        Error::LLMApi(format!("{} request failed: {}", provider, error))
    }
}
