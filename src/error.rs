use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid complexity weights: {0}")]
    InvalidWeights(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid repository identifier: {0}")]
    InvalidRepository(String),

    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("GitHub rate limit exceeded, resets in {0} seconds")]
    RateLimited(u64),

    #[error("{path}: line {line} needs ~{tokens} tokens but the chunk budget is {budget}")]
    OversizedUnit {
        path: String,
        line: usize,
        tokens: usize,
        budget: usize,
    },

    #[error("Malformed LLM response: {reason}")]
    MalformedResponse { reason: String, raw: String },

    #[error("LLM rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Transient LLM provider error: {0}")]
    TransientProvider(String),

    #[error("LLM API error: {0}")]
    LLMApi(String),

    #[error("Failed to fetch file content: {0}")]
    FileFetch(String),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used for propagation decisions and for the
/// `skipped` entries of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    SourceAccess,
    OversizedUnit,
    MalformedResponse,
    RateLimit,
    TransientProvider,
    Provider,
    Cancelled,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::SourceAccess => "source access",
            ErrorCategory::OversizedUnit => "oversized unit",
            ErrorCategory::MalformedResponse => "malformed response",
            ErrorCategory::RateLimit => "rate limit",
            ErrorCategory::TransientProvider => "transient provider",
            ErrorCategory::Provider => "provider",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::Internal => "internal",
        };
        write!(f, "{}", name)
    }
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnknownProvider(_) | Error::InvalidWeights(_) | Error::Config(_) => {
                ErrorCategory::Configuration
            }
            Error::InvalidRepository(_)
            | Error::RepoNotFound(_)
            | Error::GitHubApi(_)
            | Error::RateLimited(_)
            | Error::FileFetch(_) => ErrorCategory::SourceAccess,
            Error::OversizedUnit { .. } => ErrorCategory::OversizedUnit,
            Error::MalformedResponse { .. } => ErrorCategory::MalformedResponse,
            Error::RateLimitExceeded(_) => ErrorCategory::RateLimit,
            Error::TransientProvider(_) | Error::Network(_) => ErrorCategory::TransientProvider,
            Error::LLMApi(_) | Error::InvalidHeader(_) => ErrorCategory::Provider,
            Error::Cancelled => ErrorCategory::Cancelled,
            Error::Serialization(_) | Error::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Errors the governor may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimitExceeded(_) | Error::TransientProvider(_) | Error::Network(_)
        )
    }

    /// Errors that abort the whole run instead of skipping a file.
    ///
    /// `FileFetch` is a source error scoped to one file and stays recoverable.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::FileFetch(_) => false,
            Error::Cancelled => true,
            other => matches!(
                other.category(),
                ErrorCategory::Configuration | ErrorCategory::SourceAccess
            ),
        }
    }

    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Error::MalformedResponse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}
