use secrecy::SecretString;
use std::env;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::chunking::DEFAULT_RESERVED_FOR_RESPONSE;
use crate::error::{Error, Result};
use crate::github::FileFilter;
use crate::governor::{RetryPolicy, TokenBucket};
use crate::llm::factory::ProviderKind;
use crate::llm::pricing;
use crate::models::{ComplexityWeights, Dimension};

/// API keys for the repository host and the LLM vendors.
#[derive(Clone, Default)]
pub struct Credentials {
    pub github_token: Option<SecretString>,
    pub anthropic_api_key: Option<SecretString>,
    pub openai_api_key: Option<SecretString>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &Option<SecretString>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Credentials")
            .field("github_token", &redact(&self.github_token))
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .field("openai_api_key", &redact(&self.openai_api_key))
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            github_token: secret_var("GITHUB_TOKEN"),
            anthropic_api_key: secret_var("ANTHROPIC_API_KEY"),
            openai_api_key: secret_var("OPENAI_API_KEY"),
        }
    }
}

fn secret_var(name: &str) -> Option<SecretString> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Reads keys and run defaults from the environment. Missing keys are
    /// not an error here; the provider factory rejects them when needed.
    pub fn from_env() -> Result<Self> {
        let mut analysis = AnalysisConfig::default();

        if let Ok(provider) = env::var("LLM_PROVIDER") {
            analysis.llm_provider = provider.trim().to_lowercase();
        }
        if let Ok(model) = env::var("LLM_MODEL") {
            analysis.model = Some(model.trim().to_string()).filter(|m| !m.is_empty());
        }
        if let Some(max_files) = parsed_var("MAX_FILES") {
            analysis.max_files = max_files;
        }
        if let Some(budget) = parsed_var("CONTEXT_BUDGET") {
            analysis.context_budget = Some(budget);
        }
        if let Some(retries) = parsed_var("MAX_RETRIES") {
            analysis.max_retries = retries;
        }
        if let Some(limit) = parsed_var("CONCURRENCY_LIMIT") {
            analysis.concurrency_limit = limit;
        }

        Ok(Self {
            credentials: Credentials::from_env(),
            analysis,
        })
    }
}

/// Parameters of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub llm_provider: String,
    /// Vendor default when `None`.
    pub model: Option<String>,
    pub max_files: usize,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub complexity_weights: ComplexityWeights,
    pub dimensions: Vec<Dimension>,
    /// Falls back to the model's known context window.
    pub context_budget: Option<usize>,
    pub reserved_for_response: usize,
    pub max_retries: u32,
    pub concurrency_limit: usize,
    pub requests_per_second: f64,
    pub burst_capacity: u32,
    pub admission_timeout: Duration,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub run_timeout: Option<Duration>,
    pub show_progress: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            llm_provider: "anthropic".to_string(),
            model: None,
            max_files: 100,
            include_patterns: Vec::new(),
            exclude_patterns: vec![
                "tests/*".to_string(),
                "*.md".to_string(),
                "*.txt".to_string(),
            ],
            complexity_weights: ComplexityWeights::default(),
            dimensions: Dimension::ALL.to_vec(),
            context_budget: None,
            reserved_for_response: DEFAULT_RESERVED_FOR_RESPONSE,
            max_retries: 3,
            concurrency_limit: 5,
            requests_per_second: 2.0,
            burst_capacity: 5,
            admission_timeout: Duration::from_secs(60),
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
            run_timeout: None,
            show_progress: false,
        }
    }
}

impl AnalysisConfig {
    /// Checks everything that can be checked without a network call.
    pub fn validate(&self) -> Result<()> {
        let kind: ProviderKind = self.llm_provider.parse()?;
        self.complexity_weights.normalize()?;

        if self.dimensions.is_empty() {
            return Err(Error::Config("at least one dimension is required".to_string()));
        }
        if self.max_files == 0 {
            return Err(Error::Config("max_files must be at least 1".to_string()));
        }
        if self.concurrency_limit == 0 || self.concurrency_limit > Semaphore::MAX_PERMITS {
            return Err(Error::Config(format!(
                "concurrency_limit must be between 1 and {}, got {}",
                Semaphore::MAX_PERMITS,
                self.concurrency_limit
            )));
        }
        if !self.requests_per_second.is_finite() || self.requests_per_second <= 0.0 {
            return Err(Error::Config(format!(
                "requests_per_second must be positive, got {}",
                self.requests_per_second
            )));
        }
        if self.burst_capacity == 0 {
            return Err(Error::Config("burst_capacity must be at least 1".to_string()));
        }
        if self.retry_base_delay > self.retry_max_delay {
            return Err(Error::Config(
                "retry_base_delay must not exceed retry_max_delay".to_string(),
            ));
        }

        FileFilter::new(&self.include_patterns, &self.exclude_patterns)?;

        let budget = self.resolve_context_budget(self.model_name(kind));
        if self.reserved_for_response >= budget {
            return Err(Error::Config(format!(
                "reserved_for_response ({}) leaves no room in a context budget of {}",
                self.reserved_for_response, budget
            )));
        }

        Ok(())
    }

    pub fn model_name(&self, kind: ProviderKind) -> &str {
        self.model.as_deref().unwrap_or_else(|| kind.default_model())
    }

    pub fn resolve_context_budget(&self, model: &str) -> usize {
        self.context_budget
            .unwrap_or_else(|| pricing::context_window_for(model))
    }

    pub fn file_filter(&self) -> Result<FileFilter> {
        FileFilter::new(&self.include_patterns, &self.exclude_patterns)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_base_delay, self.retry_max_delay)
    }

    pub fn token_bucket(&self) -> TokenBucket {
        TokenBucket::new(
            self.requests_per_second,
            self.burst_capacity,
            self.admission_timeout,
        )
    }
}
