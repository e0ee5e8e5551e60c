pub mod analysis;
pub mod chunking;
pub mod config;
pub mod error;
pub mod github;
pub mod governor;
pub mod llm;
pub mod models;

use std::sync::Arc;

pub use analysis::{aggregate, AnalysisPipeline, ComplexityScorer};
pub use chunking::{TokenBudgeter, TokenEstimator};
pub use config::{AnalysisConfig, Config, Credentials};
pub use error::{Error, ErrorCategory, Result};
pub use github::{GitHubClient, RepositorySource};
pub use llm::{create_provider, LLMProvider, ProviderKind};
pub use models::ComplexityReport;

/// Analyzes a GitHub repository end to end.
///
/// Configuration is validated and the provider constructed before any
/// network call, so unknown providers, bad weights and missing keys fail
/// fast.
pub async fn analyze(
    repository: &str,
    config: &AnalysisConfig,
    credentials: &Credentials,
) -> Result<ComplexityReport> {
    config.validate()?;
    let llm = create_provider(&config.llm_provider, config.model.as_deref(), credentials)?;
    let source = Arc::new(GitHubClient::new(credentials.github_token.as_ref())?);

    AnalysisPipeline::new(source, llm, config.clone())?
        .analyze(repository)
        .await
}
