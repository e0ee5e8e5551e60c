use std::str::FromStr;
use std::sync::Arc;

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::llm::claude::{self, ClaudeProvider};
use crate::llm::openai::{self, OpenAiProvider};
use crate::llm::provider::LLMProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => claude::DEFAULT_MODEL,
            ProviderKind::OpenAi => openai::DEFAULT_MODEL,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "openai" => Ok(ProviderKind::OpenAi),
            _ => Err(Error::UnknownProvider(s.to_string())),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Builds the provider named by `name`. Fails before any network call on an
/// unknown name or a missing key.
pub fn create_provider(
    name: &str,
    model: Option<&str>,
    credentials: &Credentials,
) -> Result<Arc<dyn LLMProvider>> {
    let kind: ProviderKind = name.parse()?;
    let model = model.map(str::to_string);

    let provider: Arc<dyn LLMProvider> = match kind {
        ProviderKind::Anthropic => {
            let key = credentials.anthropic_api_key.clone().ok_or_else(|| {
                Error::Config("ANTHROPIC_API_KEY is required for the anthropic provider".to_string())
            })?;
            Arc::new(ClaudeProvider::new(key, model)?)
        }
        ProviderKind::OpenAi => {
            let key = credentials.openai_api_key.clone().ok_or_else(|| {
                Error::Config("OPENAI_API_KEY is required for the openai provider".to_string())
            })?;
            Arc::new(OpenAiProvider::new(key, model)?)
        }
    };

    tracing::debug!("Created {} provider ({})", provider.name(), provider.model());
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn credentials() -> Credentials {
        Credentials {
            github_token: None,
            anthropic_api_key: Some(SecretString::from("a".to_string())),
            openai_api_key: Some(SecretString::from("o".to_string())),
        }
    }

    #[test]
    fn test_parse_provider_kind() {
        assert_eq!("anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert!(matches!(
            "unknown".parse::<ProviderKind>(),
            Err(Error::UnknownProvider(name)) if name == "unknown"
        ));
    }

    #[test]
    fn test_create_provider_with_defaults() {
        let provider = create_provider("anthropic", None, &credentials()).unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.model(), "claude-3-opus-20240229");

        let provider = create_provider("openai", Some("gpt-4"), &credentials()).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-4");
    }

    #[test]
    fn test_unknown_provider() {
        let result = create_provider("unknown", None, &credentials());
        assert!(matches!(result, Err(Error::UnknownProvider(_))));
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let result = create_provider("openai", None, &Credentials::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
