use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::llm::pricing;
use crate::llm::prompts::system_prompt_with_schema;
use crate::llm::provider::{
    classify_http_failure, classify_send_error, LLMProvider, RawResult, TokenUsage,
    MAX_RESPONSE_TOKENS,
};

pub const DEFAULT_MODEL: &str = "claude-3-opus-20240229";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub struct ClaudeProvider {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for ClaudeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeProvider")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ClaudeUsage>,
    #[serde(default)]
    error: Option<ClaudeError>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ClaudeUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Deserialize)]
struct ClaudeError {
    #[serde(rename = "type", default)]
    error_type: String,
    message: String,
}

impl ClaudeProvider {
    pub fn new(api_key: SecretString, model: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LLMProvider for ClaudeProvider {
    async fn complete(&self, prompt: &str, response_schema: &Value) -> Result<RawResult> {
        tracing::debug!("Sending {} prompt bytes to Claude ({})", prompt.len(), self.model);

        let request_body = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: MAX_RESPONSE_TOKENS,
            temperature: 0.1,
            system: Some(system_prompt_with_schema(response_schema)),
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| classify_send_error("Claude", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_failure("Claude", status, &body));
        }

        let result: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMApi(format!("Failed to parse Claude response: {}", e)))?;

        if let Some(error) = result.error {
            if error.error_type == "overloaded_error" {
                return Err(Error::TransientProvider(error.message));
            }
            return Err(Error::LLMApi(error.message));
        }

        let text = result
            .content
            .into_iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        let usage = result
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            })
            .unwrap_or_default();

        Ok(RawResult {
            text,
            structured: None,
            usage,
        })
    }

    fn max_context_tokens(&self) -> usize {
        pricing::ModelProfile::lookup(&self.model)
            .map(|p| p.context_window)
            .unwrap_or(200_000)
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
