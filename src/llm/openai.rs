use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::llm::pricing;
use crate::llm::prompts::system_prompt_with_schema;
use crate::llm::provider::{
    classify_http_failure, classify_send_error, LLMProvider, RawResult, TokenUsage,
    MAX_RESPONSE_TOKENS,
};

pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI Chat Completions provider. Models that support it get a
/// schema-constrained or JSON-mode reply; older models fall back to plain
/// text that the parser extracts JSON from.
pub struct OpenAiProvider {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseFormat {
    JsonObject,
    JsonSchema { json_schema: JsonSchemaFormat },
}

#[derive(Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    schema: Value,
    strict: bool,
}

/// How much reply shaping a model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonSupport {
    Schema,
    JsonMode,
    Text,
}

impl JsonSupport {
    fn for_model(model: &str) -> Self {
        let model = model.to_lowercase();
        if model.starts_with("gpt-4o") || model.starts_with("gpt-4.1") {
            JsonSupport::Schema
        } else if model.starts_with("gpt-4-turbo")
            || model.starts_with("gpt-4-1106")
            || model.starts_with("gpt-4-0125")
            || (model.starts_with("gpt-3.5-turbo")
                && !model.contains("0301")
                && !model.contains("0613"))
        {
            JsonSupport::JsonMode
        } else {
            JsonSupport::Text
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl OpenAiProvider {
    pub fn new(api_key: SecretString, model: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;

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

    fn build_request(&self, prompt: &str, schema: &Value) -> ChatCompletionRequest {
        let response_format = match JsonSupport::for_model(&self.model) {
            JsonSupport::Schema if schema.is_object() => Some(ResponseFormat::JsonSchema {
                json_schema: JsonSchemaFormat {
                    name: "complexity_scores",
                    schema: schema.clone(),
                    strict: false,
                },
            }),
            JsonSupport::Schema | JsonSupport::JsonMode => Some(ResponseFormat::JsonObject),
            JsonSupport::Text => None,
        };

        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt_with_schema(schema),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.1,
            max_tokens: MAX_RESPONSE_TOKENS,
            response_format,
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAiProvider {
    async fn complete(&self, prompt: &str, response_schema: &Value) -> Result<RawResult> {
        tracing::debug!("Sending {} prompt bytes to OpenAI ({})", prompt.len(), self.model);

        let request = self.build_request(prompt, response_schema);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_send_error("OpenAI", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_failure("OpenAI", status, &body));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMApi(format!("Failed to parse OpenAI response: {}", e)))?;

        let usage = body
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        // Text-mode replies that are not a bare object fall through to
        // extraction in the parser.
        let structured = serde_json::from_str::<Value>(&text)
            .ok()
            .filter(Value::is_object);

        Ok(RawResult {
            text,
            structured,
            usage,
        })
    }

    fn max_context_tokens(&self) -> usize {
        pricing::context_window_for(&self.model)
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
