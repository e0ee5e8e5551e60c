pub mod claude;
pub mod factory;
pub mod openai;
pub mod parser;
pub mod pricing;
pub mod prompts;
pub mod provider;

pub use claude::ClaudeProvider;
pub use factory::{create_provider, ProviderKind};
pub use openai::OpenAiProvider;
pub use parser::{parse_dimension_scores, parse_reply, ParsedReply};
pub use pricing::ModelProfile;
pub use prompts::{request_overhead, system_prompt_with_schema, AnalysisRequest};
pub use provider::{LLMProvider, RawResult, TokenUsage};
