use serde_json::{json, Value};

use crate::chunking::TokenEstimator;
use crate::llm::provider::MAX_RESPONSE_TOKENS;
use crate::models::{Chunk, Dimension};

pub const SYSTEM_PROMPT: &str = r#"You are an expert software architect scoring source code complexity.

Score each requested dimension from 0 (trivial) to 100 (extremely complex):

- cyclomatic: control-flow complexity. Count branches, loops, early returns and
  match/switch arms; deeply nested structures raise the score sharply.
- architectural: structural sophistication. Abstraction layers, indirection,
  design patterns (factory, strategy, observer, decorator...), dependency
  injection and cross-module coupling.
- algorithmic: sophistication of the algorithms involved. Time/space
  complexity, graph traversal, dynamic programming, numeric or concurrent
  algorithms.

Also list the design patterns you can identify (for example "Factory",
"Strategy", "Observer", "Decorator") and count the functions and the classes
(or structs, traits and interfaces) defined in the code shown.

You may be shown only part of a file. Judge the code you are given; do not
speculate about code you cannot see.

Respond with valid JSON only, matching this shape:
{
    "scores": [
        {"dimension": "cyclomatic", "value": 0-100, "rationale": "evidence citing concrete constructs"}
    ],
    "patterns": ["Strategy"],
    "functions": 0,
    "classes": 0
}
Include exactly one entry per requested dimension. Rationales must be non-empty.
Use an empty list when no pattern is present."#;

/// Longest malformed-reply reason echoed back in a re-ask prompt.
pub const MAX_REASK_REASON_BYTES: usize = 200;

/// Per-message framing the vendors add on top of the message text.
const MESSAGE_FRAMING_TOKENS: usize = 8;

/// The system prompt with the reply schema appended, as sent by every vendor.
pub fn system_prompt_with_schema(schema: &Value) -> String {
    if schema.is_object() {
        format!(
            "{}\n\nThe reply must match this JSON schema:\n{}",
            SYSTEM_PROMPT, schema
        )
    } else {
        SYSTEM_PROMPT.to_string()
    }
}

/// Tokens a request for a chunk of `path` adds around the chunk text: the
/// system prompt with its schema, the prompt header and fence, the re-ask
/// suffix, message framing and the response allowance.
pub fn request_overhead(
    path: &str,
    language: Option<&str>,
    dimensions: &[Dimension],
    estimator: &TokenEstimator,
) -> usize {
    let scaffold = AnalysisRequest::new(
        Chunk {
            source_path: path.to_string(),
            sequence_index: 99_998,
            text: String::new(),
            estimated_tokens: 0,
        },
        dimensions.to_vec(),
    )
    .with_language(language.map(str::to_string))
    .with_total_chunks(99_999);

    let system = system_prompt_with_schema(&scaffold.response_schema());
    let prompt = scaffold.to_reask_prompt(&"x".repeat(MAX_REASK_REASON_BYTES));

    estimator.estimate(&system)
        + estimator.estimate(&prompt)
        + 2 * MESSAGE_FRAMING_TOKENS
        + MAX_RESPONSE_TOKENS as usize
}

fn truncate_reason(problem: &str) -> &str {
    if problem.len() <= MAX_REASK_REASON_BYTES {
        return problem;
    }
    let mut end = MAX_REASK_REASON_BYTES;
    while !problem.is_char_boundary(end) {
        end -= 1;
    }
    &problem[..end]
}

/// One chunk plus the dimensions it should be scored on.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub chunk: Chunk,
    pub dimensions: Vec<Dimension>,
    pub language_hint: Option<String>,
    pub total_chunks: usize,
}

impl AnalysisRequest {
    pub fn new(chunk: Chunk, dimensions: Vec<Dimension>) -> Self {
        Self {
            chunk,
            dimensions,
            language_hint: None,
            total_chunks: 1,
        }
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language_hint = language;
        self
    }

    pub fn with_total_chunks(mut self, total: usize) -> Self {
        self.total_chunks = total.max(1);
        self
    }

    pub fn to_prompt(&self) -> String {
        let mut prompt = format!("File: {}", self.chunk.source_path);
        if let Some(lang) = &self.language_hint {
            prompt.push_str(&format!(" ({})", lang));
        }
        prompt.push('\n');

        if self.total_chunks > 1 {
            prompt.push_str(&format!(
                "Part {} of {} of this file.\n",
                self.chunk.sequence_index + 1,
                self.total_chunks
            ));
        }

        let names: Vec<_> = self.dimensions.iter().map(|d| d.as_str()).collect();
        prompt.push_str(&format!("Dimensions to score: {}\n\n", names.join(", ")));

        prompt.push_str("```\n");
        prompt.push_str(&self.chunk.text);
        if !self.chunk.text.ends_with('\n') {
            prompt.push('\n');
        }
        prompt.push_str("```\n\nProvide your scores as JSON:\n");
        prompt
    }

    /// JSON schema constraining the reply to the requested dimensions.
    pub fn response_schema(&self) -> Value {
        let names: Vec<_> = self.dimensions.iter().map(|d| d.as_str()).collect();
        json!({
            "type": "object",
            "required": ["scores"],
            "additionalProperties": false,
            "properties": {
                "scores": {
                    "type": "array",
                    "minItems": names.len(),
                    "items": {
                        "type": "object",
                        "required": ["dimension", "value", "rationale"],
                        "additionalProperties": false,
                        "properties": {
                            "dimension": {"type": "string", "enum": names},
                            "value": {"type": "number", "minimum": 0, "maximum": 100},
                            "rationale": {"type": "string", "minLength": 1}
                        }
                    }
                },
                "patterns": {"type": "array", "items": {"type": "string"}},
                "functions": {"type": "integer", "minimum": 0},
                "classes": {"type": "integer", "minimum": 0}
            }
        })
    }

    /// Stricter follow-up prompt used after a malformed reply.
    pub fn to_reask_prompt(&self, problem: &str) -> String {
        format!(
            "{}\nYour previous reply was rejected: {}.\nReply with the JSON object only, no prose.\n",
            self.to_prompt(),
            truncate_reason(problem)
        )
    }
}
