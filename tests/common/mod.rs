#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use complexity_analyzer::chunking::{TokenBudgeter, TokenEstimator};
use complexity_analyzer::github::{FileFilter, RepositorySource, SourceListing};
use complexity_analyzer::llm::{LLMProvider, RawResult, TokenUsage};
use complexity_analyzer::models::FileUnit;
use complexity_analyzer::{AnalysisConfig, AnalysisPipeline, Error, Result};

/// Serves a fixed set of files as if they came from a repository host.
pub struct InMemorySource {
    pub files: Vec<FileUnit>,
}

impl InMemorySource {
    pub fn new(files: Vec<FileUnit>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl RepositorySource for InMemorySource {
    async fn fetch_files(
        &self,
        identifier: &str,
        filter: &FileFilter,
        max_files: usize,
    ) -> Result<SourceListing> {
        if identifier == "octo/missing" {
            return Err(Error::RepoNotFound(identifier.to_string()));
        }

        let matching: Vec<_> = self
            .files
            .iter()
            .filter(|f| filter.matches(&f.path))
            .cloned()
            .collect();

        Ok(SourceListing {
            repository: identifier.to_string(),
            total_candidates: matching.len(),
            files: matching.into_iter().take(max_files).collect(),
            skipped: Vec::new(),
        })
    }
}

type Responder = dyn Fn(&str, u32) -> Result<RawResult> + Send + Sync;

/// Provider whose replies are computed from the prompt and the call number.
pub struct ScriptedProvider {
    responder: Box<Responder>,
    calls: AtomicU32,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    model: String,
    context_window: usize,
}

impl ScriptedProvider {
    pub fn new(responder: impl Fn(&str, u32) -> Result<RawResult> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: AtomicU32::new(0),
            latency: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            model: "scripted-model".to_string(),
            context_window: 8_000,
        }
    }

    pub fn with_model(mut self, model: &str, context_window: usize) -> Self {
        self.model = model.to_string();
        self.context_window = context_window;
        self
    }

    /// Highest number of `complete` calls seen running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Scores every file by the table, keyed by path.
    pub fn scoring(table: Vec<(&'static str, [f64; 3])>) -> Self {
        Self::new(move |prompt, _| {
            let path = path_of(prompt);
            let values = table
                .iter()
                .find(|(p, _)| *p == path)
                .map(|(_, v)| *v)
                .unwrap_or([50.0, 50.0, 50.0]);
            Ok(reply(values))
        })
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str, _response_schema: &Value) -> Result<RawResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.responder)(prompt, call)
    }

    fn max_context_tokens(&self) -> usize {
        self.context_window
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// The path named on the first prompt line.
pub fn path_of(prompt: &str) -> String {
    let first = prompt.lines().next().unwrap_or_default();
    let path = first.trim_start_matches("File: ");
    path.split(" (").next().unwrap_or(path).to_string()
}

/// The "Part N of M" index on the prompt, 1-based; 1 for single-chunk files.
pub fn part_of(prompt: &str) -> usize {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Part "))
        .and_then(|rest| rest.split(' ').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

pub fn reply(values: [f64; 3]) -> RawResult {
    let text = format!(
        r#"{{"scores": [
            {{"dimension": "cyclomatic", "value": {}, "rationale": "branching"}},
            {{"dimension": "architectural", "value": {}, "rationale": "layering"}},
            {{"dimension": "algorithmic", "value": {}, "rationale": "data structures"}}
        ]}}"#,
        values[0], values[1], values[2]
    );
    RawResult {
        text,
        structured: None,
        usage: TokenUsage {
            input_tokens: 100,
            output_tokens: 20,
        },
    }
}

/// `lines` lines of exactly 40 bytes, i.e. 10 tokens each at 4 bytes/token.
pub fn file_with_lines(path: &str, lines: usize) -> FileUnit {
    let content: String = (0..lines)
        .map(|i| format!("let value_{:05} = compute(input); //...\n", i))
        .collect();
    FileUnit::new(path, content)
}

pub fn test_config() -> AnalysisConfig {
    AnalysisConfig {
        context_budget: Some(2_000),
        reserved_for_response: 0,
        requests_per_second: 1_000.0,
        burst_capacity: 100,
        retry_base_delay: Duration::from_millis(20),
        retry_max_delay: Duration::from_secs(1),
        ..Default::default()
    }
}

pub fn pipeline(
    files: Vec<FileUnit>,
    provider: Arc<ScriptedProvider>,
    config: AnalysisConfig,
) -> AnalysisPipeline {
    AnalysisPipeline::new(Arc::new(InMemorySource::new(files)), provider, config)
        .expect("valid config")
        .with_budgeter(TokenBudgeter::new(TokenEstimator::new(4.0)))
}
