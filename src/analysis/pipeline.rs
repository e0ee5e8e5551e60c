use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::analysis::aggregator::ComplexityScorer;
use crate::analysis::context::RunContext;
use crate::chunking::TokenBudgeter;
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::github::RepositorySource;
use crate::governor::Governor;
use crate::llm::{parse_reply, request_overhead, AnalysisRequest, LLMProvider, RawResult};
use crate::models::{Chunk, ChunkScores, ComplexityReport, FileUnit, ReportMetadata, SkippedFile};

pub struct AnalysisPipeline {
    source: Arc<dyn RepositorySource>,
    llm: Arc<dyn LLMProvider>,
    budgeter: TokenBudgeter,
    scorer: ComplexityScorer,
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    pub fn new(
        source: Arc<dyn RepositorySource>,
        llm: Arc<dyn LLMProvider>,
        config: AnalysisConfig,
    ) -> Result<Self> {
        config.validate()?;
        let scorer = ComplexityScorer::new(&config.complexity_weights)?;
        let budgeter = TokenBudgeter::for_model(llm.model());

        Ok(Self {
            source,
            llm,
            budgeter,
            scorer,
            config,
        })
    }

    pub fn with_budgeter(mut self, budgeter: TokenBudgeter) -> Self {
        self.budgeter = budgeter;
        self
    }

    pub async fn analyze(&self, repository: &str) -> Result<ComplexityReport> {
        self.analyze_with_cancel(repository, CancellationToken::new())
            .await
    }

    /// Like [`analyze`](Self::analyze), but stops with `Error::Cancelled` as
    /// soon as `cancel` fires or the configured run timeout elapses.
    pub async fn analyze_with_cancel(
        &self,
        repository: &str,
        cancel: CancellationToken,
    ) -> Result<ComplexityReport> {
        let deadline = async {
            match self.config.run_timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("Analysis of {} cancelled", repository);
                Err(Error::Cancelled)
            }
            _ = deadline => {
                tracing::warn!("Analysis of {} timed out", repository);
                Err(Error::Cancelled)
            }
            result = self.run(repository) => result,
        }
    }

    async fn run(&self, repository: &str) -> Result<ComplexityReport> {
        // Step 1: Fetch matching source files
        let filter = self.config.file_filter()?;
        tracing::info!("Fetching source files from {}", repository);
        let listing = self
            .source
            .fetch_files(repository, &filter, self.config.max_files)
            .await?;
        tracing::info!(
            "Fetched {} files ({} matched, {} unreadable)",
            listing.files.len(),
            listing.total_candidates,
            listing.skipped.len()
        );

        let total_files = listing.files.len() + listing.skipped.len();
        let mut skipped = listing.skipped;

        // Step 2: Split files into budget-sized chunks
        let model = self.llm.model().to_string();
        let budget = self.config.resolve_context_budget(&model);
        let mut work: Vec<(FileUnit, Vec<Chunk>)> = Vec::with_capacity(listing.files.len());
        for file in listing.files {
            match self.budgeter.split(&file, budget, self.reserve_for(&file, budget)) {
                Ok(chunks) => work.push((file, chunks)),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", file.path, e);
                    skipped.push(SkippedFile::from_error(&file.path, &e));
                }
            }
        }
        let chunk_count: usize = work.iter().map(|(_, chunks)| chunks.len()).sum();
        tracing::info!("Created {} chunks from {} files", chunk_count, work.len());

        // Step 3: Score every chunk
        let governor = Governor::new(self.config.token_bucket(), self.config.retry_policy());
        let context = RunContext::new(governor);
        let results = self.score_chunks(&work, &context).await;

        // Step 4: Group by file; any failed chunk skips its whole file
        let mut files: BTreeMap<String, Vec<ChunkScores>> = BTreeMap::new();
        let mut failed: BTreeMap<String, Error> = BTreeMap::new();
        for (path, result) in results {
            match result {
                Ok(scores) => files.entry(path).or_default().push(scores),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    failed.entry(path).or_insert(e);
                }
            }
        }
        for (path, e) in failed {
            tracing::warn!("Skipping {}: {}", path, e);
            files.remove(&path);
            skipped.push(SkippedFile::from_error(path, &e));
        }

        // Step 5: Aggregate
        let mut report = self.scorer.aggregate(&files, skipped);
        report.repository = listing.repository;
        report.metadata = ReportMetadata {
            provider: self.llm.name().to_string(),
            model: model.clone(),
            total_files,
            analyzed_count: report.analyzed_files.len(),
            skipped_count: report.skipped.len(),
            chunk_count,
            exclude_patterns: self.config.exclude_patterns.clone(),
            usage: context.usage.summary(&model),
        };

        tracing::info!(
            "Analyzed {} files of {} (score {:.1}, {} skipped)",
            report.metadata.analyzed_count,
            report.repository,
            report.score,
            report.metadata.skipped_count
        );

        Ok(report)
    }

    /// Tokens kept out of each chunk of `file`. At least the configured
    /// reserve, and enough that the full request (system prompt, schema,
    /// scaffolding and response allowance) stays inside the provider's window.
    fn reserve_for(&self, file: &FileUnit, budget: usize) -> usize {
        let overhead = request_overhead(
            &file.path,
            file.language_hint.as_deref(),
            &self.config.dimensions,
            self.budgeter.estimator(),
        );
        let chunk_cap = self.llm.max_context_tokens().saturating_sub(overhead);
        let reserve = self
            .config
            .reserved_for_response
            .max(budget.saturating_sub(chunk_cap));

        if reserve > self.config.reserved_for_response {
            tracing::debug!(
                "Chunks of {} capped at {} tokens by the {}-token provider window",
                file.path,
                budget.saturating_sub(reserve),
                self.llm.max_context_tokens()
            );
        }
        reserve
    }

    async fn score_chunks(
        &self,
        work: &[(FileUnit, Vec<Chunk>)],
        context: &RunContext,
    ) -> Vec<(String, Result<ChunkScores>)> {
        let total: usize = work.iter().map(|(_, chunks)| chunks.len()).sum();
        let semaphore = Semaphore::new(self.config.concurrency_limit);
        let pb = self.progress_bar(total as u64);

        let futures = work
            .iter()
            .flat_map(|(file, chunks)| chunks.iter().map(move |chunk| (file, chunk, chunks.len())))
            .map(|(file, chunk, total_chunks)| {
                let semaphore = &semaphore;
                let pb = pb.clone();
                async move {
                    let result = match semaphore.acquire().await {
                        Ok(_permit) => {
                            let request =
                                AnalysisRequest::new(chunk.clone(), self.config.dimensions.clone())
                                    .with_language(file.language_hint.clone())
                                    .with_total_chunks(total_chunks);
                            self.score_chunk(&request, context).await
                        }
                        Err(_) => Err(Error::Cancelled),
                    };
                    pb.inc(1);
                    (file.path.clone(), result)
                }
            });

        let results = join_all(futures).await;
        pb.finish_and_clear();
        results
    }

    async fn score_chunk(
        &self,
        request: &AnalysisRequest,
        context: &RunContext,
    ) -> Result<ChunkScores> {
        let schema = request.response_schema();
        let raw = self
            .governed_call(&request.to_prompt(), &schema, context)
            .await?;

        let reply = match parse_reply(&raw, &request.dimensions) {
            Ok(reply) => reply,
            Err(Error::MalformedResponse { reason, .. }) => {
                tracing::warn!(
                    "Malformed response for {} part {}: {}; asking again",
                    request.chunk.source_path,
                    request.chunk.sequence_index + 1,
                    reason
                );
                let raw = self
                    .governed_call(&request.to_reask_prompt(&reason), &schema, context)
                    .await?;
                parse_reply(&raw, &request.dimensions)?
            }
            Err(e) => return Err(e),
        };

        Ok(ChunkScores {
            sequence_index: request.chunk.sequence_index,
            estimated_tokens: request.chunk.estimated_tokens,
            line_count: request.chunk.text.lines().count(),
            scores: reply.scores,
            patterns: reply.patterns,
            function_count: reply.function_count,
            class_count: reply.class_count,
        })
    }

    async fn governed_call(
        &self,
        prompt: &str,
        schema: &Value,
        context: &RunContext,
    ) -> Result<RawResult> {
        let raw = context
            .governor
            .call(|| self.llm.complete(prompt, schema))
            .await?;
        context.usage.record(raw.usage);
        Ok(raw)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
