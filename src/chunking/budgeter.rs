use crate::chunking::estimator::TokenEstimator;
use crate::error::{Error, Result};
use crate::models::{Chunk, FileUnit};

/// Splits files into chunks that fit a model's context budget.
#[derive(Debug, Clone)]
pub struct TokenBudgeter {
    estimator: TokenEstimator,
}

impl TokenBudgeter {
    pub fn new(estimator: TokenEstimator) -> Self {
        Self { estimator }
    }

    pub fn for_model(model: &str) -> Self {
        Self::new(TokenEstimator::for_model(model))
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    pub fn split(
        &self,
        file: &FileUnit,
        model_context_budget: usize,
        reserved_for_response: usize,
    ) -> Result<Vec<Chunk>> {
        let budget = model_context_budget.saturating_sub(reserved_for_response);
        if budget == 0 {
            return Err(Error::Config(format!(
                "reserved_for_response ({}) leaves no room in a context budget of {}",
                reserved_for_response, model_context_budget
            )));
        }

        let total_tokens = self.estimator.estimate(&file.content);
        if total_tokens <= budget {
            return Ok(vec![Chunk {
                source_path: file.path.clone(),
                sequence_index: 0,
                text: file.content.clone(),
                estimated_tokens: total_tokens,
            }]);
        }

        let mut chunks = Vec::new();
        let mut current = String::new();

        // Greedy packing is optimal here because the estimate is monotone in length.
        for (line_index, line) in file.content.split_inclusive('\n').enumerate() {
            let line_tokens = self.estimator.estimate(line);
            if line_tokens > budget {
                return Err(Error::OversizedUnit {
                    path: file.path.clone(),
                    line: line_index + 1,
                    tokens: line_tokens,
                    budget,
                });
            }

            if !current.is_empty()
                && self.estimator.estimate_bytes(current.len() + line.len()) > budget
            {
                self.push_chunk(&mut chunks, &file.path, std::mem::take(&mut current));
            }
            current.push_str(line);
        }

        if !current.is_empty() {
            self.push_chunk(&mut chunks, &file.path, current);
        }

        tracing::debug!(
            "Split {} (~{} tokens) into {} chunks of <= {} tokens",
            file.path,
            total_tokens,
            chunks.len(),
            budget
        );

        Ok(chunks)
    }

    fn push_chunk(&self, chunks: &mut Vec<Chunk>, path: &str, text: String) {
        chunks.push(Chunk {
            source_path: path.to_string(),
            sequence_index: chunks.len(),
            estimated_tokens: self.estimator.estimate(&text),
            text,
        });
    }
}

impl Default for TokenBudgeter {
    fn default() -> Self {
        Self::new(TokenEstimator::default())
    }
}
