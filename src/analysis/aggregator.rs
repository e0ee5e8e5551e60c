use chrono::Utc;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::{
    ChunkScores, ComplexityReport, ComplexityWeights, Dimension, DimensionScore, FileComplexity,
    NormalizedWeights, ReportMetadata, SkippedFile,
};

/// Combines chunk scores into per-file and repository scores.
#[derive(Debug, Clone)]
pub struct ComplexityScorer {
    weights: NormalizedWeights,
}

impl ComplexityScorer {
    pub fn new(weights: &ComplexityWeights) -> Result<Self> {
        Ok(Self {
            weights: weights.normalize()?,
        })
    }

    pub fn weights(&self) -> &NormalizedWeights {
        &self.weights
    }

    /// `files` maps a path to the scores of all its chunks, in any order.
    /// `repository` and `metadata` are left for the caller to fill in.
    pub fn aggregate(
        &self,
        files: &BTreeMap<String, Vec<ChunkScores>>,
        mut skipped: Vec<SkippedFile>,
    ) -> ComplexityReport {
        let mut analyzed_files = Vec::with_capacity(files.len());

        for (path, chunks) in files {
            match self.score_file(path, chunks) {
                Some(file) => analyzed_files.push(file),
                None => {
                    tracing::warn!("No usable chunk scores for {}", path);
                    skipped.push(SkippedFile {
                        path: path.clone(),
                        category: crate::error::ErrorCategory::Internal,
                        reason: "no chunk scores".to_string(),
                    });
                }
            }
        }

        let score = if analyzed_files.is_empty() {
            0.0
        } else {
            analyzed_files.iter().map(|f| f.aggregate).sum::<f64>() / analyzed_files.len() as f64
        };

        // Files are in path order, so a strict comparison keeps the smallest
        // path on ties.
        let mut top: Option<&FileComplexity> = None;
        for file in &analyzed_files {
            if top.map_or(true, |best| file.aggregate > best.aggregate) {
                top = Some(file);
            }
        }
        let top_file = top.map(|f| f.path.clone());

        skipped.sort_by(|a, b| a.path.cmp(&b.path));

        ComplexityReport {
            repository: String::new(),
            analyzed_files,
            score,
            top_file,
            skipped,
            metadata: ReportMetadata::default(),
            generated_at: Utc::now(),
        }
    }

    fn score_file(&self, path: &str, chunks: &[ChunkScores]) -> Option<FileComplexity> {
        let mut ordered: Vec<&ChunkScores> = chunks.iter().collect();
        ordered.sort_by_key(|c| c.sequence_index);

        let scores: Vec<DimensionScore> = Dimension::ALL
            .iter()
            .filter_map(|&dimension| combine_dimension(dimension, &ordered))
            .collect();

        if scores.is_empty() {
            return None;
        }

        Some(FileComplexity {
            path: path.to_string(),
            aggregate: self.weighted_aggregate(&scores),
            scores,
            chunk_count: ordered.len(),
            line_count: ordered.iter().map(|c| c.line_count).sum(),
            function_count: sum_reported(ordered.iter().map(|c| c.function_count)),
            class_count: sum_reported(ordered.iter().map(|c| c.class_count)),
            patterns: merge_patterns(&ordered),
        })
    }

    fn weighted_aggregate(&self, scores: &[DimensionScore]) -> f64 {
        if scores.len() == Dimension::ALL.len() {
            return scores
                .iter()
                .map(|s| s.value * self.weights.get(s.dimension))
                .sum();
        }

        // Renormalize over the dimensions that are present.
        let present_weight: f64 = scores.iter().map(|s| self.weights.get(s.dimension)).sum();
        if present_weight <= 0.0 {
            return scores.iter().map(|s| s.value).sum::<f64>() / scores.len() as f64;
        }
        scores
            .iter()
            .map(|s| s.value * self.weights.get(s.dimension) / present_weight)
            .sum()
    }
}

/// Token-weighted mean of one dimension across chunks already in sequence
/// order. `None` when no chunk scored the dimension.
fn combine_dimension(dimension: Dimension, chunks: &[&ChunkScores]) -> Option<DimensionScore> {
    let entries: Vec<(&ChunkScores, &DimensionScore)> = chunks
        .iter()
        .filter_map(|c| {
            c.scores
                .iter()
                .find(|s| s.dimension == dimension)
                .map(|s| (*c, s))
        })
        .collect();

    if entries.is_empty() {
        return None;
    }

    let total_tokens: usize = entries.iter().map(|(c, _)| c.estimated_tokens).sum();
    let value = if total_tokens == 0 {
        entries.iter().map(|(_, s)| s.value).sum::<f64>() / entries.len() as f64
    } else {
        entries
            .iter()
            .map(|(c, s)| s.value * c.estimated_tokens as f64)
            .sum::<f64>()
            / total_tokens as f64
    };

    let rationale = if entries.len() == 1 {
        entries[0].1.rationale.clone()
    } else {
        entries
            .iter()
            .map(|(c, s)| format!("[part {}] {}", c.sequence_index + 1, s.rationale))
            .collect::<Vec<_>>()
            .join(" ")
    };

    Some(DimensionScore {
        dimension,
        value,
        rationale,
    })
}

fn sum_reported(counts: impl Iterator<Item = Option<usize>>) -> Option<usize> {
    counts.flatten().reduce(|a, b| a.saturating_add(b))
}

/// Union of the chunks' patterns, case-insensitively, keeping the first
/// spelling seen in sequence order.
fn merge_patterns(chunks: &[&ChunkScores]) -> Vec<String> {
    let mut merged: BTreeMap<String, String> = BTreeMap::new();
    for pattern in chunks.iter().flat_map(|c| c.patterns.iter()) {
        merged
            .entry(pattern.to_lowercase())
            .or_insert_with(|| pattern.clone());
    }
    let mut patterns: Vec<String> = merged.into_values().collect();
    patterns.sort();
    patterns
}

/// One-shot aggregation with fresh weights.
pub fn aggregate(
    files: &BTreeMap<String, Vec<ChunkScores>>,
    weights: &ComplexityWeights,
) -> Result<ComplexityReport> {
    Ok(ComplexityScorer::new(weights)?.aggregate(files, Vec::new()))
}
