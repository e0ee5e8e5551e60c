use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{Error, ErrorCategory, Result};

/// One of the complexity axes scored per chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Cyclomatic,
    Architectural,
    Algorithmic,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [
        Dimension::Cyclomatic,
        Dimension::Architectural,
        Dimension::Algorithmic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Cyclomatic => "cyclomatic",
            Dimension::Architectural => "architectural",
            Dimension::Algorithmic => "algorithmic",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cyclomatic" => Ok(Dimension::Cyclomatic),
            "architectural" => Ok(Dimension::Architectural),
            "algorithmic" => Ok(Dimension::Algorithmic),
            other => Err(Error::Config(format!("Unknown complexity dimension: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    /// Always within `0.0..=100.0`.
    pub value: f64,
    pub rationale: String,
}

/// Scores returned for a single chunk, tagged with what the aggregator needs
/// to reassemble and weight them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkScores {
    pub sequence_index: usize,
    pub estimated_tokens: usize,
    pub line_count: usize,
    pub scores: Vec<DimensionScore>,
    pub patterns: Vec<String>,
    pub function_count: Option<usize>,
    pub class_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileComplexity {
    pub path: String,
    /// One entry per dimension, ordered by dimension.
    pub scores: Vec<DimensionScore>,
    pub aggregate: f64,
    pub chunk_count: usize,
    #[serde(default)]
    pub line_count: usize,
    /// Sum over the chunks that reported a count; `None` when none did.
    #[serde(default)]
    pub function_count: Option<usize>,
    #[serde(default)]
    pub class_count: Option<usize>,
    /// Design patterns seen in any chunk, sorted.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl FileComplexity {
    pub fn score(&self, dimension: Dimension) -> Option<f64> {
        self.scores
            .iter()
            .find(|s| s.dimension == dimension)
            .map(|s| s.value)
    }
}

/// Relative importance of each dimension. Values need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexityWeights {
    pub cyclomatic: f64,
    pub architectural: f64,
    pub algorithmic: f64,
}

impl Default for ComplexityWeights {
    fn default() -> Self {
        Self {
            cyclomatic: 0.3,
            architectural: 0.4,
            algorithmic: 0.3,
        }
    }
}

impl ComplexityWeights {
    pub fn new(cyclomatic: f64, architectural: f64, algorithmic: f64) -> Self {
        Self {
            cyclomatic,
            architectural,
            algorithmic,
        }
    }

    /// Builds weights from `(dimension, weight)` pairs in any order.
    /// Dimensions not mentioned get weight 0; a repeated dimension keeps the
    /// last value.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Dimension, f64)>) -> Self {
        let mut weights = Self::new(0.0, 0.0, 0.0);
        for (dimension, weight) in pairs {
            match dimension {
                Dimension::Cyclomatic => weights.cyclomatic = weight,
                Dimension::Architectural => weights.architectural = weight,
                Dimension::Algorithmic => weights.algorithmic = weight,
            }
        }
        weights
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Cyclomatic => self.cyclomatic,
            Dimension::Architectural => self.architectural,
            Dimension::Algorithmic => self.algorithmic,
        }
    }

    /// Scales the weights to sum to 1. The sum is always taken in
    /// `Dimension::ALL` order so the result is bit-for-bit reproducible.
    pub fn normalize(&self) -> Result<NormalizedWeights> {
        for dimension in Dimension::ALL {
            let weight = self.get(dimension);
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidWeights(format!(
                    "{} weight must be a non-negative number, got {}",
                    dimension, weight
                )));
            }
        }

        let total: f64 = Dimension::ALL.iter().map(|d| self.get(*d)).sum();
        if total <= 0.0 {
            return Err(Error::InvalidWeights(
                "at least one dimension weight must be positive".to_string(),
            ));
        }

        Ok(NormalizedWeights {
            cyclomatic: self.cyclomatic / total,
            architectural: self.architectural / total,
            algorithmic: self.algorithmic / total,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedWeights {
    cyclomatic: f64,
    architectural: f64,
    algorithmic: f64,
}

impl NormalizedWeights {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Cyclomatic => self.cyclomatic,
            Dimension::Architectural => self.architectural,
            Dimension::Algorithmic => self.algorithmic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub category: ErrorCategory,
    pub reason: String,
}

impl SkippedFile {
    pub fn from_error(path: impl Into<String>, error: &Error) -> Self {
        Self {
            path: path.into(),
            category: error.category(),
            reason: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost_usd: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub provider: String,
    pub model: String,
    pub total_files: usize,
    pub analyzed_count: usize,
    pub skipped_count: usize,
    pub chunk_count: usize,
    pub exclude_patterns: Vec<String>,
    pub usage: UsageSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityReport {
    pub repository: String,
    /// Ordered by path.
    pub analyzed_files: Vec<FileComplexity>,
    pub score: f64,
    /// `None` only when no file could be analyzed.
    pub top_file: Option<String>,
    pub skipped: Vec<SkippedFile>,
    pub metadata: ReportMetadata,
    pub generated_at: DateTime<Utc>,
}

impl ComplexityReport {
    pub fn file(&self, path: &str) -> Option<&FileComplexity> {
        self.analyzed_files.iter().find(|f| f.path == path)
    }

    /// Files whose aggregate is at least `threshold`, most complex first.
    pub fn files_above(&self, threshold: f64) -> Vec<&FileComplexity> {
        let mut files: Vec<_> = self
            .analyzed_files
            .iter()
            .filter(|f| f.aggregate >= threshold)
            .collect();
        files.sort_by(|a, b| {
            b.aggregate
                .total_cmp(&a.aggregate)
                .then_with(|| a.path.cmp(&b.path))
        });
        files
    }

    pub fn has_warnings(&self) -> bool {
        !self.skipped.is_empty()
    }

    /// Number of files each design pattern was seen in, most common first,
    /// ties by name.
    pub fn pattern_distribution(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for file in &self.analyzed_files {
            for pattern in &file.patterns {
                *counts.entry(pattern.as_str()).or_default() += 1;
            }
        }

        let mut distribution: Vec<_> = counts
            .into_iter()
            .map(|(pattern, count)| (pattern.to_string(), count))
            .collect();
        distribution.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        distribution
    }
}
