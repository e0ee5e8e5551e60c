pub mod aggregator;
pub mod context;
pub mod pipeline;

pub use aggregator::{aggregate, ComplexityScorer};
pub use context::{RunContext, UsageTracker};
pub use pipeline::AnalysisPipeline;
