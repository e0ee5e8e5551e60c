pub mod budgeter;
pub mod estimator;

pub use budgeter::TokenBudgeter;
pub use estimator::TokenEstimator;

/// Minimum tokens kept out of each chunk. The pipeline raises it per file
/// when the request scaffolding and response allowance need more room in
/// the provider's window.
pub const DEFAULT_RESERVED_FOR_RESPONSE: usize = 1_500;
