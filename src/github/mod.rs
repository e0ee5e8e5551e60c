pub mod client;
pub mod filter;
pub mod identifier;
pub mod languages;
pub mod rate_limiter;
pub mod source;

pub use client::GitHubClient;
pub use filter::FileFilter;
pub use identifier::RepoRef;
pub use languages::{detect_language, is_code_file};
pub use rate_limiter::RateLimiter;
pub use source::{RepositorySource, SourceListing};
