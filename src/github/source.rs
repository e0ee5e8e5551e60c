use async_trait::async_trait;

use crate::error::Result;
use crate::github::filter::FileFilter;
use crate::models::{FileUnit, SkippedFile};

/// Files retrieved for one analysis run, in repository tree order.
#[derive(Debug, Clone, Default)]
pub struct SourceListing {
    pub repository: String,
    pub files: Vec<FileUnit>,
    /// Files that matched the filter but could not be retrieved.
    pub skipped: Vec<SkippedFile>,
    /// Matching files before the `max_files` cut.
    pub total_candidates: usize,
}

#[async_trait]
pub trait RepositorySource: Send + Sync {
    async fn fetch_files(
        &self,
        identifier: &str,
        filter: &FileFilter,
        max_files: usize,
    ) -> Result<SourceListing>;
}
