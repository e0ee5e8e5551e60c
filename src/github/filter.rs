use glob::Pattern;

use crate::error::{Error, Result};
use crate::github::languages::is_code_file;

/// Selects which repository paths get analyzed.
///
/// A path passes when it is a recognized source file, matches at least one
/// include pattern (or there are none), and matches no exclude pattern.
/// `*` crosses directory separators, so `tests/*` also covers nested files.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl FileFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        if !is_code_file(path) {
            return false;
        }
        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(path)) {
            return false;
        }
        !self.exclude.iter().any(|p| p.matches(path))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p)
                .map_err(|e| Error::Config(format!("Invalid glob pattern '{}': {}", p, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_excludes() {
        let filter = FileFilter::new(&[], &patterns(&["tests/*", "*.md", "*.txt"])).unwrap();
        assert!(filter.matches("src/lib.rs"));
        assert!(!filter.matches("tests/integration.rs"));
        assert!(!filter.matches("tests/nested/deep.py"));
        assert!(!filter.matches("README.md"));
        assert!(!filter.matches("Cargo.lock"));
    }

    #[test]
    fn test_include_patterns_narrow_selection() {
        let filter = FileFilter::new(&patterns(&["src/*"]), &[]).unwrap();
        assert!(filter.matches("src/analysis/pipeline.rs"));
        assert!(!filter.matches("benches/bench.rs"));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        assert!(matches!(
            FileFilter::new(&[], &patterns(&["src/[unclosed"])),
            Err(Error::Config(_))
        ));
    }
}
