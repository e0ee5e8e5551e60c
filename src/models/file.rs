use serde::{Deserialize, Serialize};

/// A source file as fetched from the repository host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUnit {
    pub path: String,
    pub content: String,
    pub size_bytes: u64,
    pub language_hint: Option<String>,
}

impl FileUnit {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let content = content.into();
        Self {
            language_hint: crate::github::detect_language(&path),
            size_bytes: content.len() as u64,
            path,
            content,
        }
    }
}

/// A budget-fitting slice of one file, scored on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub source_path: String,
    pub sequence_index: usize,
    pub text: String,
    pub estimated_tokens: usize,
}
