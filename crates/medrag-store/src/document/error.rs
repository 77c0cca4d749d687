use std::path::PathBuf;

use crate::vector_store::VectorStoreError;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("failed to walk directory: {0}")]
    Walk(#[from] ignore::Error),

    #[error("PDF error in {path}: {message}")]
    Pdf { path: String, message: String },

    #[error("embedding failed: {0}")]
    Embedding(#[from] medrag_llm::LlmError),

    #[error("storage error: {0}")]
    Storage(#[from] VectorStoreError),
}
