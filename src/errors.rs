//! Error types for kbqa
//!
//! A query that finds nothing is not an error (see `QueryOutcome::NotFound`);
//! the only hard failure of the retrieval core is an empty corpus.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the knowledge retrieval system
#[derive(Error, Debug)]
pub enum KbqaError {
    /// Reinitialisation was attempted with no documents
    #[error("Corpus is empty: no knowledge documents to index")]
    EmptyCorpus,

    /// Knowledge directory or file could not be ingested
    #[error("Failed to load corpus from {path:?}: {reason}")]
    CorpusLoad { path: PathBuf, reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Downstream generation step failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("kbqa error: {0}")]
    Generic(String),
}

/// Result type alias for kbqa operations
pub type Result<T> = std::result::Result<T, KbqaError>;

impl From<anyhow::Error> for KbqaError {
    fn from(err: anyhow::Error) -> Self {
        KbqaError::Generic(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_corpus_display() {
        let err = KbqaError::EmptyCorpus;
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_corpus_load_display() {
        let err = KbqaError::CorpusLoad {
            path: PathBuf::from("knowledge"),
            reason: "directory does not exist".to_string(),
        };
        assert!(err.to_string().contains("knowledge"));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_from_anyhow() {
        let err: KbqaError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, KbqaError::Generic(ref msg) if msg == "boom"));
    }
}
