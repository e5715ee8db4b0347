//! Corpus registry
//!
//! Holds the ingested knowledge documents keyed by title. The registry is
//! rebuilt as a whole: a new [`Corpus`] is staged off to the side and swapped
//! in under a write lock, so readers always see either the old or the new
//! snapshot, never a half-built one.

pub mod loader;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{KbqaError, Result};

pub use loader::load_directory;

/// One ingested source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    /// Display title (file stem)
    pub title: String,
    /// Original file name, e.g. `admissions.txt`
    pub filename: String,
    /// Full UTF-8 contents
    pub raw_text: String,
}

impl KnowledgeDocument {
    pub fn new(
        title: impl Into<String>,
        filename: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            filename: filename.into(),
            raw_text: raw_text.into(),
        }
    }

    /// Build a document whose filename is `<title>.txt`
    pub fn from_title(title: impl Into<String>, raw_text: impl Into<String>) -> Self {
        let title = title.into();
        let filename = format!("{}.txt", title);
        Self::new(title, filename, raw_text)
    }
}

/// Immutable snapshot of the knowledge base
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: BTreeMap<String, KnowledgeDocument>,
}

impl Corpus {
    /// Index documents by title. A repeated title replaces the earlier entry.
    pub fn from_documents(documents: Vec<KnowledgeDocument>) -> Self {
        let mut map = BTreeMap::new();
        for doc in documents {
            if let Some(previous) = map.insert(doc.title.clone(), doc) {
                tracing::warn!(
                    title = %previous.title,
                    filename = %previous.filename,
                    "duplicate document title, keeping the later file"
                );
            }
        }
        Self { documents: map }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, title: &str) -> Option<&KnowledgeDocument> {
        self.documents.get(title)
    }

    /// Documents in title order
    pub fn documents(&self) -> impl Iterator<Item = &KnowledgeDocument> {
        self.documents.values()
    }

    pub fn filenames(&self) -> Vec<&str> {
        self.documents.values().map(|d| d.filename.as_str()).collect()
    }
}

/// Result of a successful reinitialisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadStats {
    pub loaded_count: usize,
}

/// Process-wide holder of the current corpus snapshot
#[derive(Debug, Default)]
pub struct CorpusRegistry {
    current: RwLock<Option<Arc<Corpus>>>,
}

impl CorpusRegistry {
    /// Create an uninitialised registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole corpus.
    ///
    /// An empty input fails with [`KbqaError::EmptyCorpus`] and leaves the
    /// previously loaded corpus in place.
    pub fn reinitialize(&self, documents: Vec<KnowledgeDocument>) -> Result<ReloadStats> {
        if documents.is_empty() {
            return Err(KbqaError::EmptyCorpus);
        }

        let staged = Arc::new(Corpus::from_documents(documents));
        let loaded_count = staged.len();
        *self.current.write() = Some(staged);

        tracing::info!(loaded_count, "corpus reinitialized");
        Ok(ReloadStats { loaded_count })
    }

    /// Current snapshot, if any corpus was ever loaded
    pub fn snapshot(&self) -> Option<Arc<Corpus>> {
        self.current.read().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn document_count(&self) -> usize {
        self.current.read().as_ref().map_or(0, |c| c.len())
    }
}
