//! Directory ingestion
//!
//! Reads every `*.txt` file in a knowledge directory. The title of a
//! document is its file stem.

use std::fs;
use std::path::Path;

use crate::corpus::KnowledgeDocument;
use crate::errors::{KbqaError, Result};

const KNOWLEDGE_EXTENSION: &str = "txt";

/// Load all `.txt` files from `dir`, sorted by file name.
///
/// Unreadable or empty files are skipped with a warning. A missing or
/// unreadable directory is an error.
pub fn load_directory(dir: &Path) -> Result<Vec<KnowledgeDocument>> {
    if !dir.is_dir() {
        return Err(KbqaError::CorpusLoad {
            path: dir.to_path_buf(),
            reason: "knowledge directory does not exist".to_string(),
        });
    }

    let entries = fs::read_dir(dir).map_err(|e| KbqaError::CorpusLoad {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(KNOWLEDGE_EXTENSION)
        })
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let (Some(stem), Some(filename)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.file_name().and_then(|s| s.to_str()),
        ) else {
            tracing::warn!(path = %path.display(), "skipping file with non UTF-8 name");
            continue;
        };

        match fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => {
                tracing::debug!(title = stem, "loaded knowledge document");
                documents.push(KnowledgeDocument::new(stem, filename, content));
            }
            Ok(_) => {
                tracing::warn!(path = %path.display(), "skipping empty knowledge file");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read knowledge file");
            }
        }
    }

    Ok(documents)
}
