//! Heuristic retrieval
//!
//! Per document: parse → score → assemble, falling back through looser
//! stages (paragraph → heading → sentence) until something is found. Across
//! documents: pick the document with the strongest passage and merge its
//! best candidates into one answer.

pub mod cascade;
pub mod engine;
pub mod selector;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

use crate::errors::{KbqaError, Result};
use crate::scoring::{ScoringWeights, Thresholds};

pub use cascade::{CascadeReport, DocumentCascade};
pub use engine::{KnowledgeEngine, Retriever};
pub use selector::{simplify_text, DocumentHits};

/// Which stage produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    QaPair,
    Paragraph,
    Heading,
    Sentence,
    KeywordScan,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchStrategy::QaPair => "qa_pair",
            MatchStrategy::Paragraph => "paragraph",
            MatchStrategy::Heading => "heading",
            MatchStrategy::Sentence => "sentence",
            MatchStrategy::KeywordScan => "keyword_scan",
        };
        f.write_str(name)
    }
}

/// One scored piece of text from one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub score: f64,
    pub text: String,
    pub source_document: String,
    pub strategy: MatchStrategy,
    /// Byte span of the matched source text
    pub span: Range<usize>,
}

/// Final answer for a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAnswer {
    pub text: String,
    pub source_filename: String,
    pub source_title: String,
    pub score: f64,
    pub strategy: MatchStrategy,
}

impl RankedAnswer {
    /// File name without the `.txt` extension
    pub fn source_label(&self) -> &str {
        self.source_filename
            .strip_suffix(".txt")
            .unwrap_or(&self.source_filename)
    }
}

impl fmt::Display for RankedAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [来源: {}]", self.text, self.source_label())
    }
}

/// Outcome of a query. `NotFound` is a normal result, not a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    Found(RankedAnswer),
    NotFound,
}

impl QueryOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, QueryOutcome::Found(_))
    }

    pub fn answer(&self) -> Option<&RankedAnswer> {
        match self {
            QueryOutcome::Found(answer) => Some(answer),
            QueryOutcome::NotFound => None,
        }
    }

    pub fn into_answer(self) -> Option<RankedAnswer> {
        match self {
            QueryOutcome::Found(answer) => Some(answer),
            QueryOutcome::NotFound => None,
        }
    }

    /// User-facing text: the cited answer, or the not-found message
    pub fn render(&self, query: &str) -> String {
        match self {
            QueryOutcome::Found(answer) => answer.to_string(),
            QueryOutcome::NotFound => not_found_message(query),
        }
    }
}

/// Message shown when nothing relevant was found
pub fn not_found_message(query: &str) -> String {
    format!("未找到与'{}'相关的信息，请尝试其他关键词。", query.trim())
}

/// Tunables of the retrieval core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub weights: ScoringWeights,
    pub thresholds: Thresholds,
    /// File name fragment marking enumerated question/answer lists
    pub answer_list_marker: String,
    /// Sliding window of headings prepended to a new passage
    pub recent_heading_capacity: usize,
    /// Lines absorbed under a heading by the heading fallback
    pub heading_body_lines: usize,
    /// Best candidates kept per document
    pub passages_per_document: usize,
    /// Candidates concatenated for special-topic queries
    pub special_merge_count: usize,
    /// Lines returned by the keyword last resort
    pub keyword_scan_lines: usize,
    /// Shared CJK bigrams for a heading to count as mentioning the query
    pub min_fragment_hits: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            thresholds: Thresholds::default(),
            answer_list_marker: "answers.txt".to_string(),
            recent_heading_capacity: 3,
            heading_body_lines: 7,
            passages_per_document: 5,
            special_merge_count: 3,
            keyword_scan_lines: 5,
            min_fragment_hits: 2,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        self.weights.check_ordering()?;
        self.thresholds.validate()?;

        for (name, value) in [
            ("passages_per_document", self.passages_per_document),
            ("special_merge_count", self.special_merge_count),
            ("keyword_scan_lines", self.keyword_scan_lines),
        ] {
            if value == 0 {
                return Err(KbqaError::Config(format!("{} must be greater than 0", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(filename: &str) -> RankedAnswer {
        RankedAnswer {
            text: "身份证、照片".to_string(),
            source_filename: filename.to_string(),
            source_title: "admissions".to_string(),
            score: 18.0,
            strategy: MatchStrategy::Heading,
        }
    }

    #[test]
    fn test_answer_display_cites_source() {
        assert_eq!(answer("admissions.txt").to_string(), "身份证、照片 [来源: admissions]");
        assert_eq!(answer("notes.md").source_label(), "notes.md");
    }

    #[test]
    fn test_outcome_accessors() {
        let found = QueryOutcome::Found(answer("a.txt"));
        assert!(found.is_found());
        assert_eq!(found.answer().map(|a| a.score), Some(18.0));
        assert!(QueryOutcome::NotFound.into_answer().is_none());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(QueryOutcome::NotFound).unwrap();
        assert_eq!(json["status"], "not_found");

        let json = serde_json::to_value(QueryOutcome::Found(answer("a.txt"))).unwrap();
        assert_eq!(json["status"], "found");
        assert_eq!(json["strategy"], "heading");
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(RetrievalConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = RetrievalConfig {
            passages_per_document: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_not_found_message() {
        assert!(not_found_message(" 宿舍 ").contains("'宿舍'"));
        assert_eq!(QueryOutcome::NotFound.render("宿舍"), not_found_message("宿舍"));
        assert!(QueryOutcome::Found(answer("a.txt")).render("q").ends_with("[来源: a]"));
    }
}
