//! Cross-document selection and answer formatting

use regex::Regex;
use std::sync::LazyLock;

use crate::corpus::{Corpus, KnowledgeDocument};
use crate::query::{contains_special_keyword, QueryProfile, LIST_SEPARATOR};

use super::{MatchStrategy, QueryOutcome, RankedAnswer, ScoredCandidate};

static METADATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"发布日期[:：]\s*\d{4}-\d{2}-\d{2}|点击量[:：]\s*\d+").expect("metadata regex is valid")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// Remove publish-date / view-count noise and collapse whitespace
pub fn simplify_text(text: &str) -> String {
    let stripped = METADATA_RE.replace_all(text, "");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Cascade output of one document, paired with the document
#[derive(Debug, Clone)]
pub struct DocumentHits<'a> {
    pub document: &'a KnowledgeDocument,
    /// Highest score first
    pub candidates: Vec<ScoredCandidate>,
}

impl DocumentHits<'_> {
    pub fn best_score(&self) -> Option<f64> {
        self.candidates.first().map(|c| c.score)
    }
}

/// Picks the winning document and merges its candidates
#[derive(Debug, Clone)]
pub struct Selector {
    special_merge_count: usize,
    keyword_scan_lines: usize,
}

impl Selector {
    pub fn new(special_merge_count: usize, keyword_scan_lines: usize) -> Self {
        Self {
            special_merge_count,
            keyword_scan_lines,
        }
    }

    /// Documents are expected in title order; a tie on the best score goes
    /// to the earlier one.
    pub fn select(&self, hits: &[DocumentHits<'_>], profile: &QueryProfile) -> Option<RankedAnswer> {
        let mut ranked: Vec<&DocumentHits<'_>> =
            hits.iter().filter(|h| !h.candidates.is_empty()).collect();
        ranked.sort_by(|a, b| {
            let (a, b) = (a.best_score().unwrap_or(0.0), b.best_score().unwrap_or(0.0));
            b.total_cmp(&a)
        });

        ranked.into_iter().find_map(|doc_hits| {
            let best = doc_hits.candidates.first()?;
            let text = simplify_text(&self.merge(&doc_hits.candidates, profile.has_special_topic));
            (!text.is_empty()).then(|| RankedAnswer {
                text,
                source_filename: doc_hits.document.filename.clone(),
                source_title: doc_hits.document.title.clone(),
                score: best.score,
                strategy: best.strategy,
            })
        })
    }

    /// Special-topic queries take the top few candidates in score order.
    /// Otherwise enumerated lists come first, followed by the best
    /// non-list candidate.
    pub fn merge(&self, candidates: &[ScoredCandidate], special: bool) -> String {
        let parts: Vec<&str> = if special {
            candidates
                .iter()
                .take(self.special_merge_count)
                .map(|c| c.text.as_str())
                .collect()
        } else {
            let (lists, others): (Vec<&ScoredCandidate>, Vec<&ScoredCandidate>) = candidates
                .iter()
                .partition(|c| c.text.contains(LIST_SEPARATOR));
            lists
                .into_iter()
                .chain(others.into_iter().take(1))
                .map(|c| c.text.as_str())
                .collect()
        };
        parts.join(" ")
    }

    /// Last resort: raw lines mentioning a special keyword, from the first
    /// document that has any
    pub fn keyword_scan(&self, corpus: &Corpus) -> Option<RankedAnswer> {
        corpus.documents().find_map(|doc| {
            let lines: Vec<&str> = doc
                .raw_text
                .lines()
                .map(str::trim)
                .filter(|line| contains_special_keyword(&line.to_lowercase()))
                .take(self.keyword_scan_lines)
                .collect();
            if lines.is_empty() {
                return None;
            }

            let text = simplify_text(&lines.join(" "));
            (!text.is_empty()).then(|| RankedAnswer {
                text,
                source_filename: doc.filename.clone(),
                source_title: doc.title.clone(),
                score: 0.0,
                strategy: MatchStrategy::KeywordScan,
            })
        })
    }

    /// Full selection including the keyword last resort
    pub fn finalize(
        &self,
        hits: &[DocumentHits<'_>],
        corpus: &Corpus,
        profile: &QueryProfile,
    ) -> QueryOutcome {
        if let Some(answer) = self.select(hits, profile) {
            return QueryOutcome::Found(answer);
        }
        if profile.mentions_special_keyword() {
            if let Some(answer) = self.keyword_scan(corpus) {
                return QueryOutcome::Found(answer);
            }
        }
        QueryOutcome::NotFound
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(3, 5)
    }
}
