//! Relevance scoring
//!
//! Every structural unit gets a non-negative score from additive lexical
//! signals. The constants are tunable, but their relative strength is not:
//!
//! `exact_match > coverage_high > coverage_mid > coverage_low > heading bonus > list_bonus`
//!
//! [`ScoringWeights::check_ordering`] enforces this for any loaded config.

use serde::{Deserialize, Serialize};

use crate::errors::{KbqaError, Result};
use crate::parser::headings::MAX_HEADING_LEVEL;
use crate::parser::{heading_body, LineUnit, QaPairUnit};
use crate::query::{contains_special_keyword, QueryProfile, LIST_SEPARATOR};

/// Signal weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Query inside the text, or text inside the query
    pub exact_match: f64,
    /// Per shared token
    pub token_overlap: f64,
    /// Coverage ratio >= 0.8
    pub coverage_high: f64,
    /// Coverage ratio >= 0.6
    pub coverage_mid: f64,
    /// Coverage ratio >= 0.5
    pub coverage_low: f64,
    /// Heading bonus at level 0; shrinks by `heading_level_step` per level
    pub heading_base: f64,
    pub heading_level_step: f64,
    /// Query found verbatim inside a heading
    pub heading_exact: f64,
    pub special_topic: f64,
    /// Enumerated list line sharing a token with the query
    pub list_bonus: f64,
    /// Applied once every query token matched
    pub full_coverage_multiplier: f64,
    /// Per interrogative word shared by query and question
    pub qa_concept_bonus: f64,
    /// Heading fallback: base score for a heading that mentions the query
    pub heading_fallback_base: f64,
    pub heading_fallback_step: f64,
    /// Heading fallback: per query bigram found in the heading
    pub fragment_hit: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            exact_match: 30.0,
            token_overlap: 4.0,
            coverage_high: 14.0,
            coverage_mid: 10.0,
            coverage_low: 8.0,
            heading_base: 7.0,
            heading_level_step: 0.5,
            heading_exact: 10.0,
            special_topic: 10.0,
            list_bonus: 3.0,
            full_coverage_multiplier: 1.5,
            qa_concept_bonus: 4.0,
            heading_fallback_base: 20.0,
            heading_fallback_step: 2.0,
            fragment_hit: 1.0,
        }
    }
}

impl ScoringWeights {
    /// Heading bonus for a heading of `level`
    pub fn heading_bonus(&self, level: u8) -> f64 {
        (self.heading_base - f64::from(level) * self.heading_level_step).max(0.0)
    }

    /// Verify the relative strength of the signals
    pub fn check_ordering(&self) -> Result<()> {
        let all = [
            self.exact_match,
            self.token_overlap,
            self.coverage_high,
            self.coverage_mid,
            self.coverage_low,
            self.heading_base,
            self.heading_level_step,
            self.heading_exact,
            self.special_topic,
            self.list_bonus,
            self.qa_concept_bonus,
            self.heading_fallback_base,
            self.heading_fallback_step,
            self.fragment_hit,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(KbqaError::Config(
                "scoring weights must be finite and non-negative".to_string(),
            ));
        }

        let chain = [
            ("exact_match", self.exact_match),
            ("coverage_high", self.coverage_high),
            ("coverage_mid", self.coverage_mid),
            ("coverage_low", self.coverage_low),
            ("heading_base", self.heading_base),
            ("list_bonus", self.list_bonus),
        ];
        for pair in chain.windows(2) {
            let (stronger, weaker) = (pair[0], pair[1]);
            if stronger.1 <= weaker.1 {
                return Err(KbqaError::Config(format!(
                    "{} ({}) must be greater than {} ({})",
                    stronger.0, stronger.1, weaker.0, weaker.1
                )));
            }
        }

        if self.heading_bonus(MAX_HEADING_LEVEL) <= self.list_bonus {
            return Err(KbqaError::Config(
                "heading bonus at the deepest level must stay above list_bonus".to_string(),
            ));
        }

        if self.full_coverage_multiplier <= 1.0 {
            return Err(KbqaError::Config(
                "full_coverage_multiplier must be greater than 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Acceptance bars. The `*_special` variants apply to special-topic queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// A line at or above this joins / opens a passage
    pub line_accept: f64,
    pub line_accept_special: f64,
    /// A passage closed by an irrelevant line survives only above this
    pub passage_emit: f64,
    pub passage_emit_special: f64,
    pub qa_accept: f64,
    pub heading_fallback: f64,
    pub sentence_accept: f64,
    pub sentence_accept_special: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            line_accept: 9.0,
            line_accept_special: 8.0,
            passage_emit: 13.0,
            passage_emit_special: 11.0,
            qa_accept: 12.0,
            heading_fallback: 15.0,
            sentence_accept: 11.0,
            sentence_accept_special: 9.0,
        }
    }
}

impl Thresholds {
    pub fn line_accept(&self, special: bool) -> f64 {
        if special {
            self.line_accept_special
        } else {
            self.line_accept
        }
    }

    pub fn passage_emit(&self, special: bool) -> f64 {
        if special {
            self.passage_emit_special
        } else {
            self.passage_emit
        }
    }

    pub fn sentence_accept(&self, special: bool) -> f64 {
        if special {
            self.sentence_accept_special
        } else {
            self.sentence_accept
        }
    }

    pub fn validate(&self) -> Result<()> {
        let all = [
            self.line_accept,
            self.line_accept_special,
            self.passage_emit,
            self.passage_emit_special,
            self.qa_accept,
            self.heading_fallback,
            self.sentence_accept,
            self.sentence_accept_special,
        ];
        if all.iter().any(|t| !t.is_finite() || *t <= 0.0) {
            return Err(KbqaError::Config(
                "thresholds must be positive".to_string(),
            ));
        }
        if self.passage_emit < self.line_accept
            || self.passage_emit_special < self.line_accept_special
        {
            return Err(KbqaError::Config(
                "passage_emit must not be below line_accept".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pure scoring functions over `(unit, profile)`
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    weights: ScoringWeights,
    min_fragment_hits: usize,
}

impl RelevanceScorer {
    pub fn new(weights: ScoringWeights, min_fragment_hits: usize) -> Self {
        Self {
            weights,
            min_fragment_hits,
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Token overlap plus tiered coverage bonus
    pub fn lexical(&self, overlap: usize, query_tokens: usize) -> f64 {
        if query_tokens == 0 {
            return 0.0;
        }
        let w = &self.weights;
        let ratio = overlap as f64 / query_tokens as f64;
        let tier = if ratio >= 0.8 {
            w.coverage_high
        } else if ratio >= 0.6 {
            w.coverage_mid
        } else if ratio >= 0.5 {
            w.coverage_low
        } else {
            0.0
        };
        overlap as f64 * w.token_overlap + tier
    }

    /// Query inside text, or a non-trivial text inside the query
    pub fn is_exact(&self, text_lower: &str, profile: &QueryProfile) -> bool {
        let query = profile.normalized_query.as_str();
        if query.is_empty() || text_lower.is_empty() {
            return false;
        }
        text_lower.contains(query) || (text_lower.chars().count() > 1 && query.contains(text_lower))
    }

    /// Whether a heading talks about the query: a token occurs in it, or it
    /// shares enough CJK bigrams with the query
    pub fn heading_mentions(&self, heading_lower: &str, profile: &QueryProfile) -> bool {
        profile.any_token_in(heading_lower)
            || (self.min_fragment_hits > 0
                && profile.fragment_hits(heading_body(heading_lower)) >= self.min_fragment_hits)
    }

    fn finish(&self, score: f64, overlap: usize, profile: &QueryProfile) -> f64 {
        if !profile.tokens.is_empty() && overlap == profile.tokens.len() {
            score * self.weights.full_coverage_multiplier
        } else {
            score
        }
    }

    fn shared_signals(&self, lower: &str, profile: &QueryProfile) -> f64 {
        let w = &self.weights;
        let mut score = 0.0;
        if profile.has_special_topic && contains_special_keyword(lower) {
            score += w.special_topic;
        }
        if lower.contains(LIST_SEPARATOR) && profile.any_token_in(lower) {
            score += w.list_bonus;
        }
        score
    }

    /// Score one free-text line
    pub fn score_line(&self, line: &LineUnit, profile: &QueryProfile) -> f64 {
        if line.is_blank() || profile.is_empty() {
            return 0.0;
        }
        let w = &self.weights;
        let lower = line.text.to_lowercase();
        let mut score = 0.0;

        if self.is_exact(&lower, profile) {
            score += w.exact_match;
        }

        let overlap = profile.overlap(&lower);
        score += self.lexical(overlap, profile.tokens.len());

        if let Some(level) = line.heading_level {
            if self.heading_mentions(&lower, profile) {
                score += w.heading_bonus(level);
            }
            if lower.contains(profile.normalized_query.as_str()) {
                score += w.heading_exact;
            }
        }

        score += self.shared_signals(&lower, profile);
        self.finish(score, overlap, profile)
    }

    /// Score a QA pair by its question text; the answer only counts for
    /// exact containment
    pub fn score_question(&self, qa: &QaPairUnit, profile: &QueryProfile) -> f64 {
        if profile.is_empty() {
            return 0.0;
        }
        let w = &self.weights;
        let lower = qa.question_text.to_lowercase();
        let mut score = 0.0;

        let answer_hit = qa.answer_text.as_ref().is_some_and(|a| {
            a.to_lowercase()
                .contains(profile.normalized_query.as_str())
        });
        // the full line keeps the number and the question mark
        let line_hit = self.is_exact(&qa.question_line.to_lowercase(), profile);
        if self.is_exact(&lower, profile) || line_hit || answer_hit {
            score += w.exact_match;
        }

        let overlap = profile.overlap(&lower);
        score += self.lexical(overlap, profile.tokens.len());
        score += profile.shared_concepts(&lower) as f64 * w.qa_concept_bonus;
        score += self.shared_signals(&lower, profile);
        self.finish(score, overlap, profile)
    }

    /// Score a heading on its own for the heading-level fallback
    pub fn score_heading_fallback(&self, heading: &LineUnit, profile: &QueryProfile) -> f64 {
        if profile.is_empty() {
            return 0.0;
        }
        let w = &self.weights;
        let lower = heading.text.to_lowercase();
        let level = heading.heading_level.unwrap_or(0);
        let mut score = 0.0;

        if self.heading_mentions(&lower, profile) {
            score += (w.heading_fallback_base - f64::from(level) * w.heading_fallback_step).max(0.0);
        }
        if lower.contains(profile.normalized_query.as_str()) {
            score += w.exact_match;
        }
        score += profile.fragment_hits(heading_body(&lower)) as f64 * w.fragment_hit;
        score
    }

    /// Score a free-standing sentence for the sentence-level fallback
    pub fn score_sentence(&self, sentence: &str, profile: &QueryProfile) -> f64 {
        if profile.is_empty() {
            return 0.0;
        }
        let w = &self.weights;
        let lower = sentence.to_lowercase();
        let mut score = profile.overlap(&lower) as f64 * w.token_overlap;
        if lower.contains(profile.normalized_query.as_str()) {
            score += w.exact_match;
        }
        score + self.shared_signals(&lower, profile)
    }
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new(ScoringWeights::default(), 2)
    }
}
