//! Query profile builder
//!
//! Tokenisation is plain whitespace splitting. The knowledge base is mostly
//! Chinese, which is not whitespace-delimited, so a typical question yields
//! a single long token. Token overlap and coverage therefore mostly degrade
//! to exact containment; this is a known precision ceiling that the scoring
//! constants are tuned around.
//!
//! CJK character bigrams (`fragments`) are kept alongside the tokens. They are
//! consulted only when deciding whether a heading talks about the query.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "的", "了", "在", "是", "我", "有", "和", "就", "不", "人", "都", "一", "一个", "上",
        "也", "很", "到", "说", "要", "去", "你", "会", "着", "没有", "看", "好", "自己", "这",
    ]
    .into_iter()
    .collect()
});

/// High-value domain terms (graduation, degree and credit requirements)
pub const SPECIAL_KEYWORDS: [&str; 6] = ["毕业", "条件", "学位", "学分", "修业", "年限"];

/// Interrogative concept words shared by questions and queries
pub const CONCEPT_WORDS: [&str; 8] = ["建议", "如何", "什么", "为什么", "怎样", "是否", "多久", "哪里"];

/// CJK list separator (enumeration comma)
pub const LIST_SEPARATOR: char = '、';

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Whitespace tokens of `text`, lower-cased, longer than one character
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// Adjacent CJK character pairs of `text`
pub fn cjk_bigrams(text: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if is_cjk(c) {
            if let Some(p) = prev {
                out.insert([p, c].iter().collect());
            }
            prev = Some(c);
        } else {
            prev = None;
        }
    }
    out
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}')
}

/// Per-query matching profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryProfile {
    /// Query as received
    pub raw_query: String,
    /// Trimmed, lower-cased query used for containment checks
    pub normalized_query: String,
    /// Whitespace tokens, stopwords and single characters removed
    pub tokens: BTreeSet<String>,
    /// A token is one of [`SPECIAL_KEYWORDS`]
    pub has_special_topic: bool,
    /// CJK bigrams of the normalised query
    pub fragments: BTreeSet<String>,
}

impl QueryProfile {
    pub fn build(raw_query: &str) -> Self {
        let normalized_query = raw_query.trim().to_lowercase();
        let tokens: BTreeSet<String> = tokenize(&normalized_query)
            .into_iter()
            .filter(|t| !is_stopword(t))
            .collect();
        let has_special_topic = tokens
            .iter()
            .any(|t| SPECIAL_KEYWORDS.contains(&t.as_str()));
        let fragments = cjk_bigrams(&normalized_query);

        Self {
            raw_query: raw_query.to_string(),
            normalized_query,
            tokens,
            has_special_topic,
            fragments,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.normalized_query.is_empty()
    }

    /// Any query token occurs as a substring of `text_lower`
    pub fn any_token_in(&self, text_lower: &str) -> bool {
        self.tokens.iter().any(|t| text_lower.contains(t.as_str()))
    }

    /// Query tokens that are also whole tokens of `text_lower`
    pub fn overlap(&self, text_lower: &str) -> usize {
        let text_tokens = tokenize(text_lower);
        self.tokens.intersection(&text_tokens).count()
    }

    /// Number of query bigrams that occur in `text`
    pub fn fragment_hits(&self, text: &str) -> usize {
        self.fragments
            .iter()
            .filter(|f| text.contains(f.as_str()))
            .count()
    }

    /// The raw query mentions a special keyword anywhere, token or not
    pub fn mentions_special_keyword(&self) -> bool {
        SPECIAL_KEYWORDS
            .iter()
            .any(|k| self.normalized_query.contains(k))
    }

    /// Interrogative concept words present in both the query and `text_lower`
    pub fn shared_concepts(&self, text_lower: &str) -> usize {
        CONCEPT_WORDS
            .iter()
            .filter(|w| self.normalized_query.contains(*w) && text_lower.contains(*w))
            .count()
    }
}

/// Text contains one of [`SPECIAL_KEYWORDS`]
pub fn contains_special_keyword(text_lower: &str) -> bool {
    SPECIAL_KEYWORDS.iter().any(|k| text_lower.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cjk_query_is_single_token() {
        let profile = QueryProfile::build("入学需要准备哪些材料？");
        assert_eq!(profile.tokens.len(), 1);
        assert!(profile.tokens.contains("入学需要准备哪些材料？"));
        assert!(!profile.has_special_topic);
    }

    #[test]
    fn test_normalization_keeps_raw() {
        let profile = QueryProfile::build("  Credit HOURS  ");
        assert_eq!(profile.raw_query, "  Credit HOURS  ");
        assert_eq!(profile.normalized_query, "credit hours");
        assert!(profile.tokens.contains("credit"));
        assert!(profile.tokens.contains("hours"));
    }

    #[test]
    fn test_stopwords_and_short_tokens_dropped() {
        let profile = QueryProfile::build("没有 a 自己 课程");
        assert_eq!(profile.tokens.len(), 1);
        assert!(profile.tokens.contains("课程"));
    }

    #[test]
    fn test_special_topic_requires_whole_token() {
        assert!(QueryProfile::build("毕业 要求").has_special_topic);
        assert!(!QueryProfile::build("毕业要求").has_special_topic);
        assert!(QueryProfile::build("毕业要求").mentions_special_keyword());
    }

    #[test]
    fn test_overlap_counts_whole_tokens() {
        let profile = QueryProfile::build("专业 课程 学分");
        assert_eq!(profile.overlap("本专业 课程 学分 要求"), 2);
        assert!(profile.any_token_in("本专业课程"));
    }

    #[test]
    fn test_cjk_bigrams() {
        let grams = cjk_bigrams("入学材料 ok 照片");
        assert!(grams.contains("入学"));
        assert!(grams.contains("学材"));
        assert!(grams.contains("材料"));
        assert!(grams.contains("照片"));
        assert!(!grams.contains("料照"));
        assert_eq!(grams.len(), 4);
    }

    #[test]
    fn test_fragment_hits() {
        let profile = QueryProfile::build("入学需要准备哪些材料？");
        assert_eq!(profile.fragment_hits("入学材料"), 2);
        assert_eq!(profile.fragment_hits("宿舍管理"), 0);
    }

    #[test]
    fn test_shared_concepts() {
        let profile = QueryProfile::build("如何申请奖学金");
        assert_eq!(profile.shared_concepts("如何申请国家奖学金"), 1);
        assert_eq!(profile.shared_concepts("奖学金名额"), 0);
    }

    #[test]
    fn test_empty_query() {
        let profile = QueryProfile::build("   ");
        assert!(profile.is_empty());
        assert!(profile.tokens.is_empty());
    }
}
