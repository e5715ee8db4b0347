//! Heading classification
//!
//! Heading recognition is an ordered table of `(pattern, level)` pairs,
//! evaluated first-match-wins. The order is part of the contract:
//!
//! | # | Pattern | Example | Level |
//! |---|---------|---------|-------|
//! | 0 | `markdown_h1` | `# 标题` | 1 |
//! | 1 | `markdown_h2` | `## 标题` | 2 |
//! | 2 | `markdown_h3` | `### 标题` | 3 |
//! | 3 | `markdown_h4` | `#### 标题` | 4 |
//! | 4 | `markdown_h5` | `##### 标题` | 5 |
//! | 5 | `markdown_h6` | `###### 标题` | 6 |
//! | 6 | `delimited` | `=== 正文内容 ===` | 0 |
//! | 7 | `outline_4` | `1.1.1.1 标题` | 4 |
//! | 8 | `outline_3` | `1.1.1 标题` | 3 |
//! | 9 | `outline_2` | `1.1 标题`, `1. 标题` | 2 |
//! | 10 | `outline_1` | `1 标题` | 1 |
//! | 11 | `chapter` | `第一章 总则` | 1 |
//! | 12 | `section` | `第二节 课程` | 2 |
//! | 13 | `cn_numeral` | `一、培养目标` | 1 |
//! | 14 | `parenthesized` | `（一）课程设置` | 2 |
//!
//! Deeper numeric outlines are listed before shallower ones so every outline
//! depth is reachable.

use regex::Regex;
use std::sync::LazyLock;

/// Deepest heading level a pattern may assign
pub const MAX_HEADING_LEVEL: u8 = 6;

/// One row of the heading table
#[derive(Debug)]
pub struct HeadingPattern {
    pub name: &'static str,
    pub level: u8,
    regex: Regex,
}

impl HeadingPattern {
    pub fn new(name: &'static str, pattern: &str, level: u8) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            level: level.min(MAX_HEADING_LEVEL),
            regex: Regex::new(pattern)?,
        })
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

const DEFAULT_TABLE: &[(&str, &str, u8)] = &[
    ("markdown_h1", r"^#\s+\S", 1),
    ("markdown_h2", r"^##\s+\S", 2),
    ("markdown_h3", r"^###\s+\S", 3),
    ("markdown_h4", r"^####\s+\S", 4),
    ("markdown_h5", r"^#####\s+\S", 5),
    ("markdown_h6", r"^######\s+\S", 6),
    ("delimited", r"^===\s*(.+?)\s*===", 0),
    ("outline_4", r"^\d+\.\d+\.\d+\.\d+\.?\s*[^\d.\s]", 4),
    ("outline_3", r"^\d+\.\d+\.\d+\.?\s*[^\d.\s]", 3),
    ("outline_2", r"^\d+\.(?:\d+\.?)?\s*[^\d.\s]", 2),
    ("outline_1", r"^\d+\s+\S", 1),
    ("chapter", r"^第[一二三四五六七八九十百零]+章\s*\S", 1),
    ("section", r"^第[一二三四五六七八九十百零]+节\s*\S", 2),
    ("cn_numeral", r"^[一二三四五六七八九十百]+(?:、|\s+)\S", 1),
    ("parenthesized", r"^[（(](?:\d+|[一二三四五六七八九十]+)[）)]\s*\p{Han}", 2),
];

static DEFAULT_PATTERNS: LazyLock<Vec<HeadingPattern>> = LazyLock::new(|| {
    DEFAULT_TABLE
        .iter()
        .map(|(name, pattern, level)| {
            HeadingPattern::new(name, pattern, *level).expect("heading pattern table is valid")
        })
        .collect()
});

/// The built-in heading table, in precedence order
pub fn default_patterns() -> &'static [HeadingPattern] {
    &DEFAULT_PATTERNS
}

/// Result of classifying one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingMatch {
    /// Level assigned by the winning pattern
    pub level: u8,
    /// Index of the winning pattern in the table
    pub pattern_index: usize,
    /// Indices of every other pattern that also matched
    pub shadowed: Vec<usize>,
}

impl HeadingMatch {
    /// More than one pattern matched; resolved by table order
    pub fn is_ambiguous(&self) -> bool {
        !self.shadowed.is_empty()
    }
}

/// First-match-wins classifier over an ordered pattern table
#[derive(Debug, Clone, Copy)]
pub struct HeadingClassifier<'a> {
    patterns: &'a [HeadingPattern],
}

impl HeadingClassifier<'static> {
    pub fn builtin() -> Self {
        Self {
            patterns: default_patterns(),
        }
    }
}

impl Default for HeadingClassifier<'static> {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<'a> HeadingClassifier<'a> {
    pub fn new(patterns: &'a [HeadingPattern]) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &'a [HeadingPattern] {
        self.patterns
    }

    /// Classify a trimmed line. Every pattern is checked so that overlaps
    /// can be reported, but only the first match decides the level.
    pub fn classify(&self, line: &str) -> Option<HeadingMatch> {
        let mut matched = self
            .patterns
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_match(line))
            .map(|(i, _)| i);

        let pattern_index = matched.next()?;
        Some(HeadingMatch {
            level: self.patterns[pattern_index].level,
            pattern_index,
            shadowed: matched.collect(),
        })
    }

    pub fn is_heading(&self, line: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(line))
    }
}

/// Heading text with Markdown / delimiter markers removed
pub fn heading_body(line: &str) -> &str {
    line.trim()
        .trim_start_matches(['#', '='])
        .trim_end_matches('=')
        .trim()
}
