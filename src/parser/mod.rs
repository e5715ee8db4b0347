//! Structure parser
//!
//! Segments one knowledge document into the units the scorer works on:
//! question/answer pairs for answer-list files, heading-tagged lines for
//! everything else, and sentences for the last fallback stage. Every unit
//! keeps the byte span it came from.

pub mod headings;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::LazyLock;

use crate::corpus::KnowledgeDocument;
pub use headings::{heading_body, HeadingClassifier, HeadingMatch, HeadingPattern};

static QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\s*[.．]\s*(.+?)[？?]").expect("question regex is valid")
});

static SENTENCE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[。！？.!?]|\n[ \t\r]*\n").expect("sentence regex is valid")
});

const ANSWER_MARKERS: [&str; 2] = ["答：", "答:"];

/// Which parsing strategy a document received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    /// Enumerated `N. question?` / `答：answer` list
    AnswerList,
    /// Loosely structured prose with headings
    FreeText,
}

/// A numbered question, optionally bound to the answer line below it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaPairUnit {
    /// Full trimmed question line, e.g. `3. 如何申请奖学金？`
    pub question_line: String,
    /// Question body without number and question mark
    pub question_text: String,
    /// Full trimmed answer line including its marker
    pub answer_text: Option<String>,
    pub line_index: usize,
    pub span: Range<usize>,
}

impl QaPairUnit {
    /// Question line followed by its answer line
    pub fn passage_text(&self) -> String {
        match &self.answer_text {
            Some(answer) => format!("{}\n{}", self.question_line, answer),
            None => self.question_line.clone(),
        }
    }
}

/// One trimmed line of a free-text document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineUnit {
    pub text: String,
    pub line_index: usize,
    pub heading_level: Option<u8>,
    pub span: Range<usize>,
}

impl LineUnit {
    pub fn is_heading(&self) -> bool {
        self.heading_level.is_some()
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

/// Atomic scoring target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralUnit {
    QaPair(QaPairUnit),
    Line(LineUnit),
}

impl StructuralUnit {
    pub fn span(&self) -> &Range<usize> {
        match self {
            StructuralUnit::QaPair(qa) => &qa.span,
            StructuralUnit::Line(line) => &line.span,
        }
    }

    pub fn line_index(&self) -> usize {
        match self {
            StructuralUnit::QaPair(qa) => qa.line_index,
            StructuralUnit::Line(line) => line.line_index,
        }
    }

    pub fn as_line(&self) -> Option<&LineUnit> {
        match self {
            StructuralUnit::Line(line) => Some(line),
            StructuralUnit::QaPair(_) => None,
        }
    }
}

/// A sentence cut out of the raw text for the sentence-level fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceUnit {
    pub text: String,
    pub span: Range<usize>,
}

/// A line that matched several heading patterns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingAmbiguity {
    pub line_index: usize,
    pub line: String,
    pub winner: &'static str,
    pub shadowed: Vec<&'static str>,
}

/// Parser output for one document
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub kind: DocumentKind,
    pub units: Vec<StructuralUnit>,
    pub ambiguities: Vec<HeadingAmbiguity>,
}

impl ParsedDocument {
    pub fn lines(&self) -> impl Iterator<Item = &LineUnit> {
        self.units.iter().filter_map(StructuralUnit::as_line)
    }

    pub fn qa_pairs(&self) -> impl Iterator<Item = &QaPairUnit> {
        self.units.iter().filter_map(|u| match u {
            StructuralUnit::QaPair(qa) => Some(qa),
            StructuralUnit::Line(_) => None,
        })
    }

    pub fn headings(&self) -> impl Iterator<Item = &LineUnit> {
        self.lines().filter(|l| l.is_heading())
    }
}

/// Splits documents into structural units
#[derive(Debug, Clone)]
pub struct StructureParser {
    classifier: HeadingClassifier<'static>,
    answer_list_marker: String,
}

impl StructureParser {
    pub fn new(answer_list_marker: impl Into<String>) -> Self {
        Self {
            classifier: HeadingClassifier::builtin(),
            answer_list_marker: answer_list_marker.into(),
        }
    }

    /// Parser with a custom heading table
    pub fn with_classifier(
        classifier: HeadingClassifier<'static>,
        answer_list_marker: impl Into<String>,
    ) -> Self {
        Self {
            classifier,
            answer_list_marker: answer_list_marker.into(),
        }
    }

    pub fn classifier(&self) -> &HeadingClassifier<'static> {
        &self.classifier
    }

    /// Answer-list files are recognised by a fixed marker in the file name
    pub fn is_answer_list(&self, filename: &str) -> bool {
        !self.answer_list_marker.is_empty() && filename.contains(&self.answer_list_marker)
    }

    pub fn parse(&self, doc: &KnowledgeDocument) -> ParsedDocument {
        if self.is_answer_list(&doc.filename) {
            ParsedDocument {
                kind: DocumentKind::AnswerList,
                units: parse_answer_list(&doc.raw_text),
                ambiguities: Vec::new(),
            }
        } else {
            self.parse_free_text(&doc.raw_text)
        }
    }

    fn parse_free_text(&self, text: &str) -> ParsedDocument {
        let mut units = Vec::new();
        let mut ambiguities = Vec::new();
        let patterns = self.classifier.patterns();

        for (line_index, (span, line)) in lines_with_spans(text).into_iter().enumerate() {
            let heading = if line.is_empty() {
                None
            } else {
                self.classifier.classify(line)
            };

            if let Some(m) = heading.as_ref().filter(|m| m.is_ambiguous()) {
                ambiguities.push(HeadingAmbiguity {
                    line_index,
                    line: line.to_string(),
                    winner: patterns[m.pattern_index].name,
                    shadowed: m.shadowed.iter().map(|&i| patterns[i].name).collect(),
                });
            }

            units.push(StructuralUnit::Line(LineUnit {
                text: line.to_string(),
                line_index,
                heading_level: heading.map(|m| m.level),
                span,
            }));
        }

        ParsedDocument {
            kind: DocumentKind::FreeText,
            units,
            ambiguities,
        }
    }
}

impl Default for StructureParser {
    fn default() -> Self {
        Self::new("answers.txt")
    }
}

fn is_answer_line(line: &str) -> bool {
    ANSWER_MARKERS.iter().any(|m| line.starts_with(m))
}

fn parse_answer_list(text: &str) -> Vec<StructuralUnit> {
    let lines = lines_with_spans(text);
    let mut units = Vec::new();

    for (i, (span, line)) in lines.iter().enumerate() {
        if line.is_empty() || is_answer_line(line) {
            continue;
        }
        let Some(caps) = QUESTION_RE.captures(line) else {
            continue;
        };

        let next = lines.get(i + 1).filter(|(_, next)| is_answer_line(next));
        let end = next.map_or(span.end, |(next_span, _)| next_span.end);

        units.push(StructuralUnit::QaPair(QaPairUnit {
            question_line: line.to_string(),
            question_text: caps[1].trim().to_string(),
            answer_text: next.map(|(_, answer)| answer.to_string()),
            line_index: i,
            span: span.start..end,
        }));
    }

    units
}

/// Trimmed lines with the byte span of their trimmed content
pub fn lines_with_spans(text: &str) -> Vec<(Range<usize>, &str)> {
    let mut out = Vec::new();
    let mut offset = 0;

    for raw in text.split('\n') {
        let leading = raw.len() - raw.trim_start().len();
        let trimmed = raw.trim();
        let start = offset + leading;
        out.push((start..start + trimmed.len(), trimmed));
        offset += raw.len() + 1;
    }

    out
}

/// Split on CJK/Latin sentence terminators and blank lines
pub fn split_sentences(text: &str) -> Vec<SentenceUnit> {
    let mut sentences = Vec::new();
    let mut start = 0;

    let mut push = |from: usize, to: usize| {
        let piece = &text[from..to];
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            let lead = piece.len() - piece.trim_start().len();
            sentences.push(SentenceUnit {
                text: trimmed.to_string(),
                span: from + lead..from + lead + trimmed.len(),
            });
        }
    };

    for m in SENTENCE_BREAK_RE.find_iter(text) {
        push(start, m.start());
        start = m.end();
    }
    push(start, text.len());

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_text(text: &str) -> ParsedDocument {
        StructureParser::default().parse(&KnowledgeDocument::from_title("doc", text))
    }

    #[test]
    fn test_answer_list_detection() {
        let parser = StructureParser::default();
        assert!(parser.is_answer_list("answers.txt"));
        assert!(parser.is_answer_list("student_answers.txt"));
        assert!(!parser.is_answer_list("admissions.txt"));
        assert!(!StructureParser::new("").is_answer_list("answers.txt"));
    }

    #[test]
    fn test_parse_answer_list_binds_answers() {
        let text = "1. 如何申请奖学金？\n答：向学院提交申请表。\n2. 宿舍几点关门?\n3. 食堂在哪里？\n答：在二号楼。";
        let doc = KnowledgeDocument::new("answers", "answers.txt", text);
        let parsed = StructureParser::default().parse(&doc);

        assert_eq!(parsed.kind, DocumentKind::AnswerList);
        let pairs: Vec<_> = parsed.qa_pairs().collect();
        assert_eq!(pairs.len(), 3);

        assert_eq!(pairs[0].question_text, "如何申请奖学金");
        assert_eq!(pairs[0].answer_text.as_deref(), Some("答：向学院提交申请表。"));
        assert_eq!(pairs[1].question_text, "宿舍几点关门");
        assert!(pairs[1].answer_text.is_none());
        assert_eq!(pairs[2].line_index, 3);
        assert_eq!(&text[pairs[2].span.clone()], "3. 食堂在哪里？\n答：在二号楼。");
    }

    #[test]
    fn test_answer_list_skips_non_questions() {
        let text = "常见问题汇总\n答：孤立的答案\n1. 没有问号的行";
        let doc = KnowledgeDocument::new("answers", "answers.txt", text);
        let parsed = StructureParser::default().parse(&doc);
        assert_eq!(parsed.units.len(), 0);
    }

    #[test]
    fn test_free_text_every_line_becomes_unit() {
        let parsed = free_text("## 入学材料\n身份证、学籍证明、照片\n\n其他说明");
        assert_eq!(parsed.kind, DocumentKind::FreeText);

        let lines: Vec<_> = parsed.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].heading_level, Some(2));
        assert!(lines[0].is_heading());
        assert!(!lines[1].is_heading());
        assert!(lines[2].is_blank());
        assert_eq!(lines[3].line_index, 3);
    }

    #[test]
    fn test_line_spans_map_back_to_source() {
        let text = "  标题行  \n\t正文内容\n";
        let parsed = free_text(text);
        for line in parsed.lines() {
            assert_eq!(&text[line.span.clone()], line.text);
        }
    }

    #[test]
    fn test_split_sentences() {
        let text = "第一句。第二句！Third one? 末尾";
        let sentences = split_sentences(text);
        let texts: Vec<_> = sentences.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["第一句", "第二句", "Third one", "末尾"]);
        for s in &sentences {
            assert_eq!(&text[s.span.clone()], s.text);
        }
    }

    #[test]
    fn test_split_sentences_breaks_on_blank_line() {
        let sentences = split_sentences("上一段没有句号\n\n下一段");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1].text, "下一段");
    }

    #[test]
    fn test_ambiguous_headings_are_recorded() {
        static TABLE: LazyLock<Vec<HeadingPattern>> = LazyLock::new(|| {
            vec![
                HeadingPattern::new("numbered", r"^\d+\s", 1).unwrap(),
                HeadingPattern::new("short", r"^.{1,6}$", 3).unwrap(),
            ]
        });
        let parser = StructureParser::with_classifier(HeadingClassifier::new(&TABLE), "answers.txt");
        let parsed = parser.parse(&KnowledgeDocument::from_title("doc", "1 概述\n正文很长很长很长很长\n附录"));

        assert_eq!(parsed.ambiguities.len(), 1);
        assert_eq!(parsed.ambiguities[0].line_index, 0);
        assert_eq!(parsed.ambiguities[0].winner, "numbered");
        assert_eq!(parsed.ambiguities[0].shadowed, vec!["short"]);

        let levels: Vec<_> = parsed.lines().map(|l| l.heading_level).collect();
        assert_eq!(levels, vec![Some(1), None, Some(3)]);
    }

    #[test]
    fn test_headings_iterator() {
        let parsed = free_text("# 总则\n正文\n1.1 目标\n正文");
        let levels: Vec<_> = parsed.headings().map(|h| h.heading_level).collect();
        assert_eq!(levels, vec![Some(1), Some(2)]);
    }
}
