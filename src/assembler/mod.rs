//! Passage assembler
//!
//! A single left-to-right pass that merges adjacent relevant lines into
//! passages. Two states:
//!
//! - `Idle`: no passage open
//! - `Accumulating`: a passage is open and tracking its best line score
//!
//! Transitions, per line:
//!
//! | Line | Idle | Accumulating |
//! |------|------|--------------|
//! | blank | stay | emit, → Idle |
//! | score ≥ accept | seed with recent headings, → Accumulating | append |
//! | heading below accept | remember heading | append, remember heading |
//! | other below accept | stay | emit if max ≥ emit bar, → Idle |
//! | end of document | - | emit if max ≥ emit bar |
//!
//! The emit bar is stricter than the accept bar: one good line is enough to
//! start a passage, but the passage has to be convincing to survive.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ops::Range;

use crate::parser::LineUnit;
use crate::scoring::Thresholds;

/// An emitted run of lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Best line score seen in the passage
    pub score: f64,
    /// Headings seen before the passage opened, oldest first
    pub context_headings: Vec<String>,
    /// Contiguous source lines
    pub body: Vec<String>,
    /// Byte span of the body in the source document
    pub body_span: Range<usize>,
    /// Line indices of the first and last body line
    pub first_line: usize,
    pub last_line: usize,
}

impl Passage {
    /// Heading context followed by the body, space separated
    pub fn text(&self) -> String {
        self.context_headings
            .iter()
            .chain(self.body.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
struct OpenPassage {
    max_score: f64,
    context_headings: Vec<String>,
    body: Vec<String>,
    span: Range<usize>,
    first_line: usize,
    last_line: usize,
}

impl OpenPassage {
    fn seed(context_headings: Vec<String>, line: &LineUnit, score: f64) -> Self {
        Self {
            max_score: score,
            context_headings,
            body: vec![line.text.clone()],
            span: line.span.clone(),
            first_line: line.line_index,
            last_line: line.line_index,
        }
    }

    fn append(&mut self, line: &LineUnit) {
        self.body.push(line.text.clone());
        self.span.end = line.span.end;
        self.last_line = line.line_index;
    }

    fn into_passage(self) -> Passage {
        Passage {
            score: self.max_score,
            context_headings: self.context_headings,
            body: self.body,
            body_span: self.span,
            first_line: self.first_line,
            last_line: self.last_line,
        }
    }
}

/// Assembler state
#[derive(Debug, Clone, Default)]
enum AssemblerState {
    #[default]
    Idle,
    Accumulating(OpenPassage),
}

/// Stateful scan over one document's lines
#[derive(Debug)]
pub struct PassageAssembler {
    state: AssemblerState,
    recent_headings: VecDeque<String>,
    heading_capacity: usize,
    accept: f64,
    emit: f64,
    passages: Vec<Passage>,
}

impl PassageAssembler {
    /// `special` selects the relaxed special-topic thresholds
    pub fn new(thresholds: &Thresholds, special: bool, heading_capacity: usize) -> Self {
        Self {
            state: AssemblerState::Idle,
            recent_headings: VecDeque::with_capacity(heading_capacity),
            heading_capacity,
            accept: thresholds.line_accept(special),
            emit: thresholds.passage_emit(special),
            passages: Vec::new(),
        }
    }

    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, AssemblerState::Accumulating(_))
    }

    pub fn recent_headings(&self) -> impl Iterator<Item = &str> {
        self.recent_headings.iter().map(String::as_str)
    }

    /// Feed the next line with its score
    pub fn feed(&mut self, line: &LineUnit, score: f64) {
        if line.is_blank() {
            self.on_blank();
        } else if score >= self.accept {
            self.on_relevant(line, score);
        } else if line.is_heading() {
            self.on_heading(line);
        } else {
            self.on_irrelevant();
        }
    }

    /// Close any open passage and return everything emitted
    pub fn finish(mut self) -> Vec<Passage> {
        self.close_strict();
        self.passages
    }

    fn on_blank(&mut self) {
        if let AssemblerState::Accumulating(open) = std::mem::take(&mut self.state) {
            self.passages.push(open.into_passage());
        }
    }

    fn on_relevant(&mut self, line: &LineUnit, score: f64) {
        match &mut self.state {
            AssemblerState::Idle => {
                let context = self.recent_headings.iter().cloned().collect();
                self.state = AssemblerState::Accumulating(OpenPassage::seed(context, line, score));
            }
            AssemblerState::Accumulating(open) => {
                open.append(line);
                open.max_score = open.max_score.max(score);
            }
        }
        if line.is_heading() {
            self.remember_heading(&line.text);
        }
    }

    fn on_heading(&mut self, line: &LineUnit) {
        if let AssemblerState::Accumulating(open) = &mut self.state {
            open.append(line);
        }
        self.remember_heading(&line.text);
    }

    fn on_irrelevant(&mut self) {
        self.close_strict();
    }

    fn close_strict(&mut self) {
        if let AssemblerState::Accumulating(open) = std::mem::take(&mut self.state) {
            if open.max_score >= self.emit {
                self.passages.push(open.into_passage());
            }
        }
    }

    fn remember_heading(&mut self, heading: &str) {
        if self.heading_capacity == 0 {
            return;
        }
        if self.recent_headings.len() == self.heading_capacity {
            self.recent_headings.pop_front();
        }
        self.recent_headings.push_back(heading.to_string());
    }
}

/// Run the assembler over a full line sequence
pub fn assemble<'a>(
    lines: impl IntoIterator<Item = (&'a LineUnit, f64)>,
    thresholds: &Thresholds,
    special: bool,
    heading_capacity: usize,
) -> Vec<Passage> {
    let mut assembler = PassageAssembler::new(thresholds, special, heading_capacity);
    for (line, score) in lines {
        assembler.feed(line, score);
    }
    assembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(layout: &[(&str, Option<u8>)]) -> Vec<LineUnit> {
        let mut offset = 0;
        layout
            .iter()
            .enumerate()
            .map(|(i, (text, level))| {
                let unit = LineUnit {
                    text: text.to_string(),
                    line_index: i,
                    heading_level: *level,
                    span: offset..offset + text.len(),
                };
                offset += text.len() + 1;
                unit
            })
            .collect()
    }

    fn run(units: &[LineUnit], scores: &[f64]) -> Vec<Passage> {
        assemble(
            units.iter().zip(scores.iter().copied()),
            &Thresholds::default(),
            false,
            3,
        )
    }

    #[test]
    fn test_idle_without_relevant_lines() {
        let units = lines(&[("a", None), ("b", None)]);
        assert!(run(&units, &[0.0, 5.0]).is_empty());
    }

    #[test]
    fn test_blank_line_emits_unconditionally() {
        let units = lines(&[("hit", None), ("", None), ("after", None)]);
        let passages = run(&units, &[9.0, 0.0, 0.0]);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].body, vec!["hit"]);
        assert_eq!(passages[0].score, 9.0);
    }

    #[test]
    fn test_irrelevant_line_applies_emit_bar() {
        let units = lines(&[("weak", None), ("noise", None), ("strong", None), ("noise", None)]);
        let passages = run(&units, &[9.0, 0.0, 20.0, 0.0]);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].body, vec!["strong"]);
    }

    #[test]
    fn test_end_of_document_applies_emit_bar() {
        let units = lines(&[("weak", None)]);
        assert!(run(&units, &[10.0]).is_empty());

        let units = lines(&[("strong", None)]);
        assert_eq!(run(&units, &[13.0]).len(), 1);
    }

    #[test]
    fn test_seeds_with_recent_headings() {
        let units = lines(&[
            ("# 一", Some(1)),
            ("## 二", Some(2)),
            ("### 三", Some(3)),
            ("#### 四", Some(4)),
            ("正文命中", None),
        ]);
        let passages = run(&units, &[0.0, 0.0, 0.0, 0.0, 20.0]);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].context_headings, vec!["## 二", "### 三", "#### 四"]);
        assert_eq!(passages[0].text(), "## 二 ### 三 #### 四 正文命中");
    }

    #[test]
    fn test_heading_sticks_to_open_passage() {
        let units = lines(&[("命中一", None), ("## 小节", Some(2)), ("命中二", None)]);
        let passages = run(&units, &[20.0, 0.0, 15.0]);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].body, vec!["命中一", "## 小节", "命中二"]);
        assert_eq!(passages[0].score, 20.0);
    }

    #[test]
    fn test_relevant_heading_not_duplicated() {
        let units = lines(&[("## 入学材料", Some(2)), ("材料清单", None)]);
        let passages = run(&units, &[20.0, 12.0]);
        assert_eq!(passages.len(), 1);
        assert!(passages[0].context_headings.is_empty());
        assert_eq!(passages[0].text(), "## 入学材料 材料清单");
    }

    #[test]
    fn test_body_span_is_contiguous() {
        let units = lines(&[("前言", None), ("甲", None), ("乙", None), ("", None)]);
        let passages = run(&units, &[0.0, 20.0, 10.0, 0.0]);
        assert_eq!(passages[0].body_span, units[1].span.start..units[2].span.end);
        assert_eq!((passages[0].first_line, passages[0].last_line), (1, 2));
    }

    #[test]
    fn test_special_thresholds_are_relaxed() {
        let units = lines(&[("line", None)]);
        let strict = assemble(
            units.iter().map(|u| (u, 11.5)),
            &Thresholds::default(),
            false,
            3,
        );
        let relaxed = assemble(
            units.iter().map(|u| (u, 11.5)),
            &Thresholds::default(),
            true,
            3,
        );
        assert!(strict.is_empty());
        assert_eq!(relaxed.len(), 1);
    }

    #[test]
    fn test_state_tracking() {
        let units = lines(&[("hit", None), ("", None)]);
        let mut assembler = PassageAssembler::new(&Thresholds::default(), false, 3);
        assert!(!assembler.is_accumulating());
        assembler.feed(&units[0], 20.0);
        assert!(assembler.is_accumulating());
        assembler.feed(&units[1], 0.0);
        assert!(!assembler.is_accumulating());
    }

    #[test]
    fn test_zero_heading_capacity() {
        let units = lines(&[("# 标题", Some(1)), ("命中", None)]);
        let passages = assemble(
            units.iter().zip([0.0, 20.0]),
            &Thresholds::default(),
            false,
            0,
        );
        assert!(passages[0].context_headings.is_empty());
    }
}
