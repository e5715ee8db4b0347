//! Per-document fallback cascade
//!
//! Answer-list documents: QA pairs, then sentences. Free text: paragraphs,
//! then headings, then sentences. A stage runs only if every earlier stage
//! for the same document came back empty.

use crate::assembler::assemble;
use crate::corpus::KnowledgeDocument;
use crate::parser::{split_sentences, DocumentKind, HeadingAmbiguity, LineUnit, ParsedDocument, StructureParser};
use crate::query::QueryProfile;
use crate::scoring::RelevanceScorer;

use super::{MatchStrategy, RetrievalConfig, ScoredCandidate};

/// What the cascade did for one document
#[derive(Debug, Clone)]
pub struct CascadeReport {
    pub document: String,
    pub kind: DocumentKind,
    /// Best candidates, highest score first
    pub candidates: Vec<ScoredCandidate>,
    /// Stages in the order they ran
    pub stages_attempted: Vec<MatchStrategy>,
    pub ambiguities: Vec<HeadingAmbiguity>,
}

impl CascadeReport {
    pub fn best_score(&self) -> Option<f64> {
        self.candidates.first().map(|c| c.score)
    }

    /// Stage that produced the candidates, if any did
    pub fn winning_stage(&self) -> Option<MatchStrategy> {
        self.candidates.first().map(|c| c.strategy)
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Runs the stage sequence over single documents
pub struct DocumentCascade<'a> {
    parser: &'a StructureParser,
    scorer: &'a RelevanceScorer,
    config: &'a RetrievalConfig,
}

impl<'a> DocumentCascade<'a> {
    pub fn new(
        parser: &'a StructureParser,
        scorer: &'a RelevanceScorer,
        config: &'a RetrievalConfig,
    ) -> Self {
        Self {
            parser,
            scorer,
            config,
        }
    }

    pub fn run(&self, doc: &KnowledgeDocument, profile: &QueryProfile) -> CascadeReport {
        let parsed = self.parser.parse(doc);
        let plan: &[MatchStrategy] = match parsed.kind {
            DocumentKind::AnswerList => &[MatchStrategy::QaPair, MatchStrategy::Sentence],
            DocumentKind::FreeText => &[
                MatchStrategy::Paragraph,
                MatchStrategy::Heading,
                MatchStrategy::Sentence,
            ],
        };

        let mut stages_attempted = Vec::with_capacity(plan.len());
        let mut candidates = Vec::new();

        for &stage in plan {
            stages_attempted.push(stage);
            candidates = match stage {
                MatchStrategy::QaPair => self.qa_stage(&parsed, doc, profile),
                MatchStrategy::Paragraph => self.paragraph_stage(&parsed, doc, profile),
                MatchStrategy::Heading => self.heading_stage(&parsed, doc, profile),
                MatchStrategy::Sentence => self.sentence_stage(doc, profile),
                MatchStrategy::KeywordScan => Vec::new(),
            };
            if !candidates.is_empty() {
                break;
            }
        }

        rank(&mut candidates, self.config.passages_per_document);

        CascadeReport {
            document: doc.title.clone(),
            kind: parsed.kind,
            candidates,
            stages_attempted,
            ambiguities: parsed.ambiguities,
        }
    }

    fn qa_stage(
        &self,
        parsed: &ParsedDocument,
        doc: &KnowledgeDocument,
        profile: &QueryProfile,
    ) -> Vec<ScoredCandidate> {
        let accept = self.config.thresholds.qa_accept;
        parsed
            .qa_pairs()
            .filter_map(|qa| {
                let score = self.scorer.score_question(qa, profile);
                (score >= accept).then(|| ScoredCandidate {
                    score,
                    text: qa.passage_text(),
                    source_document: doc.title.clone(),
                    strategy: MatchStrategy::QaPair,
                    span: qa.span.clone(),
                })
            })
            .collect()
    }

    fn paragraph_stage(
        &self,
        parsed: &ParsedDocument,
        doc: &KnowledgeDocument,
        profile: &QueryProfile,
    ) -> Vec<ScoredCandidate> {
        let scored = parsed
            .lines()
            .map(|line| (line, self.scorer.score_line(line, profile)));

        assemble(
            scored,
            &self.config.thresholds,
            profile.has_special_topic,
            self.config.recent_heading_capacity,
        )
        .into_iter()
        .map(|passage| ScoredCandidate {
            score: passage.score,
            text: passage.text(),
            source_document: doc.title.clone(),
            strategy: MatchStrategy::Paragraph,
            span: passage.body_span,
        })
        .collect()
    }

    fn heading_stage(
        &self,
        parsed: &ParsedDocument,
        doc: &KnowledgeDocument,
        profile: &QueryProfile,
    ) -> Vec<ScoredCandidate> {
        let lines: Vec<&LineUnit> = parsed.lines().collect();
        let accept = self.config.thresholds.heading_fallback;
        let mut out = Vec::new();

        for (i, heading) in lines.iter().enumerate().filter(|(_, l)| l.is_heading()) {
            let score = self.scorer.score_heading_fallback(heading, profile);
            if score < accept {
                continue;
            }

            // Absorb the section body until a blank line or the next heading
            let body: Vec<&LineUnit> = lines[i + 1..]
                .iter()
                .take(self.config.heading_body_lines)
                .take_while(|l| !l.is_blank() && !l.is_heading())
                .copied()
                .collect();

            let end = body.last().map_or(heading.span.end, |l| l.span.end);
            let text = std::iter::once(heading.text.as_str())
                .chain(body.iter().map(|l| l.text.as_str()))
                .collect::<Vec<_>>()
                .join(" ");

            out.push(ScoredCandidate {
                score,
                text,
                source_document: doc.title.clone(),
                strategy: MatchStrategy::Heading,
                span: heading.span.start..end,
            });
        }

        out
    }

    fn sentence_stage(&self, doc: &KnowledgeDocument, profile: &QueryProfile) -> Vec<ScoredCandidate> {
        let accept = self
            .config
            .thresholds
            .sentence_accept(profile.has_special_topic);

        split_sentences(&doc.raw_text)
            .into_iter()
            .filter_map(|sentence| {
                let score = self.scorer.score_sentence(&sentence.text, profile);
                (score >= accept).then(|| ScoredCandidate {
                    score,
                    text: sentence.text,
                    source_document: doc.title.clone(),
                    strategy: MatchStrategy::Sentence,
                    span: sentence.span,
                })
            })
            .collect()
    }
}

/// Stable sort by descending score, then keep the best `limit`
fn rank(candidates: &mut Vec<ScoredCandidate>, limit: usize) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(limit);
}
