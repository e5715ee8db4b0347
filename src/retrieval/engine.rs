//! Retrieval entry points
//!
//! [`Retriever`] owns no corpus state; it answers against whatever snapshot
//! it is handed. [`KnowledgeEngine`] bundles a retriever with its own
//! [`CorpusRegistry`] and exposes the two public operations.

use std::time::Instant;
use tracing::debug;

use crate::corpus::{Corpus, CorpusRegistry, KnowledgeDocument, ReloadStats};
use crate::errors::Result;
use crate::parser::StructureParser;
use crate::query::QueryProfile;
use crate::scoring::RelevanceScorer;
use crate::telemetry::{TelemetryCollector, TelemetryEvent};

use super::cascade::{CascadeReport, DocumentCascade};
use super::selector::{DocumentHits, Selector};
use super::{QueryOutcome, RetrievalConfig};

/// Stateless query processor
#[derive(Clone)]
pub struct Retriever {
    config: RetrievalConfig,
    parser: StructureParser,
    scorer: RelevanceScorer,
    selector: Selector,
    telemetry: Option<TelemetryCollector>,
}

impl Retriever {
    pub fn new(config: RetrievalConfig) -> Self {
        Self {
            parser: StructureParser::new(config.answer_list_marker.clone()),
            scorer: RelevanceScorer::new(config.weights.clone(), config.min_fragment_hits),
            selector: Selector::new(config.special_merge_count, config.keyword_scan_lines),
            config,
            telemetry: None,
        }
    }

    /// Report answers and fallbacks to `collector`
    pub fn with_telemetry(mut self, collector: TelemetryCollector) -> Self {
        self.telemetry = Some(collector);
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn parser(&self) -> &StructureParser {
        &self.parser
    }

    /// Answer against the registry's current snapshot. An uninitialised
    /// registry yields `NotFound`.
    pub fn answer_query(&self, registry: &CorpusRegistry, query: &str) -> QueryOutcome {
        match registry.snapshot() {
            Some(corpus) => self.answer_in(&corpus, query),
            None => {
                debug!("query against uninitialized corpus");
                self.record_outcome(&QueryOutcome::NotFound, Instant::now());
                QueryOutcome::NotFound
            }
        }
    }

    pub fn answer_in(&self, corpus: &Corpus, query: &str) -> QueryOutcome {
        let started = Instant::now();
        let profile = QueryProfile::build(query);

        let outcome = if profile.is_empty() {
            QueryOutcome::NotFound
        } else {
            let hits: Vec<DocumentHits<'_>> = corpus
                .documents()
                .zip(self.document_reports(corpus, &profile))
                .map(|(document, report)| DocumentHits {
                    document,
                    candidates: report.candidates,
                })
                .collect();
            self.selector.finalize(&hits, corpus, &profile)
        };

        self.record_outcome(&outcome, started);
        outcome
    }

    /// Run the cascade over every document, in title order
    pub fn document_reports(&self, corpus: &Corpus, profile: &QueryProfile) -> Vec<CascadeReport> {
        let cascade = DocumentCascade::new(&self.parser, &self.scorer, &self.config);

        corpus
            .documents()
            .map(|doc| {
                let report = cascade.run(doc, profile);
                debug!(
                    document = %report.document,
                    stages = ?report.stages_attempted,
                    candidates = report.candidates.len(),
                    best = ?report.best_score(),
                    "cascade finished"
                );
                self.record_fallbacks(&report);
                report
            })
            .collect()
    }

    fn record_fallbacks(&self, report: &CascadeReport) {
        let Some(telemetry) = &self.telemetry else {
            return;
        };
        for &stage in report.stages_attempted.iter().skip(1) {
            telemetry.record(TelemetryEvent::FallbackEngaged {
                document: report.document.clone(),
                stage,
                timestamp: Instant::now(),
            });
        }
    }

    fn record_outcome(&self, outcome: &QueryOutcome, started: Instant) {
        let Some(telemetry) = &self.telemetry else {
            return;
        };
        let event = match outcome {
            QueryOutcome::Found(answer) => TelemetryEvent::QueryAnswered {
                strategy: answer.strategy,
                score: answer.score,
                duration: started.elapsed(),
                timestamp: Instant::now(),
            },
            QueryOutcome::NotFound => TelemetryEvent::QueryUnanswered {
                duration: started.elapsed(),
                timestamp: Instant::now(),
            },
        };
        telemetry.record(event);
    }
}

impl Default for Retriever {
    fn default() -> Self {
        Self::new(RetrievalConfig::default())
    }
}

/// Registry plus retriever behind the two public operations
pub struct KnowledgeEngine {
    registry: CorpusRegistry,
    retriever: Retriever,
    telemetry: TelemetryCollector,
}

impl KnowledgeEngine {
    pub fn new(config: RetrievalConfig) -> Self {
        Self::with_telemetry(config, TelemetryCollector::new())
    }

    pub fn with_telemetry(config: RetrievalConfig, telemetry: TelemetryCollector) -> Self {
        Self {
            registry: CorpusRegistry::new(),
            retriever: Retriever::new(config).with_telemetry(telemetry.clone()),
            telemetry,
        }
    }

    /// Atomically replace the corpus. Fails with `EmptyCorpus` on an empty
    /// list, keeping the previous corpus.
    pub fn reinitialize_corpus(&self, documents: Vec<KnowledgeDocument>) -> Result<ReloadStats> {
        let stats = self.registry.reinitialize(documents)?;
        self.telemetry.record(TelemetryEvent::CorpusReloaded {
            documents: stats.loaded_count,
            timestamp: Instant::now(),
        });
        self.report_ambiguities();
        Ok(stats)
    }

    pub fn answer_query(&self, query: &str) -> QueryOutcome {
        self.retriever.answer_query(&self.registry, query)
    }

    pub fn registry(&self) -> &CorpusRegistry {
        &self.registry
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }

    // Heading ambiguities are a property of the corpus, so they are
    // reported once per load rather than once per query.
    fn report_ambiguities(&self) {
        let Some(corpus) = self.registry.snapshot() else {
            return;
        };
        for doc in corpus.documents() {
            for ambiguity in self.retriever.parser().parse(doc).ambiguities {
                debug!(
                    document = %doc.title,
                    line = ambiguity.line_index,
                    winner = ambiguity.winner,
                    shadowed = ?ambiguity.shadowed,
                    "ambiguous heading"
                );
                self.telemetry.record(TelemetryEvent::HeadingAmbiguity {
                    document: doc.title.clone(),
                    line_index: ambiguity.line_index,
                    winner: ambiguity.winner,
                    timestamp: Instant::now(),
                });
            }
        }
    }
}

impl Default for KnowledgeEngine {
    fn default() -> Self {
        Self::new(RetrievalConfig::default())
    }
}
