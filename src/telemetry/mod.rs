//! Retrieval telemetry
//!
//! Collects per-query events for corpus-quality feedback: which fallback
//! stages fire, which headings were ambiguous, how often queries go
//! unanswered.

use colored::Colorize;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::Verbosity;
use crate::retrieval::MatchStrategy;

/// Events kept for `recent_events`; counters in [`TelemetryStats`] are unbounded
pub const MAX_EVENTS: usize = 1000;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    CorpusReloaded {
        documents: usize,
        timestamp: Instant,
    },
    QueryAnswered {
        strategy: MatchStrategy,
        score: f64,
        duration: Duration,
        timestamp: Instant,
    },
    QueryUnanswered {
        duration: Duration,
        timestamp: Instant,
    },
    /// A document needed a looser stage than the first one
    FallbackEngaged {
        document: String,
        stage: MatchStrategy,
        timestamp: Instant,
    },
    /// A heading line matched several patterns
    HeadingAmbiguity {
        document: String,
        line_index: usize,
        winner: &'static str,
        timestamp: Instant,
    },
}

/// Aggregated counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    pub corpus_reloads: usize,
    pub queries: usize,
    pub answered: usize,
    pub not_found: usize,
    pub heading_fallbacks: usize,
    pub sentence_fallbacks: usize,
    pub keyword_scans: usize,
    pub heading_ambiguities: usize,
}

/// Cloneable, thread-safe event sink
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = self.stats.lock();
            match &event {
                TelemetryEvent::CorpusReloaded { .. } => stats.corpus_reloads += 1,
                TelemetryEvent::QueryAnswered { strategy, .. } => {
                    stats.queries += 1;
                    stats.answered += 1;
                    if *strategy == MatchStrategy::KeywordScan {
                        stats.keyword_scans += 1;
                    }
                }
                TelemetryEvent::QueryUnanswered { .. } => {
                    stats.queries += 1;
                    stats.not_found += 1;
                }
                TelemetryEvent::FallbackEngaged { stage, .. } => match stage {
                    MatchStrategy::Heading => stats.heading_fallbacks += 1,
                    MatchStrategy::Sentence => stats.sentence_fallbacks += 1,
                    _ => {}
                },
                TelemetryEvent::HeadingAmbiguity { .. } => stats.heading_ambiguities += 1,
            }
        }

        let mut events = self.events.lock();
        if events.len() >= MAX_EVENTS {
            let excess = events.len() + 1 - MAX_EVENTS;
            events.drain(..excess);
        }
        events.push(event);
    }

    pub fn get_stats(&self) -> TelemetryStats {
        self.stats.lock().clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }

    /// Last `n` events
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = self.events.lock();
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Share of queries that produced an answer
    pub fn answer_rate(&self) -> f64 {
        let stats = self.stats.lock();
        if stats.queries == 0 {
            1.0
        } else {
            stats.answered as f64 / stats.queries as f64
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal summary of a session
pub struct TelemetryDisplay {
    collector: TelemetryCollector,
    verbosity: Verbosity,
}

impl TelemetryDisplay {
    pub fn new(collector: TelemetryCollector, verbosity: Verbosity) -> Self {
        Self {
            collector,
            verbosity,
        }
    }

    pub fn display_summary(&self) {
        let stats = self.collector.get_stats();

        println!("\n{}", "Session Summary".bold());
        println!("─────────────────────────────────────");
        println!("Duration:            {:?}", self.collector.elapsed());
        println!("Queries:             {}", stats.queries);
        println!(
            "Answer rate:         {:.1}%",
            self.collector.answer_rate() * 100.0
        );
        println!("Heading fallbacks:   {}", stats.heading_fallbacks);
        println!("Sentence fallbacks:  {}", stats.sentence_fallbacks);
        println!("Keyword scans:       {}", stats.keyword_scans);
        if stats.heading_ambiguities > 0 {
            println!(
                "Ambiguous headings:  {}",
                stats.heading_ambiguities.to_string().yellow()
            );
        }
        if self.verbosity == Verbosity::VeryVerbose {
            for event in self.collector.recent_events(10) {
                println!("  {}", format!("{:?}", event).dimmed());
            }
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_creation() {
        let collector = TelemetryCollector::new();
        assert_eq!(collector.event_count(), 0);
        assert_eq!(collector.get_stats(), TelemetryStats::default());
    }

    #[test]
    fn test_query_outcomes_counted() {
        let collector = TelemetryCollector::new();
        collector.record(TelemetryEvent::QueryAnswered {
            strategy: MatchStrategy::Paragraph,
            score: 30.0,
            duration: Duration::from_millis(2),
            timestamp: Instant::now(),
        });
        collector.record(TelemetryEvent::QueryUnanswered {
            duration: Duration::from_millis(1),
            timestamp: Instant::now(),
        });

        let stats = collector.get_stats();
        assert_eq!(stats.queries, 2);
        assert_eq!(stats.answered, 1);
        assert_eq!(stats.not_found, 1);
        assert!((collector.answer_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fallback_stages_counted() {
        let collector = TelemetryCollector::new();
        for stage in [MatchStrategy::Heading, MatchStrategy::Sentence, MatchStrategy::Sentence] {
            collector.record(TelemetryEvent::FallbackEngaged {
                document: "doc".to_string(),
                stage,
                timestamp: Instant::now(),
            });
        }
        let stats = collector.get_stats();
        assert_eq!(stats.heading_fallbacks, 1);
        assert_eq!(stats.sentence_fallbacks, 2);
    }

    #[test]
    fn test_recent_events() {
        let collector = TelemetryCollector::new();
        for i in 0..10 {
            collector.record(TelemetryEvent::CorpusReloaded {
                documents: i,
                timestamp: Instant::now(),
            });
        }
        assert_eq!(collector.recent_events(3).len(), 3);
        assert_eq!(collector.get_stats().corpus_reloads, 10);
    }

    #[test]
    fn test_event_log_is_capped() {
        let collector = TelemetryCollector::new();
        for i in 0..MAX_EVENTS + 25 {
            collector.record(TelemetryEvent::CorpusReloaded {
                documents: i,
                timestamp: Instant::now(),
            });
        }
        assert_eq!(collector.event_count(), MAX_EVENTS);
        assert_eq!(collector.get_stats().corpus_reloads, MAX_EVENTS + 25);
        match collector.recent_events(1).as_slice() {
            [TelemetryEvent::CorpusReloaded { documents, .. }] => {
                assert_eq!(*documents, MAX_EVENTS + 24)
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_clones_share_state() {
        let collector = TelemetryCollector::new();
        let clone = collector.clone();
        clone.record(TelemetryEvent::HeadingAmbiguity {
            document: "doc".to_string(),
            line_index: 4,
            winner: "outline_2",
            timestamp: Instant::now(),
        });
        assert_eq!(collector.get_stats().heading_ambiguities, 1);
    }

    #[test]
    fn test_answer_rate_without_queries() {
        let collector = TelemetryCollector::new();
        assert_eq!(collector.answer_rate(), 1.0);
    }
}
