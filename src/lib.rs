//! kbqa - heuristic question answering over plain-text knowledge documents
//!
//! # Architecture
//!
//! - **corpus**: ingested documents and the atomically swapped registry
//! - **parser**: documents → headings, lines, QA pairs, sentences
//! - **query** / **scoring**: query profile and lexical relevance signals
//! - **assembler**: left-to-right passage state machine
//! - **retrieval**: per-document fallback cascade and cross-document selection
//! - **rag** / **generation**: prompt composition and the Ollama client
//!
//! ```no_run
//! use kbqa::{KnowledgeDocument, KnowledgeEngine};
//!
//! let engine = KnowledgeEngine::default();
//! engine.reinitialize_corpus(vec![KnowledgeDocument::from_title(
//!     "admissions",
//!     "## 入学材料\n身份证、学籍证明、照片",
//! )])?;
//! println!("{}", engine.answer_query("入学需要准备哪些材料？").render("入学需要准备哪些材料？"));
//! # Ok::<(), kbqa::KbqaError>(())
//! ```

pub mod errors;

pub use errors::{KbqaError, Result};

// Retrieval core
pub mod assembler;
pub mod corpus;
pub mod parser;
pub mod query;
pub mod retrieval;
pub mod scoring;

pub use corpus::{Corpus, CorpusRegistry, KnowledgeDocument, ReloadStats};
pub use retrieval::{KnowledgeEngine, MatchStrategy, QueryOutcome, RankedAnswer, Retriever};

// Interface layer
pub mod cli;
pub mod config;
pub mod generation;
pub mod rag;
pub mod repl;
pub mod telemetry;
