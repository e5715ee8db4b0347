//! Interactive question loop
//!
//! Each line is either a slash command or a question. `/reload` re-reads the
//! knowledge directory; queries in flight keep the snapshot they started with.

pub mod commands;
pub mod input;

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::cli::Verbosity;
use crate::corpus::load_directory;
use crate::generation::{generate_with_progress, Generator};
use crate::rag::PromptBuilder;
use crate::retrieval::KnowledgeEngine;
use crate::telemetry::TelemetryDisplay;

pub use commands::Command;
pub use input::{InputEvent, InputHandler};

/// Interactive session over a shared engine
pub struct ReplSession<'a> {
    engine: &'a KnowledgeEngine,
    knowledge_dir: PathBuf,
    generator: Option<Box<dyn Generator>>,
    prompts: PromptBuilder,
    verbosity: Verbosity,
}

impl<'a> ReplSession<'a> {
    pub fn new(engine: &'a KnowledgeEngine, knowledge_dir: PathBuf, verbosity: Verbosity) -> Self {
        Self {
            engine,
            knowledge_dir,
            generator: None,
            prompts: PromptBuilder::new(),
            verbosity,
        }
    }

    /// Forward answers to `generator`
    pub fn with_generator(mut self, generator: Box<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub async fn run(&mut self, mut input: InputHandler) -> Result<()> {
        println!(
            "{} {} documents loaded. Type {} for commands.",
            "kbqa".bold().cyan(),
            self.engine.registry().document_count(),
            "/help".cyan()
        );

        loop {
            let line = match input.read_line()? {
                InputEvent::Line(line) => line,
                InputEvent::Interrupted => continue,
                InputEvent::Eof => break,
            };
            if line.is_empty() {
                continue;
            }

            match commands::parse(&line) {
                Some(command) => {
                    if !self.execute(command)? {
                        break;
                    }
                }
                None => match self.answer(&line).await {
                    Ok(text) => println!("{}\n", text),
                    Err(e) => eprintln!("{} {:#}", "Error:".red(), e),
                },
            }
        }

        input.save_history()?;
        Ok(())
    }

    /// Answer one question, optionally through the generator
    pub async fn answer(&self, question: &str) -> Result<String> {
        let outcome = self.engine.answer_query(question);

        let Some(generator) = &self.generator else {
            return Ok(outcome.render(question));
        };

        let prompt = self.prompts.build(question, &outcome);
        let generated = generate_with_progress(
            generator.as_ref(),
            &prompt.text,
            self.verbosity.show_progress(),
        )
        .await
        .context("generation failed")?;

        Ok(match outcome.answer() {
            Some(answer) => format!("{}\n{}", generated, format!("[来源: {}]", answer.source_label()).dimmed()),
            None => generated,
        })
    }

    /// Returns false when the session should end
    pub fn execute(&self, command: Command) -> Result<bool> {
        match command {
            Command::Help => println!("{}", commands::HELP),
            Command::Reload => self.reload()?,
            Command::Stats => {
                TelemetryDisplay::new(self.engine.telemetry().clone(), self.verbosity)
                    .display_summary();
            }
            Command::Sources => match self.engine.registry().snapshot() {
                Some(corpus) => {
                    for filename in corpus.filenames() {
                        println!("  {}", filename);
                    }
                }
                None => println!("{}", "No corpus loaded.".yellow()),
            },
            Command::Exit => return Ok(false),
            Command::Unknown { input } => {
                println!("{}", format!("Unknown command: {}", input).red());
                println!("Type {} for available commands", "/help".cyan());
            }
        }
        Ok(true)
    }

    fn reload(&self) -> Result<()> {
        let documents = load_directory(&self.knowledge_dir)
            .with_context(|| format!("loading {:?}", self.knowledge_dir))?;
        match self.engine.reinitialize_corpus(documents) {
            Ok(stats) => println!(
                "{}",
                format!("Reloaded {} documents.", stats.loaded_count).green()
            ),
            // The previous corpus stays active
            Err(e) => println!("{} {}", "Reload skipped:".yellow(), e),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::KnowledgeDocument;
    use crate::errors::Result as KbqaResult;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct CannedGenerator;

    #[async_trait]
    impl Generator for CannedGenerator {
        async fn generate(&self, prompt: &str) -> KbqaResult<String> {
            Ok(if prompt.contains("参考信息") {
                "需要身份证".to_string()
            } else {
                "不知道".to_string()
            })
        }

        fn name(&self) -> String {
            "canned".to_string()
        }
    }

    fn engine() -> KnowledgeEngine {
        let engine = KnowledgeEngine::default();
        engine
            .reinitialize_corpus(vec![KnowledgeDocument::from_title(
                "admissions",
                "## 入学材料\n身份证、学籍证明、照片",
            )])
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn test_answer_without_generator() {
        let engine = engine();
        let session = ReplSession::new(&engine, PathBuf::from("."), Verbosity::Quiet);
        let text = session.answer("入学需要准备哪些材料？").await.unwrap();
        assert_eq!(text, "## 入学材料 身份证、学籍证明、照片 [来源: admissions]");
    }

    #[tokio::test]
    async fn test_answer_with_generator() {
        let engine = engine();
        let session = ReplSession::new(&engine, PathBuf::from("."), Verbosity::Quiet)
            .with_generator(Box::new(CannedGenerator));

        let grounded = session.answer("入学需要准备哪些材料？").await.unwrap();
        assert!(grounded.starts_with("需要身份证"));
        assert!(grounded.contains("admissions"));

        let ungrounded = session.answer("食堂几点开门").await.unwrap();
        assert_eq!(ungrounded, "不知道");
    }

    #[test]
    fn test_reload_swaps_corpus() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("dorm.txt"), "## 宿舍\n四人间").unwrap();

        let engine = engine();
        let session = ReplSession::new(&engine, dir.path().to_path_buf(), Verbosity::Quiet);
        assert!(session.execute(Command::Reload).unwrap());

        let corpus = engine.registry().snapshot().unwrap();
        assert_eq!(corpus.filenames(), vec!["dorm.txt"]);
    }

    #[test]
    fn test_reload_of_empty_directory_keeps_corpus() {
        let dir = TempDir::new().unwrap();
        let engine = engine();
        let session = ReplSession::new(&engine, dir.path().to_path_buf(), Verbosity::Quiet);
        assert!(session.execute(Command::Reload).unwrap());
        assert_eq!(engine.registry().document_count(), 1);
    }

    #[test]
    fn test_exit_command() {
        let engine = engine();
        let session = ReplSession::new(&engine, PathBuf::from("."), Verbosity::Quiet);
        assert!(!session.execute(Command::Exit).unwrap());
        assert!(session.execute(Command::Stats).unwrap());
    }
}
