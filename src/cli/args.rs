//! Command-line argument parsing
//!
//! clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kbqa - answer questions from a directory of plain-text knowledge files
#[derive(Parser, Debug)]
#[command(name = "kbqa")]
#[command(version)]
#[command(about = "Heuristic question answering over plain-text knowledge documents", long_about = None)]
pub struct Args {
    /// Question to answer
    #[arg(value_name = "QUESTION")]
    pub query: Option<String>,

    /// Directory holding the *.txt knowledge documents
    #[arg(short = 'k', long)]
    pub knowledge_dir: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Pass the retrieved passage to the generation model
    #[arg(short, long)]
    pub generate: bool,

    /// Ollama model used with --generate
    #[arg(short, long)]
    pub model: Option<String>,

    /// Ollama host
    #[arg(long)]
    pub host: Option<String>,

    /// Ollama port
    #[arg(long)]
    pub port: Option<u16>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only the answer is printed)
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start interactive question mode
    Start,

    /// Show how a knowledge file is parsed (headings, QA pairs, ambiguities)
    Inspect {
        /// Knowledge file to inspect
        file: PathBuf,
    },

    /// Display current configuration
    Config,
}

/// Verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// A question or a subcommand is required, not both
    pub fn validate(&self) -> Result<(), String> {
        if self.command.is_none() && self.query.is_none() {
            return Err("Question required. Use 'kbqa <QUESTION>' or run a subcommand.".to_string());
        }

        if self.command.is_some() && self.query.is_some() {
            return Err("Cannot specify a question with a subcommand.".to_string());
        }

        Ok(())
    }
}

impl Verbosity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Telemetry summary and per-stage details
    pub fn show_events(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }

    /// Default `tracing` filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "info",
            Verbosity::VeryVerbose => "debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("kbqa").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(parse(&["q", "-q"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["q"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["q", "-v"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["q", "-vv"]).verbosity(), Verbosity::VeryVerbose);
    }

    #[test]
    fn test_query_and_options() {
        let args = parse(&["入学材料", "-k", "docs", "--json", "--port", "8080"]);
        assert_eq!(args.query.as_deref(), Some("入学材料"));
        assert_eq!(args.knowledge_dir, Some(PathBuf::from("docs")));
        assert!(args.json);
        assert_eq!(args.port, Some(8080));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_inspect_subcommand() {
        let args = parse(&["inspect", "knowledge/admissions.txt"]);
        assert_eq!(
            args.command,
            Some(Commands::Inspect {
                file: PathBuf::from("knowledge/admissions.txt")
            })
        );
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_query_or_command() {
        assert!(parse(&[]).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_both() {
        let args = Args {
            command: Some(Commands::Start),
            ..parse(&["question"])
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_verbosity_methods() {
        assert!(!Verbosity::Quiet.show_progress());
        assert!(Verbosity::Normal.show_progress());
        assert!(!Verbosity::Normal.show_events());
        assert!(Verbosity::Verbose.show_events());
        assert_eq!(Verbosity::Quiet.log_filter(), "error");
        assert_eq!(Verbosity::VeryVerbose.log_filter(), "debug");
    }
}
