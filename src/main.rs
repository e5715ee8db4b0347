//! kbqa - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use kbqa::{
    cli::{Args, Commands, Verbosity},
    config::Config,
    corpus::load_directory,
    generation::{generate_with_progress, Generator, OllamaGenerator},
    parser::{DocumentKind, StructuralUnit, StructureParser},
    rag::PromptBuilder,
    repl::{InputHandler, ReplSession},
    telemetry::TelemetryDisplay,
    KnowledgeDocument, KnowledgeEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let verbosity = args.verbosity();
    init_tracing(verbosity);

    if let Err(e) = args.validate() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(2);
    }

    let config = load_config(&args)?;
    if !config.telemetry.color_output {
        colored::control::set_override(false);
    }

    match &args.command {
        Some(Commands::Config) => show_config(&config),
        Some(Commands::Inspect { file }) => inspect(&config, file),
        Some(Commands::Start) => run_interactive(&args, &config, verbosity).await,
        None => {
            let query = args.query.as_deref().unwrap_or_default();
            answer_once(&args, &config, verbosity, query).await
        }
    }
}

/// `RUST_LOG` wins; otherwise the level follows -q / -v
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Config file, then command-line overrides
fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref()).context("loading configuration")?;

    if let Some(dir) = &args.knowledge_dir {
        config.paths.knowledge_dir = dir.to_string_lossy().into_owned();
    }
    if let Some(model) = &args.model {
        config.ollama.model = model.clone();
    }
    if let Some(host) = &args.host {
        config.ollama.host = host.clone();
    }
    if let Some(port) = args.port {
        config.ollama.port = port;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_engine(config: &Config) -> Result<KnowledgeEngine> {
    let dir = config.knowledge_dir();
    let documents =
        load_directory(&dir).with_context(|| format!("loading knowledge from {:?}", dir))?;

    let engine = KnowledgeEngine::new(config.retrieval.clone());
    let stats = engine
        .reinitialize_corpus(documents)
        .with_context(|| format!("no knowledge documents in {:?}", dir))?;
    tracing::info!(documents = stats.loaded_count, dir = %dir.display(), "knowledge base ready");
    Ok(engine)
}

fn build_generator(config: &Config) -> Result<Box<dyn Generator>> {
    let generator = OllamaGenerator::from_config(&config.ollama).context("creating Ollama client")?;
    Ok(Box::new(generator))
}

async fn answer_once(args: &Args, config: &Config, verbosity: Verbosity, query: &str) -> Result<()> {
    let engine = build_engine(config)?;
    let outcome = engine.answer_query(query);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if args.generate {
        let generator = build_generator(config)?;
        let prompt = PromptBuilder::new().build(query, &outcome);
        let text = generate_with_progress(generator.as_ref(), &prompt.text, verbosity.show_progress())
            .await
            .context("generation failed")?;
        println!("{}", text);
        if let Some(answer) = outcome.answer() {
            println!("{}", format!("[来源: {}]", answer.source_label()).dimmed());
        }
    } else {
        println!("{}", outcome.render(query));
    }

    if verbosity.show_events() && config.telemetry.show_summary {
        let display = TelemetryDisplay::new(engine.telemetry().clone(), verbosity);
        display.display_summary();
    }
    Ok(())
}

async fn run_interactive(args: &Args, config: &Config, verbosity: Verbosity) -> Result<()> {
    let engine = build_engine(config)?;
    let input = InputHandler::with_history(config.history_file())?;

    let mut session = ReplSession::new(&engine, config.knowledge_dir(), verbosity);
    if args.generate {
        session = session.with_generator(build_generator(config)?);
    }
    session.run(input).await?;

    if config.telemetry.show_summary {
        TelemetryDisplay::new(engine.telemetry().clone(), verbosity).display_summary();
    }
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("serializing configuration")?;
    if let Some(path) = Config::default_path() {
        println!("{} {}", "# default location:".dimmed(), path.display());
    }
    println!("{}", rendered);
    Ok(())
}

/// Print how one file is segmented
fn inspect(config: &Config, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file).with_context(|| format!("reading {:?}", file))?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .context("file name is not valid UTF-8")?;
    let title = file.file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
    let doc = KnowledgeDocument::new(title, filename, raw);

    let parser = StructureParser::new(config.retrieval.answer_list_marker.clone());
    let parsed = parser.parse(&doc);

    let kind = match parsed.kind {
        DocumentKind::AnswerList => "answer list",
        DocumentKind::FreeText => "free text",
    };
    println!("{} {} ({})", "Document:".bold(), doc.filename, kind);

    for unit in &parsed.units {
        match unit {
            StructuralUnit::QaPair(qa) => {
                println!("{:>5}  {} {}", qa.line_index + 1, "Q".cyan(), qa.question_text);
                match &qa.answer_text {
                    Some(answer) => println!("{:>5}  {} {}", "", "A".green(), answer),
                    None => println!("{:>5}  {}", "", "(no answer line)".dimmed()),
                }
            }
            StructuralUnit::Line(line) if line.is_heading() => {
                let level = line.heading_level.unwrap_or_default();
                println!("{:>5}  {} {}", line.line_index + 1, format!("H{}", level).cyan(), line.text);
            }
            StructuralUnit::Line(_) => {}
        }
    }

    if !parsed.ambiguities.is_empty() {
        println!("\n{}", "Ambiguous headings:".yellow().bold());
        for ambiguity in &parsed.ambiguities {
            println!(
                "{:>5}  {} (chose {}, also matched {})",
                ambiguity.line_index + 1,
                ambiguity.line,
                ambiguity.winner,
                ambiguity.shadowed.join(", ")
            );
        }
    }

    let headings = parsed.headings().count();
    let qa_pairs = parsed.qa_pairs().count();
    println!(
        "\n{} lines, {} headings, {} QA pairs",
        doc.raw_text.lines().count(),
        headings,
        qa_pairs
    );
    Ok(())
}
