//! # deep-research
//!
//! Command-line front end for the research orchestrator.
//!
//! ## Quick Start
//! ```bash
//! cargo run -- "How do solid-state batteries work?" --depth 2 --breadth 3
//! ```

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use deep_research::research::output_path;
use deep_research::{
    Clarification, Config, DetailLevel, QueryClarifier, QuickSearch, ResearchConfig, ResearchError,
    ResearchOrchestrator, ResearchResult, ResearchServices, TracingObserver,
};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "deep-research",
    version,
    about = "Multi-round web research that compiles a cited markdown report",
    long_about = r#"
deep-research - plan, search, reflect and report.

Each run:
  1. Drafts a research plan for the query
  2. Generates sub-queries and searches the web for each, in batches
  3. Filters results for relevance, reads the pages and rates their reliability
  4. Reflects on the findings and repeats for DEPTH rounds
  5. Compiles a report with numbered citations

CONFIGURATION (environment or .env):
  LLM_PROVIDER          ollama | openai           (default: ollama)
  OLLAMA_MODEL          model name                (default: llama3.2)
  OLLAMA_API_BASE_URL   Ollama server             (default: http://localhost:11434)
  OPENAI_MODEL          model name                (default: gpt-4o-mini)
  SEARCH_PROVIDER       duckduckgo | tavily | all (default: duckduckgo)
  TAVILY_API_KEY        required for tavily

EXAMPLES:
  deep-research "What are the latest developments in Rust async?"
  deep-research -d 3 -b 5 --detail medium "Perovskite solar cell stability"
  deep-research -o report.md --show-trace "History of the QUIC protocol"
  deep-research --clarify --output-dir reports "Heat pump adoption"
  deep-research --quick "Current LTS release of Node.js"
  deep-research --render reports/saved.json
"#
)]
struct Args {
    /// The research question to investigate
    #[arg(value_name = "QUERY", required_unless_present = "render")]
    query: Option<String>,

    /// Research rounds (overrides RESEARCH_DEPTH)
    #[arg(short = 'd', long = "depth")]
    depth: Option<usize>,

    /// Sub-queries per round (overrides RESEARCH_BREADTH)
    #[arg(short = 'b', long = "breadth")]
    breadth: Option<usize>,

    /// Model for the configured LLM provider
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// Write the report here instead of stdout (.json for JSON)
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Write the report to an auto-named file in this directory
    #[arg(long = "output-dir", value_name = "DIR", conflicts_with = "output")]
    output_dir: Option<PathBuf>,

    /// Answer a few follow-up questions to refine the query first
    #[arg(long = "clarify")]
    clarify: bool,

    /// Single search with a summary of the results, no research rounds
    #[arg(long = "quick")]
    quick: bool,

    /// Print a result saved earlier as JSON instead of researching
    #[arg(long = "render", value_name = "FILE", conflicts_with_all = ["query", "quick", "clarify"])]
    render: Option<PathBuf>,

    /// Report detail level: low, medium or high
    #[arg(long = "detail", default_value = "high")]
    detail: DetailLevel,

    /// Append the significant chain-of-thought entries to the report
    #[arg(long = "show-trace")]
    show_trace: bool,

    /// Allow the report to open with an Objective section
    #[arg(long = "include-objective")]
    include_objective: bool,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env()?;
    init_logging(args.verbose, &config.log_level)?;

    if let Some(path) = &args.render {
        let result = ResearchResult::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        emit_result(&result, args.output.as_deref(), args.show_trace)?;
        return Ok(());
    }

    if let Some(model) = &args.model {
        info!(model = %model, "Using model from command line");
        config.set_model(model.clone());
    }
    config.validate()?;

    let depth = args.depth.unwrap_or(config.research_depth);
    let breadth = args.breadth.unwrap_or(config.research_breadth);

    let research = ResearchConfig::default()
        .with_detail_level(args.detail)
        .with_include_objective(args.include_objective);
    research.validate()?;

    info!(
        provider = ?config.llm_provider,
        model = %config.active_model(),
        search = ?config.search_provider,
        depth,
        breadth,
        "Configuration loaded"
    );

    let services = config.build_services(&research)?;
    let query = args.query.clone().context("A query is required")?;
    let destination = args.output.clone().or_else(|| {
        args.output_dir
            .as_ref()
            .map(|dir| output_path(dir, &query, "md", chrono::Utc::now()))
    });
    let query = if args.clarify {
        clarify(&services, &research, &query).await?
    } else {
        query
    };

    if args.quick {
        let quick = QuickSearch::new(&services, &research);
        let result = quick
            .run(&query, args.detail == DetailLevel::High)
            .await
            .map_err(fail)?;
        let markdown = result.to_markdown();
        match &destination {
            Some(path) => {
                write_file(path, &markdown)?;
                println!("Summary saved to {}", path.display());
            }
            None => println!("{}", markdown),
        }
        return Ok(());
    }

    let orchestrator =
        ResearchOrchestrator::new(services, research).with_observer(Arc::new(TracingObserver));

    let result = orchestrator
        .run(&query, depth, breadth)
        .await
        .map_err(fail)?;

    emit_result(&result, destination.as_deref(), args.show_trace)?;

    info!(
        sources = result.stats.sources_count,
        elapsed = %result.stats.elapsed_formatted,
        "Research completed successfully"
    );
    Ok(())
}

/// Report a failed run on stderr before handing the error to `main`
fn fail(e: ResearchError) -> anyhow::Error {
    error!(error = %e, "Research failed");
    eprintln!("\nResearch failed: {}", e);
    print_tip(&e);
    e.into()
}

fn emit_result(result: &ResearchResult, path: Option<&Path>, show_trace: bool) -> Result<()> {
    match path {
        Some(path) => {
            result.save_to_file(path, show_trace)?;
            info!(path = %path.display(), "Report saved");
            println!("Report saved to {}", path.display());
        }
        None => {
            println!("\n{}", "=".repeat(60));
            println!("RESEARCH REPORT");
            println!("{}\n", "=".repeat(60));
            println!("{}", result.to_markdown(show_trace));
        }
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))
}

// =============================================================================
// QUERY CLARIFICATION
// =============================================================================
/// Ask the model's follow-up questions on stderr and refine the query.
///
/// Any failure along the way keeps the original query.
async fn clarify(services: &ResearchServices, research: &ResearchConfig, query: &str) -> Result<String> {
    let clarifier = QueryClarifier::new(services.llm.clone(), research.llm_timeout);
    let questions = match clarifier.questions(query).await {
        Ok(questions) if !questions.is_empty() => questions,
        Ok(_) => return Ok(query.to_string()),
        Err(e) => {
            warn!(error = %e, "Could not generate clarifying questions");
            return Ok(query.to_string());
        }
    };

    eprintln!("\nA few questions to focus the research (press Enter to skip one):");
    let clarifications = ask_questions(&questions, std::io::stdin().lock(), std::io::stderr())?;
    let refined = clarifier.refine(query, &clarifications).await;
    if refined != query {
        eprintln!("\nRefined research context:\n{}\n", refined);
    }
    Ok(refined)
}

/// One line of input per question; stops early at end of input
fn ask_questions(
    questions: &[String],
    mut input: impl BufRead,
    mut output: impl Write,
) -> std::io::Result<Vec<Clarification>> {
    let mut clarifications = Vec::with_capacity(questions.len());
    for question in questions {
        write!(output, "\n{}\n> ", question)?;
        output.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            break;
        }
        clarifications.push(Clarification {
            question: question.clone(),
            answer: answer.trim().to_string(),
        });
    }
    Ok(clarifications)
}

/// Hints for the failures users hit most often
fn print_tip(e: &ResearchError) {
    match e {
        ResearchError::TotalAcquisitionFailure { .. } => {
            eprintln!("\nTip: every search failed. Check your network connection,");
            eprintln!("     or try SEARCH_PROVIDER=tavily with a TAVILY_API_KEY.");
        }
        ResearchError::InvalidRequest(_) => {
            eprintln!("\nTip: see --help for the accepted depth and breadth ranges.");
        }
        _ => {}
    }
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Logs go to stderr so stdout carries only the report.
///
/// `--verbose` forces debug; otherwise RUST_LOG (or its config default) applies.
fn init_logging(verbose: bool, log_level: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
