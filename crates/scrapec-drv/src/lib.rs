//! scrapec-drv - The `scrapec` command-line driver.
//!
//! Entry point and orchestrator for the whole pipeline:
//!
//! ```text
//! Script file (.scrape)
//!        │
//!        ▼
//!   [Lexer]  ──▶ tokens          (scrapec-lex)
//!        │
//!        ▼
//!   [Parser] ──▶ AST             (scrapec-par)
//!        │
//!        ▼
//!   [Interpreter + HttpDriver]   (scrapec-interp, scrapec-browser)
//!        │
//!        ▼
//!   rows ──▶ stdout JSON, optional .json / .csv file
//! ```
//!
//! With `--data`, the feed file is read once, the script's
//! `data_schema` block maps feed columns to `$variables`, and the
//! script runs once per feed record; the rows of all runs concatenate
//! in feed order.
//!
//! EXIT CODES:
//! -----------
//! - 0: clean run (or `--check` on a well-formed script)
//! - 1: runtime failure (`throw`, unknown reference, launch failure,
//!   unreadable input); accumulated rows are still printed
//! - 2: syntax error, reported with its line:column before anything
//!   executes

mod feed_input;
mod output;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use scrapec_browser::HttpDriver;
use scrapec_interp::{FeedRow, Interpreter, Row, RuntimeError};
use scrapec_lex::Lexer;
use scrapec_par::{Parser, Program};
use tracing_subscriber::EnvFilter;

/// ScrapeScript: a DSL for web scraping.
#[derive(Debug, ClapParser)]
#[command(name = "scrapec", version, about)]
pub struct Cli {
    /// Path to the ScrapeScript file.
    pub script: PathBuf,

    /// Write results to a file as well as stdout (.json or .csv).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Tabular input feed (.csv with headers, or a .json array of
    /// objects); the script runs once per record.
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Run the browser headless.
    #[arg(long)]
    pub headless: bool,

    /// Parse the script and exit without executing it.
    #[arg(long)]
    pub check: bool,

    /// Verbose output (per-statement trace on stderr).
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parses the CLI, runs, and maps the outcome to an exit code.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match try_run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        },
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    // Diagnostics go to stderr; stdout carries the result rows.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn try_run(cli: &Cli) -> Result<ExitCode> {
    let source = fs::read_to_string(&cli.script)
        .with_context(|| format!("could not read script '{}'", cli.script.display()))?;

    let program = match parse_source(&source) {
        Ok(program) => program,
        Err(message) => {
            eprintln!("syntax error: {message}");
            return Ok(ExitCode::from(2));
        },
    };

    if cli.check {
        println!("{}: syntax OK", cli.script.display());
        return Ok(ExitCode::SUCCESS);
    }

    let feed_rows = match &cli.data {
        Some(path) => feed_input::load(path, program.data_schema())?
            .into_iter()
            .map(Some)
            .collect(),
        None => vec![None],
    };

    // The whole pipeline is single-threaded cooperative; a
    // current-thread runtime is all it needs.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("could not start async runtime")?;

    let (rows, error) = runtime.block_on(execute_all(cli, &program, feed_rows));

    println!("{}", serde_json::to_string_pretty(&rows)?);

    if let Some(path) = &cli.output {
        output::save(path, &rows)?;
        eprintln!("results saved to {}", path.display());
    }

    match error {
        Some(e) => {
            eprintln!("error: {e}");
            Ok(ExitCode::from(1))
        },
        None => Ok(ExitCode::SUCCESS),
    }
}

/// Lexes and parses, folding both error kinds into one rendered
/// message with its source position.
fn parse_source(source: &str) -> Result<Program, String> {
    let tokens = Lexer::new(source).tokenize().map_err(|e| e.to_string())?;
    Parser::new(tokens).parse().map_err(|e| e.to_string())
}

/// Runs the program once per feed record (once total without a feed),
/// concatenating rows. Stops at the first fatal error, keeping the
/// rows accumulated so far.
async fn execute_all(
    cli: &Cli,
    program: &Program,
    feed_rows: Vec<Option<FeedRow>>,
) -> (Vec<Row>, Option<RuntimeError>) {
    let mut all_rows = Vec::new();

    for feed_row in feed_rows {
        let mut interpreter =
            Interpreter::new(HttpDriver::new()).with_headless(cli.headless);
        if let Some(feed_row) = feed_row {
            interpreter = interpreter.with_feed_row(feed_row);
        }

        let report = interpreter.execute(program).await;
        all_rows.extend(report.rows);

        if let Some(error) = report.error {
            return (all_rows, Some(error));
        }
    }

    (all_rows, None)
}
