#![warn(missing_docs)]
//! Parabench CLI
//!
//! Command-line front end for the benchmark harness: parses arguments,
//! layers them over `parabench.toml` defaults, wires Ctrl-C to the
//! cancellation token, and drives one benchmark invocation.
//!
//! # Example
//!
//! ```text
//! parabench ./my-program --iterations 10 --fork --jobs 4
//! parabench ./my-program --compare-to 20260301T120000123-1a2b
//! ```

mod config;
mod executor;
mod interrupt;

pub use config::{HarnessConfig, RunnerConfig, StorageConfig};
pub use executor::{run_analysis, AnalysisOutcome, BenchmarkPlan, HarnessError};

use clap::Parser;
use parabench_core::{default_concurrency_cap, CancelToken, Strategy, METRIC_WALL_TIME_MS};
use std::path::PathBuf;
use std::time::Duration;

/// Parabench CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "parabench")]
#[command(author, version, about = "Parabench - benchmark harness for executables")]
pub struct Cli {
    /// Path to the executable to benchmark
    pub target: PathBuf,

    /// Number of iterations to run
    #[arg(long, short = 'n')]
    pub iterations: Option<u64>,

    /// Run each iteration in a forked OS process (full memory isolation)
    #[arg(long, conflicts_with_all = ["thread", "subshell"])]
    pub fork: bool,

    /// Run iterations on a fixed-size thread pool
    #[arg(long, conflicts_with_all = ["fork", "subshell"])]
    pub thread: bool,

    /// Run each iteration under an isolated shell with a clean environment
    #[arg(long, conflicts_with_all = ["fork", "thread"])]
    pub subshell: bool,

    /// Upper bound on concurrent workers (defaults to the logical core count)
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,

    /// Arguments forwarded to the target program
    #[arg(long, allow_hyphen_values = true)]
    pub args: Option<String>,

    /// Root directory for analysis records
    #[arg(long, short = 'o')]
    pub output_dir: Option<PathBuf>,

    /// Compare the new record against a prior analysis id
    #[arg(long)]
    pub compare_to: Option<String>,

    /// Per-iteration timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Iteration preset: light (3), medium (5), heavy (10)
    #[arg(long, value_parser = ["light", "medium", "heavy"])]
    pub test_level: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run the Parabench CLI. This is the binary's entry point.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(Cli::parse())
}

/// Run the Parabench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("parabench=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("parabench=info")
            .init();
    }

    let config = HarnessConfig::discover().unwrap_or_default();
    let plan = build_plan(&cli, &config);

    let cancel = CancelToken::new();
    interrupt::install(&cancel);

    let outcome = run_analysis(&plan, &cancel)?;
    print_summary(&outcome);

    Ok(())
}

/// Layer CLI flags over `parabench.toml` defaults into an executable plan.
fn build_plan(cli: &Cli, config: &HarnessConfig) -> BenchmarkPlan {
    let strategy = if cli.fork {
        Strategy::ForkedProcess
    } else if cli.thread {
        Strategy::ThreadPool
    } else if cli.subshell {
        Strategy::IsolatedShell
    } else {
        Strategy::Sequential
    };

    // Explicit --iterations wins over the preset, the preset over the
    // config file default.
    let iterations = cli
        .iterations
        .or_else(|| cli.test_level.as_deref().map(test_level_iterations))
        .unwrap_or(config.runner.iterations);

    let concurrency_cap = cli
        .jobs
        .or(config.runner.concurrency_cap)
        .unwrap_or_else(default_concurrency_cap)
        .max(1);

    let timeout = Duration::from_secs(cli.timeout.unwrap_or(config.runner.timeout_secs));

    let target_args = cli
        .args
        .as_deref()
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    BenchmarkPlan {
        target: cli.target.clone(),
        target_args,
        strategy,
        iterations,
        concurrency_cap,
        timeout,
        output_dir: cli
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.storage.output_dir)),
        compare_to: cli.compare_to.clone(),
    }
}

/// Iteration presets from the test level flag.
fn test_level_iterations(level: &str) -> u64 {
    match level {
        "light" => 3,
        "heavy" => 10,
        _ => 5,
    }
}

/// One status line per run, in the shape `ID: mean±stddev (success N/M)`.
fn print_summary(outcome: &AnalysisOutcome) {
    let record = &outcome.record;
    let total = record.samples.len();
    let succeeded = record.samples.iter().filter(|s| !s.failed).count();

    let wall = record.aggregates.get(METRIC_WALL_TIME_MS);
    match wall.and_then(|w| w.mean.zip(w.stddev)) {
        Some((mean, stddev)) => println!(
            "{}: {:.3}ms±{:.3}ms (success {}/{})",
            record.id, mean, stddev, succeeded, total
        ),
        None => println!(
            "{}: all iterations failed (success 0/{})",
            record.id, total
        ),
    }
    println!("record: {}", outcome.record_path.display());
    if let Some(path) = &outcome.comparison_path {
        println!("comparison: {}", path.display());
    }
}
