//! Headless grid simulation runner.
//!
//! This binary runs the grid simulation without any embedding host,
//! controlled from the command line. Designed for CI testing, determinism
//! verification, and benchmarking.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in demo scenario for 100 steps
//! cargo run -p grid_headless -- run --steps 100
//!
//! # Run a scenario file, printing stats every step
//! cargo run -p grid_headless -- run --scenario line.ron --steps 1000 --stats
//!
//! # Verify determinism by running the same scenario multiple times
//! cargo run -p grid_headless -- verify --steps 500 --runs 5
//!
//! # Measure steps/second
//! cargo run -p grid_headless -- benchmark --steps 100000
//! ```
//!
//! # Output
//!
//! Stats (stdout): JSON, one object per line
//! Logs (stderr): Debug information

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grid_headless::runner::{verify_determinism, Runner, RunnerError};
use grid_headless::scenario::Scenario;

#[derive(Parser)]
#[command(name = "grid_headless")]
#[command(about = "Headless grid simulation runner for CI and benchmarking")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single scenario
    Run {
        /// Scenario file to load (built-in demo when omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of steps to simulate
        #[arg(long, default_value = "100")]
        steps: u64,

        /// Output stats after every step
        #[arg(long)]
        stats: bool,
    },

    /// Verify determinism by running the same scenario multiple times
    Verify {
        /// Scenario file to test (built-in demo when omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of steps per run
        #[arg(long, default_value = "500")]
        steps: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Run N steps for benchmarking
    Benchmark {
        /// Number of steps to run
        #[arg(long, default_value = "100000")]
        steps: u64,

        /// Scenario to benchmark (built-in demo when omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logging goes to stderr; stdout carries the stats stream.
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            scenario,
            steps,
            stats,
        }) => cmd_run(scenario, steps, stats),
        Some(Commands::Verify {
            scenario,
            steps,
            runs,
        }) => cmd_verify(scenario, steps, runs),
        Some(Commands::Benchmark { steps, scenario }) => cmd_benchmark(steps, scenario),
        None => cmd_run(None, 100, false),
    };

    if let Err(e) = result {
        eprintln!("FATAL: {e}");
        std::process::exit(1);
    }
}

fn load_scenario(path: Option<PathBuf>) -> Result<Scenario, RunnerError> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading scenario");
            Ok(Scenario::load(path)?)
        }
        None => Ok(Scenario::demo_line()),
    }
}

/// Run a single scenario
fn cmd_run(scenario: Option<PathBuf>, steps: u64, stats: bool) -> Result<(), RunnerError> {
    let scenario = load_scenario(scenario)?;
    tracing::info!(scenario = %scenario.name, steps, "starting run");

    let mut runner = Runner::from_scenario(&scenario)?;
    for _ in 0..steps {
        let step_stats = runner.step();
        if stats {
            println!("{}", serde_json::to_string(&step_stats)?);
        }
    }

    let summary = runner.summary();
    println!("{}", serde_json::to_string(&summary)?);
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("RUN COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Steps: {}", summary.steps);
    eprintln!("Emitted: {}", summary.total_emitted);
    eprintln!("Delivered: {}", summary.total_distributed);
    eprintln!("Lost: {}", summary.total_lost);
    eprintln!("Still buffered: {}", summary.buffered);
    Ok(())
}

/// Verify determinism
fn cmd_verify(scenario: Option<PathBuf>, steps: u64, runs: u32) -> Result<(), RunnerError> {
    let scenario = load_scenario(scenario)?;
    tracing::info!(scenario = %scenario.name, steps, runs, "verifying determinism");

    if verify_determinism(&scenario, steps, runs)? {
        eprintln!("PASS: All {runs} runs produced identical results");
        Ok(())
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        std::process::exit(1);
    }
}

/// Run benchmark
fn cmd_benchmark(steps: u64, scenario: Option<PathBuf>) -> Result<(), RunnerError> {
    let scenario = load_scenario(scenario)?;
    tracing::info!(scenario = %scenario.name, steps, "running benchmark");

    let mut runner = Runner::from_scenario(&scenario)?;

    // Warmup
    for _ in 0..100 {
        runner.step();
    }

    let start = Instant::now();
    for _ in 0..steps {
        runner.step();
    }
    let elapsed = start.elapsed();

    let sps = steps as f64 / elapsed.as_secs_f64();
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BENCHMARK RESULTS");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Steps: {steps}");
    eprintln!("Duration: {:.3}s", elapsed.as_secs_f64());
    eprintln!("Steps/second: {sps:.1}");
    eprintln!("Fingerprint: {:016x}", runner.fingerprint());
    Ok(())
}
