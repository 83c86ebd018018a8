//! A/B experimentation CLI
//!
//! Plans, simulates and reports on A/B experiments using the engine crate.

use abtest_cli::{
    commands::{PlanArgs, ReportArgs, SimulateArgs},
    CliResult,
};
use abtest_config::{EngineConfig, ObservabilityConfig};
use abtest_engine::ExperimentEngine;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "abtest",
    version,
    about = "A/B experimentation engine - plan, simulate and report on experiments",
    long_about = "Command-line front end for the A/B experimentation engine.\n\n\
                  Commands:\n\
                  - plan: required sample size and achieved power\n\
                  - simulate: run a synthetic experiment end to end\n\
                  - report: inspect a saved experiment snapshot"
)]
struct Cli {
    /// Configuration file
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        env = "ABTEST_CONFIG",
        help = "Path to a YAML configuration file"
    )]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, help = "Enable debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample size planning
    #[command(name = "plan", about = "Compute the sample size an experiment needs")]
    Plan(PlanArgs),

    /// Synthetic experiment
    #[command(name = "simulate", about = "Run a simulated experiment end to end")]
    Simulate(SimulateArgs),

    /// Snapshot report
    #[command(name = "report", about = "Report on experiments in a snapshot file")]
    Report(ReportArgs),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = EngineConfig::load(cli.config.clone())?;

    // Initialize tracing
    init_tracing(&config.observability, cli.verbose);

    let engine = ExperimentEngine::new(&config);

    match &cli.command {
        Commands::Plan(args) => args.execute(&config)?,
        Commands::Simulate(args) => args.execute(&engine)?,
        Commands::Report(args) => args.execute(&engine)?,
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(observability: &ObservabilityConfig, verbose: bool) {
    let default_directive = if verbose {
        "abtest_engine=debug,abtest_cli=debug,info".to_string()
    } else {
        observability.log_level.clone()
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let registry = tracing_subscriber::registry().with(filter);

    if observability.json_logging {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
