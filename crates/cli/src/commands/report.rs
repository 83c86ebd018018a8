//! Report command - inspect a saved snapshot

use abtest_engine::{Experiment, ExperimentEngine, ExperimentSnapshot, ExperimentStatus};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::warn;

use super::StatusArg;
use crate::{output, CliResult};

/// Report arguments
#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Snapshot file written by `simulate --snapshot` or a persistence layer
    #[arg(value_name = "FILE")]
    pub snapshot: PathBuf,

    /// Only show experiments in this state
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,

    /// Re-run the analysis of every started experiment before reporting
    #[arg(long)]
    pub reanalyze: bool,
}

impl ReportArgs {
    /// Load the snapshot into `engine` and return the experiments to show
    pub fn load(&self, engine: &ExperimentEngine) -> CliResult<Vec<Experiment>> {
        let json = std::fs::read_to_string(&self.snapshot)?;
        let snapshot = ExperimentSnapshot::from_json(&json)?;
        engine.restore(snapshot)?;

        if self.reanalyze {
            for experiment in engine.list_experiments() {
                if experiment.status == ExperimentStatus::Draft {
                    continue;
                }
                // A failed analysis leaves the stored result in place
                if let Err(e) = engine.analyze(&experiment.id) {
                    warn!("Skipping reanalysis of {}: {}", experiment.id, e);
                }
            }
        }

        let experiments = match self.status {
            Some(status) => engine
                .manager()
                .list_by_status(ExperimentStatus::from(status)),
            None => engine.list_experiments(),
        };
        Ok(experiments)
    }

    /// Execute the report command
    pub fn execute(&self, engine: &ExperimentEngine) -> CliResult<()> {
        let experiments = self.load(engine)?;

        println!(
            "{} {} ({} experiments)",
            "Report for".bold().cyan(),
            self.snapshot.display(),
            experiments.len()
        );

        for experiment in &experiments {
            println!();
            output::print_experiment(experiment);
        }

        Ok(())
    }
}
