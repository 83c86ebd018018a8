//! Simulate command - run a synthetic experiment end to end
//!
//! Subjects are routed through the engine's own bucketing, each arm draws
//! its metric from a known distribution, and the experiment is analyzed
//! once every subject has reported.

use abtest_engine::{ExperimentEngine, ExperimentResult, MetricType, Variant};
use clap::Args;
use colored::Colorize;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Bernoulli, Normal, Poisson};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

use super::MetricArg;
use crate::{output, CliError, CliResult};

/// Simulation arguments
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Experiment name
    #[arg(long, default_value = "simulated")]
    pub name: String,

    /// Metric type to simulate
    #[arg(long, value_enum, default_value_t = MetricArg::Binary)]
    pub metric: MetricArg,

    /// Number of subjects to enroll
    #[arg(long, default_value_t = 2000)]
    pub subjects: u64,

    /// Baseline conversion rate (binary) or mean (continuous, count)
    #[arg(long, default_value_t = 0.1)]
    pub baseline: f64,

    /// True relative effect of the treatment (0.2 = +20%)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub lift: f64,

    /// Standard deviation of continuous values (defaults to 25% of the mean)
    #[arg(long)]
    pub std_dev: Option<f64>,

    /// Per-arm minimum sample size (defaults to the configured value)
    #[arg(long)]
    pub min_sample_size: Option<u64>,

    /// Fraction of subjects routed to treatment (defaults to the configured value)
    #[arg(long)]
    pub traffic_split: Option<f64>,

    /// Random seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop the experiment before analyzing it
    #[arg(long)]
    pub stop: bool,

    /// Write the engine snapshot to this file
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,
}

/// Per-arm value generator
enum Arm {
    Continuous(Normal<f64>),
    Binary(Bernoulli),
    Count(Poisson<f64>),
}

impl Arm {
    fn new(metric_type: MetricType, mean: f64, std_dev: f64) -> CliResult<Self> {
        let arm = match metric_type {
            MetricType::Continuous => Arm::Continuous(
                Normal::new(mean, std_dev).map_err(|e| invalid("std-dev", e))?,
            ),
            MetricType::Binary => {
                Arm::Binary(Bernoulli::new(mean).map_err(|e| invalid("baseline/lift", e))?)
            }
            MetricType::Count => {
                Arm::Count(Poisson::new(mean).map_err(|e| invalid("baseline/lift", e))?)
            }
        };
        Ok(arm)
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        match self {
            Arm::Continuous(normal) => rng.sample(normal),
            Arm::Binary(bernoulli) => {
                if rng.sample(bernoulli) {
                    1.0
                } else {
                    0.0
                }
            }
            Arm::Count(poisson) => rng.sample(poisson),
        }
    }
}

fn invalid(what: &str, error: impl std::fmt::Display) -> CliError {
    CliError::InvalidArgument(format!("{}: {}", what, error))
}

impl SimulateArgs {
    /// Create, run and analyze a synthetic experiment on `engine`
    pub fn run(&self, engine: &ExperimentEngine) -> CliResult<(Uuid, ExperimentResult)> {
        let metric_type = MetricType::from(self.metric);
        let treatment_mean = self.baseline * (1.0 + self.lift);
        let std_dev = self.std_dev.unwrap_or(self.baseline.abs() * 0.25);

        let baseline_arm = Arm::new(metric_type, self.baseline, std_dev)?;
        let treatment_arm = Arm::new(metric_type, treatment_mean, std_dev)?;

        let mut config = engine
            .draft_config(
                self.name.clone(),
                format!("Simulated {} metric over {} subjects", metric_type, self.subjects),
                "simulated_metric",
                metric_type,
            )
            .with_hypothesis(format!("Treatment shifts the mean by {:+.1}%", self.lift * 100.0));
        if let Some(min_sample_size) = self.min_sample_size {
            config = config.with_min_sample_size(min_sample_size);
        }
        if let Some(traffic_split) = self.traffic_split {
            config = config.with_traffic_split(traffic_split);
        }

        let experiment_id = engine.create_experiment(config)?;
        engine.start(&experiment_id)?;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        for i in 0..self.subjects {
            let subject_id = format!("subject-{}", i);
            let value = match engine.variant_for(&experiment_id, &subject_id)? {
                Variant::Baseline => baseline_arm.sample(&mut rng),
                Variant::Treatment => treatment_arm.sample(&mut rng),
            };
            engine.record_event(&experiment_id, &subject_id, value)?;
        }
        info!(
            "Simulated {} subjects for experiment {}",
            self.subjects, experiment_id
        );

        if self.stop {
            engine.stop(&experiment_id)?;
        }

        let result = engine.analyze(&experiment_id)?;
        Ok((experiment_id, result))
    }

    /// Execute the simulate command
    pub fn execute(&self, engine: &ExperimentEngine) -> CliResult<()> {
        println!(
            "{} {} subjects, {} metric, true lift {:+.1}%",
            "Simulating".bold().cyan(),
            self.subjects,
            MetricType::from(self.metric),
            self.lift * 100.0
        );
        println!();

        let (experiment_id, _) = self.run(engine)?;

        if let Some(experiment) = engine.get_experiment(&experiment_id) {
            output::print_experiment(&experiment);
        }

        if let Some(path) = &self.snapshot {
            std::fs::write(path, engine.snapshot().to_json_pretty()?)?;
            println!();
            println!(
                "{} Snapshot written to {}",
                "✓".green().bold(),
                path.display()
            );
        }

        Ok(())
    }
}
