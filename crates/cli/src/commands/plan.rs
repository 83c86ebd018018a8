//! Plan command - size an experiment before it starts

use abtest_config::EngineConfig;
use abtest_engine::{SampleSizeCalculator, VarianceModel};
use clap::Args;
use colored::Colorize;

use crate::{CliError, CliResult};

/// Sample size planning arguments
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Baseline conversion rate or mean
    #[arg(long)]
    pub baseline: f64,

    /// Minimum detectable effect, relative to the baseline (0.1 = 10%)
    #[arg(long)]
    pub mde: f64,

    /// Significance level (defaults to the configured value)
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Statistical power (defaults to the configured value)
    #[arg(long)]
    pub power: Option<f64>,

    /// Known standard deviation of the metric
    #[arg(long, conflicts_with = "cv")]
    pub std_dev: Option<f64>,

    /// Coefficient of variation of the metric
    #[arg(long)]
    pub cv: Option<f64>,

    /// Also report the power reached with this many observations per arm
    #[arg(long, value_name = "N")]
    pub per_arm: Option<u64>,
}

/// Planning outcome
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub per_arm: u64,
    /// Subjects to enroll so the smaller arm reaches `per_arm`
    pub total_subjects: u64,
    pub alpha: f64,
    pub power: f64,
    /// Power at the requested per-arm size, if one was given
    pub achieved_power: Option<(u64, f64)>,
}

impl PlanArgs {
    pub fn calculator(&self, config: &EngineConfig) -> CliResult<SampleSizeCalculator> {
        let alpha = self.alpha.unwrap_or(config.analysis.significance_level);
        let power = self.power.unwrap_or(config.analysis.power);

        let mut calculator = SampleSizeCalculator::new(self.baseline, self.mde, alpha, power)?;

        if let Some(std_dev) = self.std_dev {
            calculator = calculator.with_variance_model(VarianceModel::Variance(std_dev * std_dev));
        } else if let Some(cv) = self.cv {
            calculator = calculator.with_variance_model(VarianceModel::CoefficientOfVariation(cv));
        }

        Ok(calculator)
    }

    pub fn plan(&self, config: &EngineConfig) -> CliResult<Plan> {
        let calculator = self.calculator(config)?;
        let per_arm = calculator.calculate()?;

        let split = config.analysis.traffic_split;
        let smaller_share = split.min(1.0 - split);
        if smaller_share <= 0.0 {
            return Err(CliError::InvalidArgument(format!(
                "traffic split {} leaves an arm empty",
                split
            )));
        }
        let total_subjects = (per_arm as f64 / smaller_share).ceil() as u64;

        let achieved_power = match self.per_arm {
            Some(n) => Some((n, calculator.achieved_power(n)?)),
            None => None,
        };

        Ok(Plan {
            per_arm,
            total_subjects,
            alpha: calculator.alpha,
            power: calculator.power,
            achieved_power,
        })
    }

    /// Execute the plan command
    pub fn execute(&self, config: &EngineConfig) -> CliResult<()> {
        let plan = self.plan(config)?;

        println!("{}", "Sample Size Plan".bold().cyan());
        println!("  Baseline:          {}", self.baseline);
        println!("  Detectable effect: {:+.1}%", self.mde * 100.0);
        println!("  Alpha:             {}", plan.alpha);
        println!("  Power:             {}", plan.power);
        println!();
        println!(
            "  Per arm:           {}",
            plan.per_arm.to_string().green().bold()
        );
        println!(
            "  Total subjects:    {} (traffic split {})",
            plan.total_subjects, config.analysis.traffic_split
        );

        if let Some((n, power)) = plan.achieved_power {
            let label = format!("{:.1}%", power * 100.0);
            println!(
                "  Power at {} per arm: {}",
                n,
                if power >= plan.power {
                    label.green()
                } else {
                    label.yellow()
                }
            );
        }

        Ok(())
    }
}
