//! CLI command implementations

pub mod plan;
pub mod report;
pub mod simulate;

pub use plan::PlanArgs;
pub use report::ReportArgs;
pub use simulate::SimulateArgs;

use abtest_engine::{ExperimentStatus, MetricType};
use clap::ValueEnum;

/// Metric type as given on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricArg {
    Continuous,
    Binary,
    Count,
}

impl From<MetricArg> for MetricType {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Continuous => MetricType::Continuous,
            MetricArg::Binary => MetricType::Binary,
            MetricArg::Count => MetricType::Count,
        }
    }
}

/// Experiment status filter
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusArg {
    Draft,
    Running,
    Stopped,
    Completed,
}

impl From<StatusArg> for ExperimentStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Draft => ExperimentStatus::Draft,
            StatusArg::Running => ExperimentStatus::Running,
            StatusArg::Stopped => ExperimentStatus::Stopped,
            StatusArg::Completed => ExperimentStatus::Completed,
        }
    }
}
