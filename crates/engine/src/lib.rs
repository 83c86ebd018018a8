//! A/B experimentation engine
//!
//! This crate assigns subjects to experiment arms, records observations and
//! compares the arms with frequentist hypothesis tests: Welch's t-test for
//! continuous metrics, the two-proportion z-test for binary metrics and the
//! Mann-Whitney U test for counts. It also provides sample-size planning and
//! a JSON snapshot of all experiments for an external persistence layer.

pub mod analyzer;
pub mod bucketing;
pub mod clock;
pub mod engine;
pub mod errors;
pub mod event_store;
pub mod experiment_manager;
pub mod sample_size;
pub mod snapshot;
pub mod statistical;

pub use analyzer::{analyze, select_test};
pub use bucketing::assign_variant;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::ExperimentEngine;
pub use errors::{EngineError, Result};
pub use experiment_manager::{AnalysisReport, CompletionReason, ExperimentManager};
pub use sample_size::{calculate_sample_size, SampleSizeCalculator, VarianceModel};
pub use snapshot::ExperimentSnapshot;
pub use statistical::{MannWhitneyU, StatisticalTest, WelchTTest, ZTest};

pub use abtest_types::{
    Event, Experiment, ExperimentConfig, ExperimentProgress, ExperimentResult, ExperimentStatus,
    MetricType, Recommendation, TestMethod, Variant,
};
