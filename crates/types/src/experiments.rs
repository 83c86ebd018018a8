//! A/B testing and experiment types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{Result, ValidationError};
use crate::events::{Event, Variant};

/// Status of an experiment
///
/// `Draft -> Running -> {Stopped, Completed}`. Both end states are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Draft,
    Running,
    Stopped,
    Completed,
}

impl ExperimentStatus {
    /// Whether `operation` may be applied to an experiment in this state
    pub fn permits(&self, operation: Operation) -> bool {
        use ExperimentStatus::*;

        match operation {
            Operation::Start => *self == Draft,
            Operation::RecordEvent | Operation::Stop => *self == Running,
            Operation::Analyze => matches!(self, Running | Stopped | Completed),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExperimentStatus::Stopped | ExperimentStatus::Completed)
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExperimentStatus::Draft => "DRAFT",
            ExperimentStatus::Running => "RUNNING",
            ExperimentStatus::Stopped => "STOPPED",
            ExperimentStatus::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

/// Lifecycle operations guarded by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    RecordEvent,
    Stop,
    Analyze,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Start => "start",
            Operation::RecordEvent => "record event on",
            Operation::Stop => "stop",
            Operation::Analyze => "analyze",
        };
        f.write_str(s)
    }
}

/// Type of metric, which determines the hypothesis test
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// Real-valued measurements (latency, score, revenue)
    Continuous,
    /// 0/1 outcomes (conversion, success)
    Binary,
    /// Non-negative counts, often skewed
    Count,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricType::Continuous => "continuous",
            MetricType::Binary => "binary",
            MetricType::Count => "count",
        };
        f.write_str(s)
    }
}

/// Hypothesis test used for an analysis
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TestMethod {
    WelchTTest,
    TwoProportionZTest,
    MannWhitneyU,
}

impl fmt::Display for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestMethod::WelchTTest => "Welch's t-test",
            TestMethod::TwoProportionZTest => "Two-proportion z-test",
            TestMethod::MannWhitneyU => "Mann-Whitney U test",
        };
        f.write_str(s)
    }
}

/// Outcome of an analysis, as shown to the operator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    InsufficientData,
    RollOutTreatment,
    KeepBaseline,
    NoSignificantDifference,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::InsufficientData => "Insufficient data — continue collecting",
            Recommendation::RollOutTreatment => "Roll out treatment",
            Recommendation::KeepBaseline => "Keep baseline",
            Recommendation::NoSignificantDifference => "No significant difference detected",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Experiment definition, fixed once the experiment is created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentConfig {
    /// Experiment name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Hypothesis under test
    pub hypothesis: String,
    /// Name of the tracked metric
    pub metric_name: String,
    /// Metric type
    pub metric_type: MetricType,
    /// Label of the baseline model
    pub baseline_model: String,
    /// Label of the treatment model
    pub treatment_model: String,
    /// Fraction of subjects routed to treatment, in (0, 1)
    pub traffic_split: f64,
    /// Minimum observations required in each arm
    pub min_sample_size: u64,
    /// Maximum run time in days
    pub max_duration_days: u32,
    /// Significance level (alpha)
    pub significance_level: f64,
    /// Statistical power (1 - beta)
    pub power: f64,
}

impl ExperimentConfig {
    pub const DEFAULT_TRAFFIC_SPLIT: f64 = 0.5;
    pub const DEFAULT_MIN_SAMPLE_SIZE: u64 = 100;
    pub const DEFAULT_MAX_DURATION_DAYS: u32 = 14;
    pub const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.05;
    pub const DEFAULT_POWER: f64 = 0.80;

    /// Create a configuration with default split, sample size and test levels
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        metric_name: impl Into<String>,
        metric_type: MetricType,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            hypothesis: String::new(),
            metric_name: metric_name.into(),
            metric_type,
            baseline_model: "baseline".to_string(),
            treatment_model: "treatment".to_string(),
            traffic_split: Self::DEFAULT_TRAFFIC_SPLIT,
            min_sample_size: Self::DEFAULT_MIN_SAMPLE_SIZE,
            max_duration_days: Self::DEFAULT_MAX_DURATION_DAYS,
            significance_level: Self::DEFAULT_SIGNIFICANCE_LEVEL,
            power: Self::DEFAULT_POWER,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_hypothesis(mut self, hypothesis: impl Into<String>) -> Self {
        self.hypothesis = hypothesis.into();
        self
    }

    pub fn with_models(
        mut self,
        baseline_model: impl Into<String>,
        treatment_model: impl Into<String>,
    ) -> Self {
        self.baseline_model = baseline_model.into();
        self.treatment_model = treatment_model.into();
        self
    }

    pub fn with_traffic_split(mut self, traffic_split: f64) -> Self {
        self.traffic_split = traffic_split;
        self
    }

    pub fn with_min_sample_size(mut self, min_sample_size: u64) -> Self {
        self.min_sample_size = min_sample_size;
        self
    }

    pub fn with_max_duration_days(mut self, max_duration_days: u32) -> Self {
        self.max_duration_days = max_duration_days;
        self
    }

    pub fn with_significance_level(mut self, significance_level: f64) -> Self {
        self.significance_level = significance_level;
        self
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("name", "must not be empty"));
        }

        if self.description.trim().is_empty() {
            return Err(ValidationError::new("description", "must not be empty"));
        }

        if self.metric_name.trim().is_empty() {
            return Err(ValidationError::new("metric_name", "must not be empty"));
        }

        if !open_unit_interval(self.traffic_split) {
            return Err(ValidationError::new(
                "traffic_split",
                format!("must be in (0, 1), got {}", self.traffic_split),
            ));
        }

        if self.min_sample_size == 0 {
            return Err(ValidationError::new("min_sample_size", "must be positive"));
        }

        if self.max_duration_days == 0 {
            return Err(ValidationError::new("max_duration_days", "must be positive"));
        }

        if !open_unit_interval(self.significance_level) {
            return Err(ValidationError::new(
                "significance_level",
                format!("must be in (0, 1), got {}", self.significance_level),
            ));
        }

        if !open_unit_interval(self.power) {
            return Err(ValidationError::new(
                "power",
                format!("must be in (0, 1), got {}", self.power),
            ));
        }

        Ok(())
    }
}

fn open_unit_interval(value: f64) -> bool {
    value > 0.0 && value < 1.0
}

/// Statistical comparison of the two arms
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentResult {
    /// Test that produced the statistic
    pub method: TestMethod,
    pub baseline_count: u64,
    pub treatment_count: u64,
    pub baseline_mean: f64,
    pub treatment_mean: f64,
    /// t, z or U depending on `method`
    pub test_statistic: f64,
    /// Welch-Satterthwaite degrees of freedom (t-test only)
    pub degrees_of_freedom: Option<f64>,
    /// Two-tailed p-value
    pub p_value: f64,
    /// Confidence level of the interval (1 - alpha)
    pub confidence_level: f64,
    /// Interval for `treatment_mean - baseline_mean`
    pub confidence_interval: (f64, f64),
    /// Percent change of treatment mean against baseline mean
    pub relative_lift: f64,
    pub is_significant: bool,
    pub recommendation: Recommendation,
    /// When the analysis ran
    pub analyzed_at: DateTime<Utc>,
}

impl ExperimentResult {
    /// Absolute difference of means
    pub fn mean_difference(&self) -> f64 {
        self.treatment_mean - self.baseline_mean
    }
}

/// Sample collection progress against the per-arm minimum
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentProgress {
    pub experiment_id: Uuid,
    pub status: ExperimentStatus,
    pub total_events: u64,
    pub baseline_count: u64,
    pub treatment_count: u64,
    pub min_sample_size: u64,
    /// Smaller arm's count over the minimum, capped at 1.0
    pub fraction_complete: f64,
    /// Days since start, if started
    pub elapsed_days: Option<f64>,
}

/// A/B test experiment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experiment {
    /// Unique experiment identifier
    pub id: Uuid,
    /// Definition supplied at creation
    pub config: ExperimentConfig,
    /// Current status
    pub status: ExperimentStatus,
    /// Append-only observation log
    pub events: Vec<Event>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    /// End of event admission, by stop or completion
    pub stopped_at: Option<DateTime<Utc>>,
    /// Latest analysis
    pub result: Option<ExperimentResult>,
}

impl Experiment {
    /// Create a new draft experiment
    pub fn new(config: ExperimentConfig, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            status: ExperimentStatus::Draft,
            events: Vec::new(),
            created_at,
            started_at: None,
            stopped_at: None,
            result: None,
        }
    }

    /// Start the experiment
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.status = ExperimentStatus::Running;
        self.started_at = Some(now);
    }

    /// Stop admitting events
    pub fn stop(&mut self, now: DateTime<Utc>) {
        self.status = ExperimentStatus::Stopped;
        self.stopped_at = Some(now);
    }

    /// Mark the experiment completed
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = ExperimentStatus::Completed;
        self.stopped_at = Some(now);
    }

    /// Number of events recorded for `variant`
    pub fn arm_count(&self, variant: Variant) -> u64 {
        self.events.iter().filter(|e| e.variant == variant).count() as u64
    }

    /// Whether both arms reached the per-arm minimum
    pub fn has_min_samples(&self) -> bool {
        let min = self.config.min_sample_size;
        self.arm_count(Variant::Baseline) >= min && self.arm_count(Variant::Treatment) >= min
    }

    /// Days elapsed since start, measured at `now`
    pub fn elapsed_days(&self, now: DateTime<Utc>) -> Option<f64> {
        self.started_at.map(|started| {
            let end = self.stopped_at.unwrap_or(now);
            (end - started).num_seconds().max(0) as f64 / 86_400.0
        })
    }

    /// Progress snapshot at `now`
    pub fn progress(&self, now: DateTime<Utc>) -> ExperimentProgress {
        let baseline_count = self.arm_count(Variant::Baseline);
        let treatment_count = self.arm_count(Variant::Treatment);
        let min_sample_size = self.config.min_sample_size;

        let fraction_complete = if min_sample_size == 0 {
            1.0
        } else {
            (baseline_count.min(treatment_count) as f64 / min_sample_size as f64).min(1.0)
        };

        ExperimentProgress {
            experiment_id: self.id,
            status: self.status,
            total_events: self.events.len() as u64,
            baseline_count,
            treatment_count,
            min_sample_size,
            fraction_complete,
            elapsed_days: self.elapsed_days(now),
        }
    }
}
