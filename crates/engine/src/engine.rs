//! A/B testing engine
//!
//! The engine is the entry point callers construct and pass around. It
//! combines the lifecycle manager, the configured defaults and the clock,
//! and logs every state change.

use abtest_config::EngineConfig;
use abtest_types::{
    Event, Experiment, ExperimentConfig, ExperimentProgress, ExperimentResult, ExperimentStatus,
    MetricType, Variant,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    errors::Result,
    experiment_manager::{CompletionReason, ExperimentManager},
    sample_size::calculate_sample_size,
    snapshot::ExperimentSnapshot,
};

/// A/B testing engine
pub struct ExperimentEngine {
    /// Experiment manager
    manager: Arc<ExperimentManager>,

    /// Configuration
    config: EngineConfig,
}

impl ExperimentEngine {
    /// Create an engine on the system clock
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an engine reading time from `clock`
    pub fn with_clock(config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let manager = ExperimentManager::new(clock)
            .with_auto_complete(config.lifecycle.auto_complete);

        Self {
            manager: Arc::new(manager),
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<ExperimentManager> {
        &self.manager
    }

    /// Experiment configuration pre-filled with the configured defaults
    pub fn draft_config(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        metric_name: impl Into<String>,
        metric_type: MetricType,
    ) -> ExperimentConfig {
        let defaults = &self.config.analysis;

        ExperimentConfig::new(name, description, metric_name, metric_type)
            .with_traffic_split(defaults.traffic_split)
            .with_min_sample_size(defaults.min_sample_size)
            .with_max_duration_days(defaults.max_duration_days)
            .with_significance_level(defaults.significance_level)
            .with_power(defaults.power)
    }

    /// Create a draft experiment
    pub fn create_experiment(&self, config: ExperimentConfig) -> Result<Uuid> {
        let name = config.name.clone();
        let metric_type = config.metric_type;

        let exp_id = self.manager.create_experiment(config)?;
        info!(
            "Created experiment {} ({}, {} metric)",
            exp_id, name, metric_type
        );

        Ok(exp_id)
    }

    /// Start an experiment
    pub fn start(&self, experiment_id: &Uuid) -> Result<()> {
        self.manager.start_experiment(experiment_id)?;
        info!("Started experiment {}", experiment_id);
        Ok(())
    }

    /// Arm to route a subject to
    pub fn variant_for(&self, experiment_id: &Uuid, subject_id: &str) -> Result<Variant> {
        self.manager.variant_for(experiment_id, subject_id)
    }

    /// Record one observation for a subject
    pub fn record_event(
        &self,
        experiment_id: &Uuid,
        subject_id: &str,
        value: f64,
    ) -> Result<Event> {
        let event = self.manager.record_event(experiment_id, subject_id, value)?;

        debug!(
            "Recorded {} for subject {} in experiment {} ({})",
            value, subject_id, experiment_id, event.variant
        );

        Ok(event)
    }

    /// Stop an experiment
    pub fn stop(&self, experiment_id: &Uuid) -> Result<()> {
        self.manager.stop_experiment(experiment_id)?;
        info!("Stopped experiment {}", experiment_id);
        Ok(())
    }

    /// Analyze an experiment and attach the result
    pub fn analyze(&self, experiment_id: &Uuid) -> Result<ExperimentResult> {
        let report = match self.manager.analyze_experiment(experiment_id) {
            Ok(report) => report,
            Err(e) => {
                warn!("Analysis of experiment {} failed: {}", experiment_id, e);
                return Err(e);
            }
        };

        let result = &report.result;
        info!(
            "Analyzed experiment {} with {}: p-value {:.4}, lift {:.2}%, {}",
            experiment_id,
            result.method,
            result.p_value,
            result.relative_lift,
            result.recommendation
        );

        match report.completed {
            Some(CompletionReason::SampleSizeReached) => {
                info!("Experiment {} reached its sample size and is complete", experiment_id);
            }
            Some(CompletionReason::MaxDurationElapsed) => {
                warn!(
                    "Experiment {} exceeded its maximum duration, concluding with {}",
                    experiment_id, result.recommendation
                );
            }
            None => {}
        }

        Ok(report.result)
    }

    /// Get experiment details
    pub fn get_experiment(&self, experiment_id: &Uuid) -> Option<Experiment> {
        self.manager.get_experiment(experiment_id)
    }

    /// List all experiments
    pub fn list_experiments(&self) -> Vec<Experiment> {
        self.manager.list_experiments()
    }

    /// List running experiments
    pub fn list_active_experiments(&self) -> Vec<Experiment> {
        self.manager.list_by_status(ExperimentStatus::Running)
    }

    /// Sample collection progress
    pub fn progress(&self, experiment_id: &Uuid) -> Result<ExperimentProgress> {
        self.manager.progress(experiment_id)
    }

    /// Required sample size per arm using the configured alpha and power
    pub fn calculate_sample_size(&self, baseline: f64, min_effect: f64) -> Result<u64> {
        let defaults = &self.config.analysis;
        calculate_sample_size(baseline, min_effect, defaults.significance_level, defaults.power)
    }

    /// Snapshot for the persistence layer
    pub fn snapshot(&self) -> ExperimentSnapshot {
        self.manager.snapshot()
    }

    /// Rehydrate experiments from the persistence layer
    pub fn restore(&self, snapshot: ExperimentSnapshot) -> Result<usize> {
        let count = self.manager.restore(snapshot)?;
        info!("Restored {} experiments from snapshot", count);
        Ok(count)
    }
}
