//! Experiment lifecycle management
//!
//! This module owns every experiment and enforces the state machine
//! `Draft -> Running -> {Stopped, Completed}`. Each experiment sits behind
//! its own map entry lock, so an operation's check and mutation happen as
//! one unit: an event can never be appended after a concurrent stop.

use abtest_types::{
    Event, Experiment, ExperimentConfig, ExperimentProgress, ExperimentResult, ExperimentStatus,
    Operation, Variant,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    analyzer,
    bucketing::assign_variant,
    clock::Clock,
    errors::{EngineError, Result},
    event_store,
    snapshot::ExperimentSnapshot,
};

/// Why a running experiment was completed on analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// Both arms reached the minimum sample size
    SampleSizeReached,
    /// The maximum duration elapsed
    MaxDurationElapsed,
}

/// Outcome of a successful analysis
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub result: ExperimentResult,
    /// Set when this analysis moved the experiment to `Completed`
    pub completed: Option<CompletionReason>,
}

/// Experiment lifecycle manager
pub struct ExperimentManager {
    /// All experiments by id
    experiments: Arc<DashMap<Uuid, Experiment>>,
    clock: Arc<dyn Clock>,
    /// Complete running experiments on analysis when due
    auto_complete: bool,
}

impl ExperimentManager {
    /// Create a new experiment manager
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            experiments: Arc::new(DashMap::new()),
            clock,
            auto_complete: true,
        }
    }

    pub fn with_auto_complete(mut self, auto_complete: bool) -> Self {
        self.auto_complete = auto_complete;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Validate `config` and create a draft experiment
    pub fn create_experiment(&self, config: ExperimentConfig) -> Result<Uuid> {
        config.validate()?;

        let experiment = Experiment::new(config, self.clock.now());
        let experiment_id = experiment.id;
        self.experiments.insert(experiment_id, experiment);

        Ok(experiment_id)
    }

    /// Start an experiment
    pub fn start_experiment(&self, experiment_id: &Uuid) -> Result<()> {
        let mut entry = self.entry_mut(experiment_id)?;
        ensure(&entry, Operation::Start)?;

        entry.start(self.clock.now());
        Ok(())
    }

    /// Bucket the subject and append one observation
    pub fn record_event(
        &self,
        experiment_id: &Uuid,
        subject_id: &str,
        value: f64,
    ) -> Result<Event> {
        let mut entry = self.entry_mut(experiment_id)?;
        event_store::append(&mut entry, subject_id, value, self.clock.now())
    }

    /// Arm a subject is (or would be) assigned to
    pub fn variant_for(&self, experiment_id: &Uuid, subject_id: &str) -> Result<Variant> {
        let experiment = self
            .experiments
            .get(experiment_id)
            .ok_or(EngineError::ExperimentNotFound(*experiment_id))?;

        Ok(assign_variant(
            &experiment.id.to_string(),
            subject_id,
            experiment.config.traffic_split,
        ))
    }

    /// Stop admitting events
    pub fn stop_experiment(&self, experiment_id: &Uuid) -> Result<()> {
        let mut entry = self.entry_mut(experiment_id)?;
        ensure(&entry, Operation::Stop)?;

        entry.stop(self.clock.now());
        Ok(())
    }

    /// Analyze the current event log and attach the result
    ///
    /// On failure the experiment is untouched. With auto-completion enabled,
    /// a running experiment that has enough samples in both arms, or has run
    /// for its maximum duration, moves to `Completed` together with the
    /// result.
    pub fn analyze_experiment(&self, experiment_id: &Uuid) -> Result<AnalysisReport> {
        let now = self.clock.now();
        let mut entry = self.entry_mut(experiment_id)?;

        let result = analyzer::analyze(&entry, now)?;

        let completed = if self.auto_complete && entry.status == ExperimentStatus::Running {
            completion_due(&entry, now)
        } else {
            None
        };

        if completed.is_some() {
            entry.complete(now);
        }
        entry.result = Some(result.clone());

        Ok(AnalysisReport { result, completed })
    }

    /// Get experiment by ID
    pub fn get_experiment(&self, experiment_id: &Uuid) -> Option<Experiment> {
        self.experiments.get(experiment_id).map(|e| e.clone())
    }

    /// Get all experiments, oldest first
    pub fn list_experiments(&self) -> Vec<Experiment> {
        let mut experiments: Vec<Experiment> =
            self.experiments.iter().map(|e| e.value().clone()).collect();
        experiments.sort_by_key(|e| (e.created_at, e.id));
        experiments
    }

    /// Get experiments in `status`, oldest first
    pub fn list_by_status(&self, status: ExperimentStatus) -> Vec<Experiment> {
        self.list_experiments()
            .into_iter()
            .filter(|e| e.status == status)
            .collect()
    }

    /// Sample collection progress
    pub fn progress(&self, experiment_id: &Uuid) -> Result<ExperimentProgress> {
        let experiment = self
            .experiments
            .get(experiment_id)
            .ok_or(EngineError::ExperimentNotFound(*experiment_id))?;

        Ok(experiment.progress(self.clock.now()))
    }

    /// Remove an experiment in any state
    pub fn delete_experiment(&self, experiment_id: &Uuid) -> Result<Experiment> {
        self.experiments
            .remove(experiment_id)
            .map(|(_, experiment)| experiment)
            .ok_or(EngineError::ExperimentNotFound(*experiment_id))
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Copy every experiment into a snapshot
    pub fn snapshot(&self) -> ExperimentSnapshot {
        self.experiments.iter().map(|e| e.value().clone()).collect()
    }

    /// Load a snapshot, replacing experiments with the same id
    ///
    /// The snapshot is validated first; nothing is loaded if it is invalid.
    pub fn restore(&self, snapshot: ExperimentSnapshot) -> Result<usize> {
        snapshot.validate()?;

        let count = snapshot.len();
        for experiment in snapshot {
            self.experiments.insert(experiment.id, experiment);
        }
        Ok(count)
    }

    fn entry_mut(
        &self,
        experiment_id: &Uuid,
    ) -> Result<dashmap::mapref::one::RefMut<'_, Uuid, Experiment>> {
        self.experiments
            .get_mut(experiment_id)
            .ok_or(EngineError::ExperimentNotFound(*experiment_id))
    }
}

fn ensure(experiment: &Experiment, operation: Operation) -> Result<()> {
    if experiment.status.permits(operation) {
        Ok(())
    } else {
        Err(EngineError::invalid_state(operation, experiment.status))
    }
}

fn completion_due(experiment: &Experiment, now: DateTime<Utc>) -> Option<CompletionReason> {
    if experiment.has_min_samples() {
        return Some(CompletionReason::SampleSizeReached);
    }

    let max_duration = Duration::days(i64::from(experiment.config.max_duration_days));
    match experiment.started_at {
        Some(started) if now - started >= max_duration => {
            Some(CompletionReason::MaxDurationElapsed)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use abtest_types::MetricType;

    fn manager() -> (ExperimentManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (ExperimentManager::new(clock.clone()), clock)
    }

    fn config() -> ExperimentConfig {
        ExperimentConfig::new(
            "Test Experiment",
            "Score comparison",
            "score",
            MetricType::Continuous,
        )
        .with_min_sample_size(10)
    }

    /// Record subjects until both arms hold `per_arm` events
    fn fill(manager: &ExperimentManager, id: &Uuid, per_arm: usize, shift: f64) {
        let (mut baseline, mut treatment) = (0, 0);
        let mut i = 0;
        while baseline < per_arm || treatment < per_arm {
            let value = (i % 7) as f64;
            let variant = manager.variant_for(id, &format!("user-{}", i)).unwrap();
            let wanted = match variant {
                Variant::Baseline => baseline < per_arm,
                Variant::Treatment => treatment < per_arm,
            };
            if wanted {
                let value = if variant == Variant::Treatment { value + shift } else { value + 1.0 };
                manager.record_event(id, &format!("user-{}", i), value).unwrap();
                match variant {
                    Variant::Baseline => baseline += 1,
                    Variant::Treatment => treatment += 1,
                }
            }
            i += 1;
        }
    }

    #[test]
    fn test_create_experiment() {
        let (manager, clock) = manager();
        let exp_id = manager.create_experiment(config()).unwrap();

        let experiment = manager.get_experiment(&exp_id).unwrap();
        assert_eq!(experiment.config.name, "Test Experiment");
        assert_eq!(experiment.status, ExperimentStatus::Draft);
        assert_eq!(experiment.created_at, clock.now());
        assert!(experiment.started_at.is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (manager, _) = manager();
        let result = manager.create_experiment(config().with_traffic_split(1.2));

        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_start_experiment() {
        let (manager, clock) = manager();
        let exp_id = manager.create_experiment(config()).unwrap();

        clock.advance(Duration::hours(1));
        manager.start_experiment(&exp_id).unwrap();

        let experiment = manager.get_experiment(&exp_id).unwrap();
        assert_eq!(experiment.status, ExperimentStatus::Running);
        assert_eq!(experiment.started_at, Some(clock.now()));

        // Cannot start twice
        let err = manager.start_experiment(&exp_id).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidState {
                operation: Operation::Start,
                status: ExperimentStatus::Running
            }
        ));
    }

    #[test]
    fn test_record_event_requires_running() {
        let (manager, _) = manager();
        let exp_id = manager.create_experiment(config()).unwrap();

        assert!(matches!(
            manager.record_event(&exp_id, "user-1", 1.0),
            Err(EngineError::InvalidState { .. })
        ));

        manager.start_experiment(&exp_id).unwrap();
        manager.record_event(&exp_id, "user-1", 1.0).unwrap();
        manager.stop_experiment(&exp_id).unwrap();

        assert!(matches!(
            manager.record_event(&exp_id, "user-2", 1.0),
            Err(EngineError::InvalidState { .. })
        ));
        assert_eq!(manager.get_experiment(&exp_id).unwrap().events.len(), 1);
    }

    #[test]
    fn test_variant_for_matches_recorded_event() {
        let (manager, _) = manager();
        let exp_id = manager.create_experiment(config()).unwrap();

        // Routing is available before the experiment starts
        let predicted = manager.variant_for(&exp_id, "user-42").unwrap();
        manager.start_experiment(&exp_id).unwrap();

        let event = manager.record_event(&exp_id, "user-42", 3.0).unwrap();
        assert_eq!(event.variant, predicted);
    }

    #[test]
    fn test_stop_requires_running() {
        let (manager, clock) = manager();
        let exp_id = manager.create_experiment(config()).unwrap();

        assert!(manager.stop_experiment(&exp_id).is_err());

        manager.start_experiment(&exp_id).unwrap();
        clock.advance(Duration::days(1));
        manager.stop_experiment(&exp_id).unwrap();

        let experiment = manager.get_experiment(&exp_id).unwrap();
        assert_eq!(experiment.status, ExperimentStatus::Stopped);
        assert_eq!(experiment.stopped_at, Some(clock.now()));

        // Terminal
        assert!(manager.stop_experiment(&exp_id).is_err());
        assert!(manager.start_experiment(&exp_id).is_err());
    }

    #[test]
    fn test_analyze_draft_fails() {
        let (manager, _) = manager();
        let exp_id = manager.create_experiment(config()).unwrap();

        assert!(matches!(
            manager.analyze_experiment(&exp_id),
            Err(EngineError::InvalidState {
                operation: Operation::Analyze,
                status: ExperimentStatus::Draft
            })
        ));
    }

    #[test]
    fn test_failed_analysis_leaves_experiment_untouched() {
        let (manager, _) = manager();
        let exp_id = manager.create_experiment(config()).unwrap();
        manager.start_experiment(&exp_id).unwrap();
        manager.record_event(&exp_id, "user-1", 1.0).unwrap();

        let before = manager.get_experiment(&exp_id).unwrap();
        assert!(matches!(
            manager.analyze_experiment(&exp_id),
            Err(EngineError::InsufficientData(_))
        ));
        assert_eq!(manager.get_experiment(&exp_id).unwrap(), before);
    }

    #[test]
    fn test_analysis_below_minimum_keeps_running() {
        let (manager, _) = manager();
        let exp_id = manager.create_experiment(config()).unwrap();
        manager.start_experiment(&exp_id).unwrap();
        fill(&manager, &exp_id, 5, 4.0);

        let report = manager.analyze_experiment(&exp_id).unwrap();
        assert!(report.completed.is_none());

        let experiment = manager.get_experiment(&exp_id).unwrap();
        assert_eq!(experiment.status, ExperimentStatus::Running);
        assert_eq!(experiment.result, Some(report.result));
    }

    #[test]
    fn test_auto_complete_on_sample_size() {
        let (manager, clock) = manager();
        let exp_id = manager.create_experiment(config()).unwrap();
        manager.start_experiment(&exp_id).unwrap();
        fill(&manager, &exp_id, 10, 4.0);

        let report = manager.analyze_experiment(&exp_id).unwrap();
        assert_eq!(report.completed, Some(CompletionReason::SampleSizeReached));

        let experiment = manager.get_experiment(&exp_id).unwrap();
        assert_eq!(experiment.status, ExperimentStatus::Completed);
        assert_eq!(experiment.stopped_at, Some(clock.now()));

        // Completed experiments can still be analyzed
        assert!(manager.analyze_experiment(&exp_id).unwrap().completed.is_none());
    }

    #[test]
    fn test_auto_complete_on_duration() {
        let (manager, clock) = manager();
        let exp_id = manager
            .create_experiment(config().with_min_sample_size(1000).with_max_duration_days(7))
            .unwrap();
        manager.start_experiment(&exp_id).unwrap();
        fill(&manager, &exp_id, 5, 4.0);

        clock.advance(Duration::days(6));
        assert!(manager.analyze_experiment(&exp_id).unwrap().completed.is_none());

        clock.advance(Duration::days(1));
        let report = manager.analyze_experiment(&exp_id).unwrap();
        assert_eq!(report.completed, Some(CompletionReason::MaxDurationElapsed));
    }

    #[test]
    fn test_auto_complete_disabled() {
        let clock = Arc::new(ManualClock::default());
        let manager = ExperimentManager::new(clock).with_auto_complete(false);
        let exp_id = manager.create_experiment(config()).unwrap();
        manager.start_experiment(&exp_id).unwrap();
        fill(&manager, &exp_id, 10, 4.0);

        let report = manager.analyze_experiment(&exp_id).unwrap();
        assert!(report.completed.is_none());
        assert_eq!(
            manager.get_experiment(&exp_id).unwrap().status,
            ExperimentStatus::Running
        );
    }

    #[test]
    fn test_analysis_after_stop() {
        let (manager, _) = manager();
        let exp_id = manager.create_experiment(config()).unwrap();
        manager.start_experiment(&exp_id).unwrap();
        fill(&manager, &exp_id, 10, 4.0);
        manager.stop_experiment(&exp_id).unwrap();

        let report = manager.analyze_experiment(&exp_id).unwrap();
        assert!(report.completed.is_none());
        assert_eq!(
            manager.get_experiment(&exp_id).unwrap().status,
            ExperimentStatus::Stopped
        );
    }

    #[test]
    fn test_unknown_experiment() {
        let (manager, _) = manager();
        let missing = Uuid::new_v4();

        assert!(matches!(
            manager.start_experiment(&missing),
            Err(EngineError::ExperimentNotFound(id)) if id == missing
        ));
        assert!(manager.get_experiment(&missing).is_none());
        assert!(manager.progress(&missing).is_err());
        assert!(manager.delete_experiment(&missing).is_err());
    }

    #[test]
    fn test_list_and_delete() {
        let (manager, clock) = manager();
        let first = manager.create_experiment(config()).unwrap();
        clock.advance(Duration::seconds(1));
        let second = manager.create_experiment(config()).unwrap();
        manager.start_experiment(&second).unwrap();

        let all = manager.list_experiments();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first);

        let running = manager.list_by_status(ExperimentStatus::Running);
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, second);

        manager.delete_experiment(&first).unwrap();
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_progress() {
        let (manager, clock) = manager();
        let exp_id = manager.create_experiment(config()).unwrap();
        manager.start_experiment(&exp_id).unwrap();
        fill(&manager, &exp_id, 5, 4.0);
        clock.advance(Duration::days(3));

        let progress = manager.progress(&exp_id).unwrap();
        assert_eq!(progress.baseline_count, 5);
        assert_eq!(progress.treatment_count, 5);
        assert_eq!(progress.total_events, 10);
        assert_eq!(progress.fraction_complete, 0.5);
        assert_eq!(progress.elapsed_days, Some(3.0));
    }

    #[test]
    fn test_snapshot_restore_into_new_manager() {
        let (manager, _) = manager();
        let exp_id = manager.create_experiment(config()).unwrap();
        manager.start_experiment(&exp_id).unwrap();
        fill(&manager, &exp_id, 10, 4.0);
        manager.analyze_experiment(&exp_id).unwrap();

        let json = manager.snapshot().to_json().unwrap();

        let (restored, _) = self::manager();
        let count = restored
            .restore(ExperimentSnapshot::from_json(&json).unwrap())
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            restored.get_experiment(&exp_id),
            manager.get_experiment(&exp_id)
        );

        // Rehydrated experiments accept further analysis
        assert!(restored.analyze_experiment(&exp_id).is_ok());
    }
}
