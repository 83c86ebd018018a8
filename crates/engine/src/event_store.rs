//! Append-only observation log
//!
//! Events live on their [`Experiment`]; this module owns the admission rules
//! and the split of a log into per-arm samples.

use abtest_types::{Event, Experiment, MetricType, Operation, ValidationError, Variant};
use chrono::{DateTime, Utc};

use crate::{
    bucketing::assign_variant,
    errors::{EngineError, Result},
};

/// Values of a log split by arm
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArmSamples {
    pub baseline: Vec<f64>,
    pub treatment: Vec<f64>,
}

/// Split an event log into baseline and treatment values, preserving order
pub fn partition(events: &[Event]) -> ArmSamples {
    let mut samples = ArmSamples::default();
    for event in events {
        match event.variant {
            Variant::Baseline => samples.baseline.push(event.value),
            Variant::Treatment => samples.treatment.push(event.value),
        }
    }
    samples
}

/// Check that `value` is a legal observation for `metric_type`
pub fn validate_value(metric_type: MetricType, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(ValidationError::new("value", format!("must be finite, got {}", value)).into());
    }

    match metric_type {
        MetricType::Continuous => Ok(()),
        MetricType::Binary if value == 0.0 || value == 1.0 => Ok(()),
        MetricType::Binary => Err(ValidationError::new(
            "value",
            format!("binary metrics take 0 or 1, got {}", value),
        )
        .into()),
        MetricType::Count if value >= 0.0 && value.fract() == 0.0 => Ok(()),
        MetricType::Count => Err(ValidationError::new(
            "value",
            format!("count metrics take non-negative integers, got {}", value),
        )
        .into()),
    }
}

/// Bucket `subject_id` and append one observation
///
/// Fails without appending unless the experiment is running and the value
/// suits the metric type. Repeated calls for one subject each append.
pub fn append(
    experiment: &mut Experiment,
    subject_id: &str,
    value: f64,
    now: DateTime<Utc>,
) -> Result<Event> {
    if !experiment.status.permits(Operation::RecordEvent) {
        return Err(EngineError::invalid_state(
            Operation::RecordEvent,
            experiment.status,
        ));
    }

    validate_value(experiment.config.metric_type, value)?;

    let variant = assign_variant(
        &experiment.id.to_string(),
        subject_id,
        experiment.config.traffic_split,
    );

    let event = Event::new(subject_id, value, now, variant);
    experiment.events.push(event.clone());

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use abtest_types::{ExperimentConfig, ExperimentStatus};

    fn running(metric_type: MetricType) -> Experiment {
        let now = Utc::now();
        let config = ExperimentConfig::new("Test", "Event store test", "metric", metric_type);
        let mut experiment = Experiment::new(config, now);
        experiment.start(now);
        experiment
    }

    #[test]
    fn test_append_requires_running() {
        let now = Utc::now();
        let mut experiment = running(MetricType::Continuous);
        experiment.status = ExperimentStatus::Draft;

        let err = append(&mut experiment, "user-1", 1.0, now).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidState {
                operation: Operation::RecordEvent,
                status: ExperimentStatus::Draft
            }
        ));
        assert!(experiment.events.is_empty());

        experiment.stop(now);
        assert!(append(&mut experiment, "user-1", 1.0, now).is_err());
        assert!(experiment.events.is_empty());
    }

    #[test]
    fn test_repeated_subject_keeps_variant() {
        let now = Utc::now();
        let mut experiment = running(MetricType::Continuous);

        let first = append(&mut experiment, "user-7", 120.0, now).unwrap();
        for latency in [95.0, 130.0, 101.0] {
            let event = append(&mut experiment, "user-7", latency, now).unwrap();
            assert_eq!(event.variant, first.variant);
        }

        // No deduplication
        assert_eq!(experiment.events.len(), 4);
    }

    #[test]
    fn test_value_validation() {
        assert!(validate_value(MetricType::Continuous, -3.25).is_ok());
        assert!(validate_value(MetricType::Continuous, f64::NAN).is_err());
        assert!(validate_value(MetricType::Continuous, f64::INFINITY).is_err());
        assert!(validate_value(MetricType::Binary, 1.0).is_ok());
        assert!(validate_value(MetricType::Binary, 0.5).is_err());
        assert!(validate_value(MetricType::Count, 7.0).is_ok());
        assert!(validate_value(MetricType::Count, -1.0).is_err());
        assert!(validate_value(MetricType::Count, 2.5).is_err());
    }

    #[test]
    fn test_rejected_value_not_appended() {
        let now = Utc::now();
        let mut experiment = running(MetricType::Binary);

        let err = append(&mut experiment, "user-1", 2.0, now).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(experiment.events.is_empty());
    }

    #[test]
    fn test_partition() {
        let now = Utc::now();
        let events = vec![
            Event::new("a", 1.0, now, Variant::Baseline),
            Event::new("b", 2.0, now, Variant::Treatment),
            Event::new("a", 3.0, now, Variant::Baseline),
        ];

        let samples = partition(&events);
        assert_eq!(samples.baseline, vec![1.0, 3.0]);
        assert_eq!(samples.treatment, vec![2.0]);
    }
}
