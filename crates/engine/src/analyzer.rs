//! Test selection and result assembly
//!
//! [`analyze`] is a pure function of an experiment and the analysis time.
//! It either returns a complete [`ExperimentResult`] or an error; it never
//! touches the experiment.

use abtest_types::{
    Experiment, ExperimentResult, MetricType, Operation, Recommendation, TestMethod,
};
use chrono::{DateTime, Utc};

use crate::{
    errors::{EngineError, Result},
    event_store::partition,
    statistical::{DescriptiveStats, MannWhitneyU, StatisticalTest, WelchTTest, ZTest},
};

/// Pick the hypothesis test for a metric type
pub fn select_test(metric_type: MetricType) -> TestMethod {
    match metric_type {
        MetricType::Continuous => TestMethod::WelchTTest,
        MetricType::Binary => TestMethod::TwoProportionZTest,
        MetricType::Count => TestMethod::MannWhitneyU,
    }
}

/// Percent change of `treatment_mean` against `baseline_mean`
pub fn relative_lift(baseline_mean: f64, treatment_mean: f64) -> Result<f64> {
    if baseline_mean == 0.0 {
        return Err(EngineError::UndefinedLift);
    }
    Ok((treatment_mean - baseline_mean) / baseline_mean * 100.0)
}

/// Recommendation for a finished comparison
pub fn recommend(has_min_samples: bool, is_significant: bool, lift: f64) -> Recommendation {
    if !has_min_samples {
        Recommendation::InsufficientData
    } else if is_significant && lift > 0.0 {
        Recommendation::RollOutTreatment
    } else if is_significant && lift < 0.0 {
        Recommendation::KeepBaseline
    } else {
        Recommendation::NoSignificantDifference
    }
}

/// Compare the two arms of `experiment`
pub fn analyze(experiment: &Experiment, now: DateTime<Utc>) -> Result<ExperimentResult> {
    if !experiment.status.permits(Operation::Analyze) {
        return Err(EngineError::invalid_state(
            Operation::Analyze,
            experiment.status,
        ));
    }

    let config = &experiment.config;
    let samples = partition(&experiment.events);

    let method = select_test(config.metric_type);
    let test: Box<dyn StatisticalTest> = match method {
        TestMethod::WelchTTest => {
            Box::new(WelchTTest::from_samples(&samples.baseline, &samples.treatment)?)
        }
        TestMethod::TwoProportionZTest => {
            Box::new(ZTest::from_samples(&samples.baseline, &samples.treatment)?)
        }
        TestMethod::MannWhitneyU => {
            Box::new(MannWhitneyU::from_samples(&samples.baseline, &samples.treatment)?)
        }
    };

    let baseline = DescriptiveStats::from_samples(&samples.baseline);
    let treatment = DescriptiveStats::from_samples(&samples.treatment);

    let confidence_level = 1.0 - config.significance_level;
    let test_statistic = test.statistic()?;
    let p_value = test.test()?;
    let confidence_interval = test.confidence_interval(confidence_level)?;

    let all_finite = [
        test_statistic,
        p_value,
        confidence_interval.0,
        confidence_interval.1,
    ]
    .iter()
    .all(|v| v.is_finite());
    if !all_finite {
        return Err(EngineError::StatisticalError(format!(
            "{} produced a non-finite result",
            method
        )));
    }

    let relative_lift = relative_lift(baseline.mean, treatment.mean)?;
    let is_significant = p_value < config.significance_level;
    let recommendation = recommend(experiment.has_min_samples(), is_significant, relative_lift);

    Ok(ExperimentResult {
        method,
        baseline_count: baseline.count as u64,
        treatment_count: treatment.count as u64,
        baseline_mean: baseline.mean,
        treatment_mean: treatment.mean,
        test_statistic,
        degrees_of_freedom: test.degrees_of_freedom(),
        p_value,
        confidence_level,
        confidence_interval,
        relative_lift,
        is_significant,
        recommendation,
        analyzed_at: now,
    })
}
