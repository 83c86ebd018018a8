//! Terminal rendering of experiments and results

use abtest_engine::{Experiment, ExperimentResult, ExperimentStatus, Recommendation};
use colored::{ColoredString, Colorize};

pub fn status_label(status: ExperimentStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        ExperimentStatus::Draft => label.dimmed(),
        ExperimentStatus::Running => label.cyan().bold(),
        ExperimentStatus::Stopped => label.yellow().bold(),
        ExperimentStatus::Completed => label.green().bold(),
    }
}

fn recommendation_label(recommendation: Recommendation) -> ColoredString {
    let label = recommendation.as_str();
    match recommendation {
        Recommendation::RollOutTreatment => label.green().bold(),
        Recommendation::KeepBaseline => label.red().bold(),
        Recommendation::NoSignificantDifference => label.yellow(),
        Recommendation::InsufficientData => label.dimmed(),
    }
}

pub fn print_experiment(experiment: &Experiment) {
    let config = &experiment.config;

    println!(
        "{} {} [{}]",
        config.name.bold(),
        experiment.id.to_string().dimmed(),
        status_label(experiment.status)
    );
    println!(
        "  Metric:       {} ({})",
        config.metric_name, config.metric_type
    );
    println!(
        "  Models:       {} vs {}",
        config.baseline_model, config.treatment_model
    );
    println!(
        "  Events:       {} total, {} per arm minimum",
        experiment.events.len(),
        config.min_sample_size
    );

    match &experiment.result {
        Some(result) => print_result(result),
        None => println!("  {}", "No analysis yet".dimmed()),
    }
}

pub fn print_result(result: &ExperimentResult) {
    println!("  {}", "Analysis".bold().cyan());
    println!("    Method:         {}", result.method);
    println!(
        "    Baseline:       n={} mean={:.4}",
        result.baseline_count, result.baseline_mean
    );
    println!(
        "    Treatment:      n={} mean={:.4}",
        result.treatment_count, result.treatment_mean
    );

    match result.degrees_of_freedom {
        Some(df) => println!(
            "    Statistic:      {:.4} (df {:.1})",
            result.test_statistic, df
        ),
        None => println!("    Statistic:      {:.4}", result.test_statistic),
    }

    let p_value = format!("{:.4}", result.p_value);
    println!(
        "    p-value:        {}",
        if result.is_significant {
            p_value.green().bold()
        } else {
            p_value.normal()
        }
    );
    println!(
        "    {:.0}% CI:         [{:.4}, {:.4}]",
        result.confidence_level * 100.0,
        result.confidence_interval.0,
        result.confidence_interval.1
    );
    println!("    Difference:     {:+.4}", result.mean_difference());
    println!("    Lift:           {:+.2}%", result.relative_lift);
    println!(
        "    Recommendation: {}",
        recommendation_label(result.recommendation)
    );
}
