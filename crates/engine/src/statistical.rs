//! Statistical significance testing for A/B experiments
//!
//! Every test compares a baseline sample against a treatment sample and
//! orients its statistic and interval as `treatment - baseline`.

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::errors::{EngineError, Result};

/// Statistical test trait
pub trait StatisticalTest {
    /// Test statistic (t, z or U)
    fn statistic(&self) -> Result<f64>;

    /// Perform the two-tailed test and return the p-value
    fn test(&self) -> Result<f64>;

    /// Interval for the difference of means at `confidence`
    fn confidence_interval(&self, confidence: f64) -> Result<(f64, f64)>;

    fn degrees_of_freedom(&self) -> Option<f64> {
        None
    }

    /// Check if result is significant at given alpha level
    fn is_significant(&self, alpha: f64) -> Result<bool> {
        Ok(self.test()? < alpha)
    }
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| EngineError::StatisticalError(e.to_string()))
}

/// Two-sided critical value of the standard normal
pub fn z_critical(confidence: f64) -> Result<f64> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(EngineError::StatisticalError(format!(
            "Confidence must be in (0, 1), got {}",
            confidence
        )));
    }

    let alpha = 1.0 - confidence;
    Ok(standard_normal()?.inverse_cdf(1.0 - alpha / 2.0))
}

/// Two-tailed p-value of a standard normal statistic
fn normal_p_value(z: f64) -> Result<f64> {
    Ok((2.0 * standard_normal()?.sf(z.abs())).min(1.0))
}

/// Count, mean and unbiased variance of a sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
}

impl DescriptiveStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let count = samples.len();
        if count == 0 {
            return Self {
                count,
                mean: 0.0,
                variance: 0.0,
            };
        }

        let mean = samples.iter().sum::<f64>() / count as f64;
        let variance = if count > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64
        } else {
            0.0
        };

        Self {
            count,
            mean,
            variance,
        }
    }

    /// Squared standard error of the mean
    fn mean_variance(&self) -> f64 {
        self.variance / self.count as f64
    }
}

fn require_observations(baseline: usize, treatment: usize, min: usize) -> Result<()> {
    if baseline < min || treatment < min {
        return Err(EngineError::InsufficientData(format!(
            "Need at least {} observations per arm, have {} baseline and {} treatment",
            min, baseline, treatment
        )));
    }
    Ok(())
}

/// Welch's two-sample t-test (unequal variances)
#[derive(Debug, Clone)]
pub struct WelchTTest {
    pub baseline: DescriptiveStats,
    pub treatment: DescriptiveStats,
}

impl WelchTTest {
    pub fn from_samples(baseline: &[f64], treatment: &[f64]) -> Result<Self> {
        require_observations(baseline.len(), treatment.len(), 2)?;

        Ok(Self {
            baseline: DescriptiveStats::from_samples(baseline),
            treatment: DescriptiveStats::from_samples(treatment),
        })
    }

    fn difference(&self) -> f64 {
        self.treatment.mean - self.baseline.mean
    }

    /// Standard error of the difference of means
    pub fn standard_error(&self) -> f64 {
        (self.baseline.mean_variance() + self.treatment.mean_variance()).sqrt()
    }

    /// Welch-Satterthwaite degrees of freedom
    pub fn welch_df(&self) -> f64 {
        let vb = self.baseline.mean_variance();
        let vt = self.treatment.mean_variance();
        let denominator = vb.powi(2) / (self.baseline.count - 1) as f64
            + vt.powi(2) / (self.treatment.count - 1) as f64;

        if denominator == 0.0 {
            // Both arms constant; fall back to the pooled df
            return (self.baseline.count + self.treatment.count - 2) as f64;
        }

        (vb + vt).powi(2) / denominator
    }

    fn t_distribution(&self) -> Result<StudentsT> {
        StudentsT::new(0.0, 1.0, self.welch_df())
            .map_err(|e| EngineError::StatisticalError(e.to_string()))
    }
}

impl StatisticalTest for WelchTTest {
    fn statistic(&self) -> Result<f64> {
        let se = self.standard_error();
        let diff = self.difference();

        if se == 0.0 {
            if diff == 0.0 {
                return Ok(0.0);
            }
            return Err(EngineError::StatisticalError(
                "Both arms have zero variance but different means".to_string(),
            ));
        }

        Ok(diff / se)
    }

    fn test(&self) -> Result<f64> {
        let t = self.statistic()?;
        if t == 0.0 {
            return Ok(1.0);
        }

        Ok((2.0 * self.t_distribution()?.sf(t.abs())).min(1.0))
    }

    fn confidence_interval(&self, confidence: f64) -> Result<(f64, f64)> {
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(EngineError::StatisticalError(format!(
                "Confidence must be in (0, 1), got {}",
                confidence
            )));
        }

        let diff = self.difference();
        let alpha = 1.0 - confidence;
        let critical = self.t_distribution()?.inverse_cdf(1.0 - alpha / 2.0);
        let margin = critical * self.standard_error();

        Ok((diff - margin, diff + margin))
    }

    fn degrees_of_freedom(&self) -> Option<f64> {
        Some(self.welch_df())
    }
}

/// Two-proportion z-test for comparing conversion rates
///
/// The statistic uses the pooled standard error (valid under H0); the
/// confidence interval uses the unpooled standard error.
#[derive(Debug, Clone)]
pub struct ZTest {
    /// Successes in the baseline arm
    pub baseline_successes: u64,
    /// Total trials in the baseline arm
    pub baseline_trials: u64,
    /// Successes in the treatment arm
    pub treatment_successes: u64,
    /// Total trials in the treatment arm
    pub treatment_trials: u64,
}

impl ZTest {
    pub fn new(
        baseline_successes: u64,
        baseline_trials: u64,
        treatment_successes: u64,
        treatment_trials: u64,
    ) -> Self {
        Self {
            baseline_successes,
            baseline_trials,
            treatment_successes,
            treatment_trials,
        }
    }

    /// Build from 0/1 indicator samples; a 1 is a success
    pub fn from_samples(baseline: &[f64], treatment: &[f64]) -> Result<Self> {
        require_observations(baseline.len(), treatment.len(), 2)?;

        let successes = |samples: &[f64]| samples.iter().filter(|v| **v == 1.0).count() as u64;

        Ok(Self::new(
            successes(baseline),
            baseline.len() as u64,
            successes(treatment),
            treatment.len() as u64,
        ))
    }

    /// Sample proportions `(baseline, treatment)`
    pub fn proportions(&self) -> (f64, f64) {
        let rate = |successes: u64, trials: u64| {
            if trials > 0 {
                successes as f64 / trials as f64
            } else {
                0.0
            }
        };

        (
            rate(self.baseline_successes, self.baseline_trials),
            rate(self.treatment_successes, self.treatment_trials),
        )
    }

    /// Calculate pooled proportion
    pub fn pooled_proportion(&self) -> f64 {
        let total_successes = self.baseline_successes + self.treatment_successes;
        let total_trials = self.baseline_trials + self.treatment_trials;

        if total_trials > 0 {
            total_successes as f64 / total_trials as f64
        } else {
            0.0
        }
    }

    fn trials(&self) -> Result<(f64, f64)> {
        if self.baseline_trials == 0 || self.treatment_trials == 0 {
            return Err(EngineError::InsufficientData(
                "Cannot perform z-test with zero trials".to_string(),
            ));
        }
        Ok((self.baseline_trials as f64, self.treatment_trials as f64))
    }
}

impl StatisticalTest for ZTest {
    fn statistic(&self) -> Result<f64> {
        let (nb, nt) = self.trials()?;
        let (pb, pt) = self.proportions();
        let p_pool = self.pooled_proportion();

        // Standard error: sqrt(p_pool * (1 - p_pool) * (1/nb + 1/nt))
        let se = (p_pool * (1.0 - p_pool) * (1.0 / nb + 1.0 / nt)).sqrt();

        // Pooled rate of 0 or 1 means both arms are identical
        if se == 0.0 {
            return Ok(0.0);
        }

        Ok((pt - pb) / se)
    }

    fn test(&self) -> Result<f64> {
        normal_p_value(self.statistic()?)
    }

    fn confidence_interval(&self, confidence: f64) -> Result<(f64, f64)> {
        let (nb, nt) = self.trials()?;
        let (pb, pt) = self.proportions();
        let diff = pt - pb;

        // Standard error for difference: sqrt(pb(1-pb)/nb + pt(1-pt)/nt)
        let se = ((pb * (1.0 - pb) / nb) + (pt * (1.0 - pt) / nt)).sqrt();

        let margin = z_critical(confidence)? * se;
        Ok((diff - margin, diff + margin))
    }
}

/// Mann-Whitney U test with a normal approximation
///
/// Ties receive average ranks and the variance carries the tie correction.
/// The reported statistic is U for the treatment arm.
#[derive(Debug, Clone)]
pub struct MannWhitneyU {
    baseline: Vec<f64>,
    treatment: Vec<f64>,
}

impl MannWhitneyU {
    pub fn from_samples(baseline: &[f64], treatment: &[f64]) -> Result<Self> {
        require_observations(baseline.len(), treatment.len(), 2)?;

        Ok(Self {
            baseline: baseline.to_vec(),
            treatment: treatment.to_vec(),
        })
    }

    /// Treatment rank sum and the tie correction term `sum(t^3 - t)`
    fn rank_sum(&self) -> (f64, f64) {
        let mut combined: Vec<(f64, bool)> = self
            .baseline
            .iter()
            .map(|v| (*v, false))
            .chain(self.treatment.iter().map(|v| (*v, true)))
            .collect();
        combined.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut treatment_rank_sum = 0.0;
        let mut tie_term = 0.0;
        let mut i = 0;
        while i < combined.len() {
            let mut j = i;
            while j < combined.len() && combined[j].0 == combined[i].0 {
                j += 1;
            }

            // Ranks are 1-based; positions i..j share the average rank
            let avg_rank = (i + j + 1) as f64 / 2.0;
            let tied = (j - i) as f64;
            tie_term += tied.powi(3) - tied;

            treatment_rank_sum += combined[i..j]
                .iter()
                .filter(|(_, is_treatment)| *is_treatment)
                .count() as f64
                * avg_rank;

            i = j;
        }

        (treatment_rank_sum, tie_term)
    }

    /// U statistic of the treatment arm
    pub fn u_statistic(&self) -> f64 {
        let nt = self.treatment.len() as f64;
        let (rank_sum, _) = self.rank_sum();
        rank_sum - nt * (nt + 1.0) / 2.0
    }

    /// Continuity-corrected z-score of the treatment U
    pub fn z_score(&self) -> f64 {
        let nb = self.baseline.len() as f64;
        let nt = self.treatment.len() as f64;
        let n = nb + nt;

        let (rank_sum, tie_term) = self.rank_sum();
        let u = rank_sum - nt * (nt + 1.0) / 2.0;
        let mean_u = nb * nt / 2.0;
        let var_u = nb * nt / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));

        if var_u <= 0.0 {
            return 0.0;
        }

        let deviation = u - mean_u;
        let corrected = (deviation.abs() - 0.5).max(0.0) * deviation.signum();
        corrected / var_u.sqrt()
    }
}

impl StatisticalTest for MannWhitneyU {
    fn statistic(&self) -> Result<f64> {
        Ok(self.u_statistic())
    }

    fn test(&self) -> Result<f64> {
        normal_p_value(self.z_score())
    }

    /// Normal-approximation interval on the difference of means
    fn confidence_interval(&self, confidence: f64) -> Result<(f64, f64)> {
        let baseline = DescriptiveStats::from_samples(&self.baseline);
        let treatment = DescriptiveStats::from_samples(&self.treatment);

        let diff = treatment.mean - baseline.mean;
        let se = (baseline.mean_variance() + treatment.mean_variance()).sqrt();
        let margin = z_critical(confidence)? * se;

        Ok((diff - margin, diff + margin))
    }
}
