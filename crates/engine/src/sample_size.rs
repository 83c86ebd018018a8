//! Sample size and power analysis for experiment design

use abtest_types::ValidationError;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::errors::{EngineError, Result};

/// How the metric's variance is derived from the baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceModel {
    /// Bernoulli variance `p(1 - p)`; baseline must lie in (0, 1)
    Proportion,
    /// Standard deviation is `cv * |baseline|`
    CoefficientOfVariation(f64),
    /// Known variance
    Variance(f64),
}

impl VarianceModel {
    /// Model used when the caller does not choose one
    pub fn for_baseline(baseline: f64) -> Self {
        if baseline > 0.0 && baseline < 1.0 {
            VarianceModel::Proportion
        } else {
            VarianceModel::CoefficientOfVariation(1.0)
        }
    }
}

/// Sample size calculator for A/B tests
#[derive(Debug, Clone)]
pub struct SampleSizeCalculator {
    /// Baseline conversion rate or mean
    pub baseline: f64,
    /// Minimum detectable effect (relative to baseline)
    pub min_effect: f64,
    /// Significance level (alpha)
    pub alpha: f64,
    /// Statistical power (1 - beta)
    pub power: f64,
    pub variance_model: VarianceModel,
}

impl SampleSizeCalculator {
    /// Create a new sample size calculator
    pub fn new(baseline: f64, min_effect: f64, alpha: f64, power: f64) -> Result<Self> {
        if !baseline.is_finite() {
            return Err(ValidationError::new("baseline", "must be finite").into());
        }

        if !min_effect.is_finite() || min_effect == 0.0 {
            return Err(ValidationError::new(
                "minimum_detectable_effect",
                "must be finite and non-zero",
            )
            .into());
        }

        if alpha <= 0.0 || alpha >= 1.0 {
            return Err(
                ValidationError::new("significance_level", "must be between 0 and 1").into(),
            );
        }

        if power <= 0.0 || power >= 1.0 {
            return Err(ValidationError::new("power", "must be between 0 and 1").into());
        }

        Ok(Self {
            baseline,
            min_effect,
            alpha,
            power,
            variance_model: VarianceModel::for_baseline(baseline),
        })
    }

    pub fn with_variance_model(mut self, variance_model: VarianceModel) -> Self {
        self.variance_model = variance_model;
        self
    }

    /// Absolute effect size implied by the relative MDE
    pub fn delta(&self) -> f64 {
        (self.baseline * self.min_effect).abs()
    }

    /// Per-observation variance under the configured model
    pub fn variance(&self) -> Result<f64> {
        let variance = match self.variance_model {
            VarianceModel::Proportion => {
                if self.baseline <= 0.0 || self.baseline >= 1.0 {
                    return Err(ValidationError::new(
                        "baseline",
                        "proportion must be between 0 and 1",
                    )
                    .into());
                }
                self.baseline * (1.0 - self.baseline)
            }
            VarianceModel::CoefficientOfVariation(cv) => {
                if !(cv.is_finite() && cv > 0.0) {
                    return Err(ValidationError::new(
                        "coefficient_of_variation",
                        "must be positive",
                    )
                    .into());
                }
                (cv * self.baseline).powi(2)
            }
            VarianceModel::Variance(variance) => {
                if !(variance.is_finite() && variance > 0.0) {
                    return Err(ValidationError::new("variance", "must be positive").into());
                }
                variance
            }
        };

        if variance == 0.0 {
            return Err(ValidationError::new("baseline", "implies zero variance").into());
        }

        Ok(variance)
    }

    fn effect(&self) -> Result<f64> {
        let delta = self.delta();
        if delta == 0.0 {
            return Err(ValidationError::new("baseline", "implies a zero effect size").into());
        }
        Ok(delta)
    }

    /// Calculate required sample size per arm
    ///
    /// `n = 2 (z_{alpha/2} + z_beta)^2 sigma^2 / delta^2`, rounded up.
    pub fn calculate(&self) -> Result<u64> {
        let variance = self.variance()?;
        let delta = self.effect()?;

        let normal = standard_normal()?;
        let z_alpha = normal.inverse_cdf(1.0 - self.alpha / 2.0);
        let z_beta = normal.inverse_cdf(self.power);

        let n = 2.0 * (z_alpha + z_beta).powi(2) * variance / delta.powi(2);

        if !n.is_finite() {
            return Err(EngineError::StatisticalError(
                "Sample size is not finite".to_string(),
            ));
        }

        Ok((n.ceil() as u64).max(1))
    }

    /// Power of the two-sided test for this effect with `n_per_arm` observations
    pub fn achieved_power(&self, n_per_arm: u64) -> Result<f64> {
        if n_per_arm == 0 {
            return Ok(0.0);
        }

        let variance = self.variance()?;
        let delta = self.effect()?;

        let normal = standard_normal()?;
        let z_alpha = normal.inverse_cdf(1.0 - self.alpha / 2.0);
        let noncentrality = delta / (2.0 * variance / n_per_arm as f64).sqrt();

        Ok(normal.cdf(noncentrality - z_alpha) + normal.cdf(-noncentrality - z_alpha))
    }
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| EngineError::StatisticalError(e.to_string()))
}

/// Required observations per arm to detect a relative `minimum_detectable_effect`
///
/// Baselines strictly inside (0, 1) are treated as proportions; any other
/// baseline is treated as a mean with a coefficient of variation of 1.
pub fn calculate_sample_size(
    baseline: f64,
    minimum_detectable_effect: f64,
    significance_level: f64,
    power: f64,
) -> Result<u64> {
    SampleSizeCalculator::new(baseline, minimum_detectable_effect, significance_level, power)?
        .calculate()
}
