//! Configuration management for the A/B experimentation engine

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Defaults applied to new experiments and planning
    pub analysis: AnalysisDefaults,

    /// State machine policy
    pub lifecycle: LifecyclePolicy,

    /// Observability settings
    pub observability: ObservabilityConfig,
}

impl EngineConfig {
    /// Load configuration from defaults, an optional YAML file and the environment
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }

        // Override with environment variables (prefixed with ABTEST_)
        figment = figment.merge(Env::prefixed("ABTEST_").split("__"));

        let config: EngineConfig = figment
            .extract()
            .map_err(|e| ConfigError::LoadError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let analysis = &self.analysis;

        if !(analysis.significance_level > 0.0 && analysis.significance_level < 1.0) {
            return Err(ConfigError::ValidationError(
                "analysis.significance_level must be in (0, 1)".to_string(),
            ));
        }

        if !(analysis.power > 0.0 && analysis.power < 1.0) {
            return Err(ConfigError::ValidationError(
                "analysis.power must be in (0, 1)".to_string(),
            ));
        }

        if !(analysis.traffic_split > 0.0 && analysis.traffic_split < 1.0) {
            return Err(ConfigError::ValidationError(
                "analysis.traffic_split must be in (0, 1)".to_string(),
            ));
        }

        if analysis.min_sample_size == 0 {
            return Err(ConfigError::ValidationError(
                "analysis.min_sample_size must be positive".to_string(),
            ));
        }

        if analysis.max_duration_days == 0 {
            return Err(ConfigError::ValidationError(
                "analysis.max_duration_days must be positive".to_string(),
            ));
        }

        if self.observability.log_level.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "observability.log_level required".to_string(),
            ));
        }

        Ok(())
    }
}

/// Defaults for experiment design
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisDefaults {
    /// Significance level (alpha)
    pub significance_level: f64,

    /// Statistical power (1 - beta)
    pub power: f64,

    /// Minimum sample size per arm
    pub min_sample_size: u64,

    /// Maximum experiment duration in days
    pub max_duration_days: u32,

    /// Fraction of traffic routed to treatment
    pub traffic_split: f64,
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            power: 0.80,
            min_sample_size: 100,
            max_duration_days: 14,
            traffic_split: 0.5,
        }
    }
}

/// Lifecycle policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifecyclePolicy {
    /// Complete a running experiment on analysis once both arms reach the
    /// minimum sample size or the maximum duration has elapsed
    pub auto_complete: bool,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self { auto_complete: true }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,

    /// Enable structured JSON logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.analysis.significance_level, 0.05);
        assert_eq!(config.analysis.min_sample_size, 100);
        assert!(config.lifecycle.auto_complete);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.analysis.significance_level = 0.0;
        assert!(config.validate().is_err());

        config.analysis.significance_level = 0.05;
        config.analysis.traffic_split = 1.0;
        assert!(config.validate().is_err());

        config.analysis.traffic_split = 0.5;
        config.analysis.min_sample_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "abtest.yaml",
                r#"
analysis:
  significance_level: 0.01
  min_sample_size: 500
lifecycle:
  auto_complete: false
"#,
            )?;
            jail.set_env("ABTEST_OBSERVABILITY__LOG_LEVEL", "debug");

            let config = EngineConfig::load(Some(PathBuf::from("abtest.yaml")))
                .map_err(|e| e.to_string())?;

            assert_eq!(config.analysis.significance_level, 0.01);
            assert_eq!(config.analysis.min_sample_size, 500);
            assert_eq!(config.analysis.power, 0.80);
            assert!(!config.lifecycle.auto_complete);
            assert_eq!(config.observability.log_level, "debug");
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        Jail::expect_with(|jail| {
            jail.set_env("ABTEST_ANALYSIS__POWER", "1.5");

            let result = EngineConfig::load(None);
            assert!(matches!(result, Err(ConfigError::ValidationError(_))));
            Ok(())
        });
    }
}
