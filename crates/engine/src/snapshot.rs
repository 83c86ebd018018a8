//! Serializable view of an experiment collection
//!
//! A snapshot is a flat JSON object keyed by experiment id, suitable for a
//! key-value store. Restoring never relies on in-memory identity.

use abtest_types::{Experiment, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::errors::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentSnapshot {
    experiments: BTreeMap<Uuid, Experiment>,
}

impl ExperimentSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, experiment: Experiment) {
        self.experiments.insert(experiment.id, experiment);
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Check keys against embedded ids and re-validate every config
    pub fn validate(&self) -> Result<()> {
        for (key, experiment) in &self.experiments {
            if *key != experiment.id {
                return Err(ValidationError::new(
                    "snapshot",
                    format!("key {} does not match experiment id {}", key, experiment.id),
                )
                .into());
            }
            experiment.config.validate()?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a snapshot
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: ExperimentSnapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

impl IntoIterator for ExperimentSnapshot {
    type Item = Experiment;
    type IntoIter = std::collections::btree_map::IntoValues<Uuid, Experiment>;

    fn into_iter(self) -> Self::IntoIter {
        self.experiments.into_values()
    }
}

impl FromIterator<Experiment> for ExperimentSnapshot {
    fn from_iter<I: IntoIterator<Item = Experiment>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for experiment in iter {
            snapshot.insert(experiment);
        }
        snapshot
    }
}
