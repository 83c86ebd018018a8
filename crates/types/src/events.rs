//! Observation events recorded against a running experiment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Experiment arm a subject is bucketed into
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Baseline,
    Treatment,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Baseline => "baseline",
            Variant::Treatment => "treatment",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observed metric value
///
/// Events are immutable once appended to an experiment's log. The variant is
/// stored at recording time and never re-derived.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Subject the observation belongs to
    pub subject_id: String,
    /// Observed metric value
    pub value: f64,
    /// When the observation was recorded
    pub timestamp: DateTime<Utc>,
    /// Arm the subject was assigned to
    pub variant: Variant,
}

impl Event {
    pub fn new(
        subject_id: impl Into<String>,
        value: f64,
        timestamp: DateTime<Utc>,
        variant: Variant,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            value,
            timestamp,
            variant,
        }
    }
}
