//! Core types and data models for the A/B experimentation engine
//!
//! This crate provides the experiment configuration, the event log entries,
//! and the analysis results shared by the engine and its callers.

pub mod errors;
pub mod events;
pub mod experiments;

pub use errors::{ValidationError, Result};
pub use events::{Event, Variant};
pub use experiments::{
    Experiment, ExperimentConfig, ExperimentProgress, ExperimentResult, ExperimentStatus,
    MetricType, Operation, Recommendation, TestMethod,
};
