//! Error types for the experimentation engine

use abtest_types::{ExperimentStatus, Operation, ValidationError};
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid state: cannot {operation} experiment in state {status}")]
    InvalidState {
        operation: Operation,
        status: ExperimentStatus,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Relative lift is undefined: baseline mean is zero")]
    UndefinedLift,

    #[error("Statistical error: {0}")]
    StatisticalError(String),

    #[error("Experiment not found: {0}")]
    ExperimentNotFound(Uuid),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub(crate) fn invalid_state(operation: Operation, status: ExperimentStatus) -> Self {
        EngineError::InvalidState { operation, status }
    }
}
