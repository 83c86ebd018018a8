//! Command-line front end for the A/B experimentation engine
//!
//! The `abtest` binary plans experiments, runs simulated experiments end to
//! end and reports on saved snapshots.

pub mod commands;
pub mod output;

use abtest_config::ConfigError;
use abtest_engine::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type CliResult<T> = std::result::Result<T, CliError>;
