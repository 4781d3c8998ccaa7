//! CLI error type.

use chroma_models::ModelError;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Input file does not exist
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Command line argument could not be interpreted
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Model construction or evaluation failed
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Simulation file could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    /// Simulation could not be written as TOML
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// JSON output failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<chroma_core::types::CoreError> for CliError {
    fn from(err: chroma_core::types::CoreError) -> Self {
        CliError::Model(err.into())
    }
}

/// Result alias for CLI commands.
pub type Result<T> = std::result::Result<T, CliError>;
