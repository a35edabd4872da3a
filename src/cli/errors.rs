//! CLI-specific error types
//!
//! Every CLI error is fatal: it is printed to stderr and the process
//! exits non-zero.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for CLI commands
pub type CliResult<T> = Result<T, CliError>;

/// CLI errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Config file already exists: {0}")]
    AlreadyInitialized(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}
