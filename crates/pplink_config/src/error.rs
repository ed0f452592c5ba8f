//! Error types for the configuration store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while reading or writing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Configuration file is locked by another writer: {0}")]
    Locked(PathBuf),

    #[error("Invalid configuration key: {0:?}")]
    InvalidKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
