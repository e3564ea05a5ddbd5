//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found at the specified path.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Failed to read the configuration file.
    #[error("failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("failed to parse YAML configuration: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {message}")]
    ValidationError { message: String },

    /// Missing required field.
    #[error("missing required configuration field: {field}")]
    MissingField { field: String },

    /// Duplicate rack name.
    #[error("duplicate rack name: {0}")]
    DuplicateRackName(String),

    /// Duplicate slot id within a rack.
    #[error("duplicate slot id {slot} in rack '{rack}'")]
    DuplicateSlotId { rack: String, slot: i32 },

    /// Duplicate plugin name.
    #[error("duplicate plugin name: {0}")]
    DuplicatePluginName(String),

    /// Invalid port number.
    #[error("invalid port number: {0}")]
    InvalidPort(u16),
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
