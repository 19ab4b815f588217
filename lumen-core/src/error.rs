//! Error handling for the Lumen core layer.
//!
//! Error types for the foundation crate, defined with `thiserror`. The
//! display-server library (`lumen-display`) layers its own protocol-level
//! error handling on top; everything ambient (configuration, logging, I/O)
//! funnels through [`CoreError`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for the Lumen foundation layer.
#[derive(Error, Debug)]
pub enum CoreError {
    /// An error occurred during I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An error occurred during configuration loading or parsing.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error occurred during logging initialization.
    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    /// A generic error with a custom message.
    #[error("{0}")]
    Generic(String),
}

impl CoreError {
    /// Create a new generic error with the given message.
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        CoreError::Generic(msg.into())
    }
}

/// Error type for configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The configuration file could not be read.
    #[error("Failed to read configuration file: {0}")]
    FileReadError(#[source] io::Error),

    /// The configuration file contains invalid TOML.
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A configuration value is out of the allowed range.
    #[error("Configuration value out of range for {key}: {message}")]
    ValueOutOfRange {
        /// The configuration key.
        key: String,
        /// A message describing the valid range.
        message: String,
    },
}

/// Error type for logging initialization.
#[derive(Error, Debug)]
pub enum LoggingError {
    /// Failed to initialize the logging system.
    #[error("Failed to initialize logging: {0}")]
    InitializationError(String),

    /// The configured log filter directive could not be parsed.
    #[error("Failed to parse log filter {filter:?}: {message}")]
    FilterError {
        /// The offending filter string.
        filter: String,
        /// Parser diagnostics.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_wraps_into_core_error() {
        let err: CoreError = ConfigError::FileNotFound(PathBuf::from("/tmp/lumen.toml")).into();
        assert!(matches!(err, CoreError::Config(_)));
        assert!(err.to_string().contains("/tmp/lumen.toml"));
    }

    #[test]
    fn generic_error_keeps_message() {
        let err = CoreError::generic("backend went away");
        assert_eq!(err.to_string(), "backend went away");
    }
}
