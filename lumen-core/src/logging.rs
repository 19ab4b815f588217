//! Logging bootstrap for Lumen.
//!
//! A thin layer over the `tracing` ecosystem. Binaries call
//! [`init_logging`] with the loaded configuration; tests and early startup
//! paths use [`init_minimal_logging`], which never fails and never panics
//! if a subscriber is already installed.

use crate::config::LoggingConfig;
use crate::error::{CoreError, LoggingError};

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes a minimal logging setup directed at `stderr`.
///
/// Filters via the `RUST_LOG` environment variable, defaulting to `info`.
/// Errors (e.g. a subscriber already being set) are ignored, so this is
/// safe to call from tests.
pub fn init_minimal_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    let _ = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Initializes logging from the compositor configuration.
///
/// The configured filter takes the same directive syntax as `RUST_LOG`
/// (e.g. `"info,lumen_display=debug"`); the environment variable still
/// wins when set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), CoreError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => {
            EnvFilter::try_new(&config.filter).map_err(|e| LoggingError::FilterError {
                filter: config.filter.clone(),
                message: e.to_string(),
            })?
        }
    };

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| LoggingError::InitializationError(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_directive_is_reported() {
        let config = LoggingConfig {
            filter: "lumen_display=not_a_level".to_string(),
        };
        // Only meaningful when RUST_LOG is unset, which is the common test
        // environment; with RUST_LOG set the env filter wins and this is a
        // no-op success.
        if std::env::var_os("RUST_LOG").is_none() {
            let result = init_logging(&config);
            assert!(result.is_err());
        }
    }

    #[test]
    fn minimal_init_is_idempotent() {
        init_minimal_logging();
        init_minimal_logging();
    }
}
