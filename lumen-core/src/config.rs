//! Compositor configuration.
//!
//! TOML-based configuration for the reference compositor: the seat name,
//! the log filter, and one `[[outputs]]` section per display with either a
//! pinned layout position or automatic placement.
//!
//! ```toml
//! [seat]
//! name = "seat0"
//!
//! [logging]
//! filter = "info,lumen_display=debug"
//!
//! [[outputs]]
//! name = "HDMI-A-1"
//! x = 0
//! y = 0
//! scale = 1
//! transform = "normal"
//!
//! [[outputs]]
//! name = "DP-1"   # no x/y: placed automatically
//! ```

use crate::error::ConfigError;
use crate::geometry::Transform;

use serde::Deserialize;
use std::path::Path;

/// Top-level compositor configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositorConfig {
    #[serde(default)]
    pub seat: SeatConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,
}

/// Seat naming.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeatConfig {
    #[serde(default = "default_seat_name")]
    pub name: String,
}

impl Default for SeatConfig {
    fn default() -> Self {
        SeatConfig {
            name: default_seat_name(),
        }
    }
}

fn default_seat_name() -> String {
    "seat0".to_string()
}

/// Logging filter, `RUST_LOG` directive syntax.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Per-output configuration.
///
/// An output with both `x` and `y` set is pinned at that layout position;
/// otherwise it is placed automatically to the right of the rightmost
/// pinned output.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub name: String,
    pub x: Option<i32>,
    pub y: Option<i32>,
    #[serde(default = "default_scale")]
    pub scale: i32,
    #[serde(default)]
    pub transform: Transform,
}

fn default_scale() -> i32 {
    1
}

impl OutputConfig {
    /// The pinned position, or `None` for automatic placement.
    pub fn position(&self) -> Option<(i32, i32)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }
}

impl CompositorConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: CompositorConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path).map_err(ConfigError::FileReadError)?;
        Self::from_toml(&contents)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for output in &self.outputs {
            if output.scale < 1 {
                return Err(ConfigError::ValueOutOfRange {
                    key: format!("outputs.{}.scale", output.name),
                    message: "scale must be an integer >= 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_full_config() {
        let config = CompositorConfig::from_toml(
            r#"
            [seat]
            name = "seat1"

            [logging]
            filter = "debug"

            [[outputs]]
            name = "HDMI-A-1"
            x = 0
            y = 0
            transform = "90"

            [[outputs]]
            name = "DP-1"
            scale = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.seat.name, "seat1");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.outputs.len(), 2);
        assert_eq!(config.outputs[0].position(), Some((0, 0)));
        assert_eq!(config.outputs[0].transform, Transform::Rotated90);
        assert_eq!(config.outputs[1].position(), None);
        assert_eq!(config.outputs[1].scale, 2);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = CompositorConfig::from_toml("").unwrap();
        assert_eq!(config.seat.name, "seat0");
        assert_eq!(config.logging.filter, "info");
        assert!(config.outputs.is_empty());
    }

    #[test]
    fn rejects_zero_scale() {
        let result = CompositorConfig::from_toml(
            r#"
            [[outputs]]
            name = "X"
            scale = 0
            "#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_unknown_transform() {
        let result = CompositorConfig::from_toml(
            r#"
            [[outputs]]
            name = "X"
            transform = "45"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
