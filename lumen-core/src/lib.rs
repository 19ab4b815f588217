//! # Lumen Core Library (`lumen-core`)
//!
//! `lumen-core` is the foundation layer of the Lumen display-server project.
//! It carries the concerns every other Lumen crate leans on:
//!
//! - **Error handling**: a unified error system through [`error::CoreError`]
//!   and its specific companions [`error::ConfigError`] and
//!   [`error::LoggingError`].
//! - **Logging**: a `tracing`-based bootstrap in [`logging`], filtered via
//!   `RUST_LOG` or the loaded configuration.
//! - **Configuration**: TOML-based compositor configuration in [`config`],
//!   covering output placement, the seat name and the log filter.
//! - **Geometry**: the shared spatial vocabulary in [`geometry`]: boxes,
//!   output transforms and the wire's 24.8 fixed-point representation.
//!
//! Key types are re-exported at the crate root for ease of use.

pub mod config;
pub mod error;
pub mod geometry;
pub mod logging;

pub use config::{CompositorConfig, LoggingConfig, OutputConfig, SeatConfig};
pub use error::{ConfigError, CoreError, LoggingError};
pub use geometry::{Fixed, PBox, Transform};
