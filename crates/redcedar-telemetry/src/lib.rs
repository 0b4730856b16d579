//! Logging setup for Redcedar services.
//!
//! Every Redcedar crate logs through `tracing`. This crate installs the
//! subscriber that turns those events into output:
//!
//! - JSON lines in production, pretty output in development
//! - `EnvFilter` directives, with `RUST_LOG` taking precedence
//! - Standard field names in [`logging::fields`]
//!
//! # Example
//!
//! ```rust,ignore
//! use redcedar_telemetry::{init_logging, LogConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("starting");
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/redcedar-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
