//! Structured logging for the Daedalus runtime.
//!
//! Every Daedalus crate logs through the `tracing` facade. This crate owns
//! the subscriber side: [`LogConfig`] is the `[logging]` section of the
//! bootstrap document and [`init_logging`] installs the global subscriber
//! it describes.
//!
//! # Example
//!
//! ```rust,ignore
//! use daedalus_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
