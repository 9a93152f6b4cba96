//! Bootstrap configuration for Daedalus.
//!
//! This crate loads the bootstrap document an application starts from:
//! - TOML, JSON and YAML files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Overview
//!
//! [`BootstrapConfig`] holds every section:
//!
//! - [`AppConfig`] - application identity and advertised endpoints
//! - [`LogConfig`] - logging, consumed by `daedalus-telemetry`
//! - [`FileServiceConfig`] - embed threshold and chunk size of the file service
//! - [`RegistryConfig`] - registrar and discovery backends by name
//! - [`ServiceConfig`] - client and server middleware declarations per service
//!
//! # Example
//!
//! ```no_run
//! use daedalus_config::ConfigLoader;
//!
//! # fn main() -> Result<(), daedalus_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_file("bootstrap.toml")?
//!     .with_env_prefix("DAEDALUS")
//!     .load()?;
//!
//! println!("starting {}", config.app.name);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [app]
//! name = "greeter"
//! version = "1.0.0"
//! environment = "production"
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [files]
//! embed_threshold = 65536
//! chunk_size = 4194304
//!
//! [registries.default]
//! type = "consul"
//! endpoint = "127.0.0.1:8500"
//!
//! [[services]]
//! name = "greeter"
//!
//! [[services.middlewares.server]]
//! type = "logging"
//!
//! [[services.middlewares.server]]
//! type = "selector"
//! params = { wraps = "logging", prefixes = ["/api"] }
//! ```
//!
//! # Environment Variable Overrides
//!
//! Scalar values can be overridden via environment variables using the
//! format `PREFIX__SECTION__KEY`. For example:
//!
//! - `DAEDALUS__APP__NAME=greeter`
//! - `DAEDALUS__LOGGING__FORMAT=pretty`
//! - `DAEDALUS__FILES__EMBED_THRESHOLD=1024`
//! - `DAEDALUS__REGISTRIES__DEFAULT__ENDPOINT=10.0.0.1:8500`

#![doc(html_root_url = "https://docs.rs/daedalus-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{BootstrapConfig, BootstrapConfigBuilder};
pub use daedalus_files::FileServiceConfig;
pub use daedalus_middleware::{MiddlewareDecl, MiddlewareSet};
pub use daedalus_telemetry::{LogConfig, LogFormat};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{AppConfig, RegistryConfig, ServiceConfig, STATIC_REGISTRY};
