//! # Daedalus
//!
//! **Assembly kit for distributed microservices**
//!
//! Daedalus turns a bootstrap document and a few builder calls into a
//! ready-to-run process:
//!
//! - **Declarative middleware** – client and server chains built from `[[services]]` entries
//! - **Factory registry** – middleware types resolved by name, with selectors built last
//! - **Content-addressed files** – small files embedded, large files sharded by SHA-256
//! - **Named components** – registrars, discoveries and user components by type and name
//! - **Ordered lifecycle** – startup hooks in order, shutdown hooks in reverse
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use daedalus::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = App::builder("bootstrap.toml")
//!         .with_env_prefix("DAEDALUS")
//!         .on_shutdown(|_| async { Ok(()) })
//!         .build()?;
//!
//!     let greeter = app.service("greeter").expect("declared in bootstrap");
//!     println!("server chain: {:?}", greeter.server.names());
//!
//!     app.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Startup
//!
//! ```text
//! bootstrap file → ConfigLoader → init_logging → ComponentProvider
//!                                                      ↓
//!        for each service: ChainBuilder (client) + ChainBuilder (server)
//!                                                      ↓
//! start(): startup hooks → registrars.register
//! shutdown(): registrars.deregister → shutdown hooks (reverse)
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod error;
pub mod lifecycle;

pub use app::{App, AppBuilder, ServiceChains};
pub use error::{AppError, AppResult};
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleHook, LifecycleResult};

pub use daedalus_config as config;
pub use daedalus_core as core;
pub use daedalus_files as files;
pub use daedalus_middleware as middleware;
pub use daedalus_telemetry as telemetry;

pub use daedalus_config::{BootstrapConfig, ConfigLoader, ServiceConfig};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use daedalus::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{App, AppError, Lifecycle, LifecycleError, ServiceChains};

    pub use daedalus_config::{BootstrapConfig, ConfigLoader, ServiceConfig};

    pub use daedalus_core::options::{apply, cond, configure, group, new_t, with_value};
    pub use daedalus_core::{
        ComponentProvider, Discovery, ErrorKind, Opt, OptionContext, Registrar, RuntimeError,
        ServiceInstance,
    };

    pub use daedalus_files::{ContentHash, FileMeta, FileService, FileServiceConfig};

    pub use daedalus_middleware::{
        Carrier, CallContext, Chain, ChainBuilder, Factory, Middleware, MiddlewareDecl, Next,
        Registry, Request, Response, ResponseExt, Side,
    };
}
