//! # Daedalus Middleware
//!
//! Declarative middleware chains for the Daedalus runtime.
//!
//! Services declare their client and server middleware as lists of
//! [`MiddlewareDecl`] entries. The [`ChainBuilder`] turns a list into a
//! [`Chain`] by looking each entry up in a [`Registry`] of [`Factory`]
//! implementations:
//!
//! ```text
//! decls ──► pass 1: non-selectors, in order ──► pass 2: selectors, in order ──► Chain
//!                     │                                   ▲
//!                     └──────────── Carrier ──────────────┘
//! ```
//!
//! Every built middleware is published in a per-pass [`Carrier`] under its
//! effective name, so `selector` entries can wrap middleware built earlier.
//!
//! ## Built-in factories
//!
//! | Type | Purpose |
//! |------|---------|
//! | `logging` | Structured call logging |
//! | `tracing` | Trace context propagation and spans |
//! | `metadata` | Header metadata and request id propagation |
//! | `timeout` | Deadline enforcement |
//! | `selector` | Conditional application of other middleware |
//!
//! ## Example
//!
//! ```
//! use daedalus_middleware::{build_server, MiddlewareDecl};
//! use serde_json::json;
//!
//! let decls = vec![
//!     MiddlewareDecl::new("logging"),
//!     MiddlewareDecl::new("selector").with_params(json!({ "wraps": "logging" })),
//!     MiddlewareDecl::new("tracing"),
//! ];
//!
//! let chain = build_server(&decls, &[]);
//! assert_eq!(chain.names(), vec!["logging", "tracing", "selector"]);
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod builder;
pub mod carrier;
pub mod chain;
pub mod context;
pub mod declaration;
pub mod middleware;
pub mod options;
pub mod registry;
pub mod stages;
pub mod types;

// Re-export main types at crate root
pub use builder::{build_client, build_server, ChainBuilder};
pub use carrier::Carrier;
pub use chain::Chain;
pub use context::{CallContext, RequestId};
pub use daedalus_core::BoxFuture;
pub use declaration::{MiddlewareDecl, MiddlewareSet, SELECTOR};
pub use middleware::{compose, BoxedMiddleware, Middleware, Next};
pub use options::{with_carrier, with_registry, with_service_name, MiddlewareOptions};
pub use registry::{Factory, FnFactory, Registry};
pub use types::{HandlerResult, Request, Response, ResponseExt, Side};
