//! # Daedalus Core
//!
//! Core types for the Daedalus runtime.
//!
//! This crate provides the foundations shared by every other crate:
//!
//! - [`OptionContext`] and [`Opt`] - type-keyed option carrier and functional options
//! - [`ComponentProvider`] - named components, registrars and discoveries
//! - [`Registrar`] / [`Discovery`] - service registration contracts
//! - [`RuntimeError`] / [`ErrorKind`] - standard error types

#![doc(html_root_url = "https://docs.rs/daedalus-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod component;
pub mod discovery;
mod error;
pub mod options;

pub use component::{ComponentError, ComponentProvider};
pub use discovery::{BoxFuture, Discovery, Registrar, ServiceInstance, StaticDiscovery};
pub use error::{ErrorEnvelope, ErrorKind, RuntimeError, RuntimeResult};
pub use options::{Opt, OptionContext};
