//! Configuration schema types.
//!
//! This module defines the bootstrap sections owned by this crate. The
//! `[logging]`, `[files]` and per-service middleware sections reuse the
//! types of the crates that consume them.

use daedalus_core::ServiceInstance;
use daedalus_middleware::MiddlewareSet;
use serde::{Deserialize, Serialize};

/// Application identity section.
///
/// # Example
///
/// ```
/// use daedalus_config::AppConfig;
///
/// let app = AppConfig {
///     name: "greeter".to_string(),
///     version: "1.0.0".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(app.environment, "development");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application name, also the registered service name.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Application version.
    #[serde(default)]
    pub version: String,

    /// Deployment environment (development, staging, production).
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Instance id. Generated from the name when empty.
    #[serde(default)]
    pub id: String,

    /// Endpoints advertised to registrars, e.g. `grpc://10.0.0.1:9000`.
    #[serde(default)]
    pub endpoints: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: String::new(),
            environment: default_environment(),
            id: String::new(),
            endpoints: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Returns the instance advertised to registrars.
    #[must_use]
    pub fn instance(&self) -> ServiceInstance {
        let id = if self.id.is_empty() {
            format!("{}-{}", self.name, std::process::id())
        } else {
            self.id.clone()
        };
        let mut instance = ServiceInstance::new(&self.name, id).with_version(&self.version);
        instance.endpoints = self.endpoints.clone();
        instance
            .metadata
            .insert("environment".to_string(), self.environment.clone());
        instance
    }
}

fn default_app_name() -> String {
    "daedalus".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

/// Registry backend type served by the runtime itself.
pub const STATIC_REGISTRY: &str = "static";

/// One `[registries.<name>]` entry.
///
/// The runtime only builds `static` backends; other types name a backend
/// the application supplies under the same entry name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Backend type, e.g. `consul`, `etcd` or `static`.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Backend address.
    #[serde(default)]
    pub endpoint: String,

    /// Backend-specific parameters. For `static`, an `instances` list.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

impl RegistryConfig {
    /// Returns `true` for backends the runtime builds itself.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.kind == STATIC_REGISTRY
    }

    /// Returns the instance list of a `static` backend.
    pub fn static_instances(&self) -> Result<Vec<ServiceInstance>, crate::ConfigError> {
        match self.params.get("instances") {
            None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                crate::ConfigError::invalid_value("registries.params.instances", e.to_string())
            }),
        }
    }
}

/// One `[[services]]` entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Service name, unique within the document.
    pub name: String,

    /// Client and server middleware declarations.
    #[serde(default)]
    pub middlewares: MiddlewareSet,
}

impl ServiceConfig {
    /// Creates a service with no middleware.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            middlewares: MiddlewareSet::default(),
        }
    }
}
