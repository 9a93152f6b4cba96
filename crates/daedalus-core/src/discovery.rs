//! Service registration and discovery contracts.
//!
//! Backends (Consul, etcd, Nacos, ...) live outside this crate and implement
//! [`Registrar`] and [`Discovery`]. The runtime only stores them by name and
//! calls them at startup and shutdown.

use crate::error::RuntimeResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One registered instance of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Unique instance identifier.
    pub id: String,
    /// Service name shared by all instances.
    pub name: String,
    /// Service version.
    #[serde(default)]
    pub version: String,
    /// Endpoints such as `grpc://10.0.0.1:9000`.
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ServiceInstance {
    /// Creates an instance with no endpoints or metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: String::new(),
            endpoints: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Adds an endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Registers service instances with a discovery backend.
pub trait Registrar: Send + Sync + 'static {
    /// Registers `instance`.
    fn register<'a>(&'a self, instance: &'a ServiceInstance) -> BoxFuture<'a, RuntimeResult<()>>;

    /// Removes `instance`.
    fn deregister<'a>(&'a self, instance: &'a ServiceInstance)
        -> BoxFuture<'a, RuntimeResult<()>>;
}

/// Resolves service names to instances.
pub trait Discovery: Send + Sync + 'static {
    /// Returns the instances currently known for `service`.
    fn instances<'a>(&'a self, service: &'a str) -> BoxFuture<'a, RuntimeResult<Vec<ServiceInstance>>>;
}

/// A [`Discovery`] over a fixed instance list.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    instances: Vec<ServiceInstance>,
}

impl StaticDiscovery {
    /// Creates a discovery serving `instances`.
    #[must_use]
    pub fn new(instances: Vec<ServiceInstance>) -> Self {
        Self { instances }
    }
}

impl Discovery for StaticDiscovery {
    fn instances<'a>(&'a self, service: &'a str) -> BoxFuture<'a, RuntimeResult<Vec<ServiceInstance>>> {
        Box::pin(async move {
            Ok(self
                .instances
                .iter()
                .filter(|i| i.name == service)
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_builder() {
        let instance = ServiceInstance::new("greeter", "greeter-1")
            .with_version("1.2.0")
            .with_endpoint("grpc://127.0.0.1:9000");

        assert_eq!(instance.name, "greeter");
        assert_eq!(instance.version, "1.2.0");
        assert_eq!(instance.endpoints, vec!["grpc://127.0.0.1:9000"]);
    }

    #[test]
    fn test_static_discovery_filters_by_name() {
        let discovery = StaticDiscovery::new(vec![
            ServiceInstance::new("greeter", "g-1"),
            ServiceInstance::new("billing", "b-1"),
            ServiceInstance::new("greeter", "g-2"),
        ]);

        let found = tokio_test::block_on(discovery.instances("greeter")).unwrap();
        let ids: Vec<_> = found.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["g-1", "g-2"]);
    }
}
