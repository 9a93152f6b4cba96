//! Component provider.
//!
//! The [`ComponentProvider`] stores the runtime components an application
//! exposes to user code: arbitrary values keyed by type and instance name,
//! plus the registrars and discoveries configured for the process.
//!
//! # Example
//!
//! ```rust
//! use daedalus_core::component::ComponentProvider;
//! use std::sync::Arc;
//!
//! struct Database {
//!     dsn: String,
//! }
//!
//! let mut provider = ComponentProvider::new();
//! provider.register_named("primary", Arc::new(Database { dsn: "postgres://a".into() }));
//! provider.register_named("replica", Arc::new(Database { dsn: "postgres://b".into() }));
//!
//! let replica: Arc<Database> = provider.get_named("replica").unwrap();
//! assert_eq!(replica.dsn, "postgres://b");
//! ```

use crate::discovery::{Discovery, Registrar};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Instance name used by [`ComponentProvider::register`] and
/// [`ComponentProvider::get`].
pub const DEFAULT_COMPONENT: &str = "default";

/// Error when a component cannot be resolved.
#[derive(Debug, Clone)]
pub struct ComponentError {
    /// The type name that could not be resolved.
    pub type_name: &'static str,
    /// The instance name that was requested.
    pub name: String,
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "component {} named '{}' is not registered",
            self.type_name, self.name
        )
    }
}

impl std::error::Error for ComponentError {}

impl ComponentError {
    /// Creates an error for a missing component.
    pub fn not_registered<T>(name: impl Into<String>) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            name: name.into(),
        }
    }
}

/// Typed, named registry of runtime components.
///
/// Components are `Arc`-wrapped and keyed by `(TypeId, name)`, so the same
/// type may be registered under several names. Registrars and discoveries
/// live in their own name-keyed maps because they are trait objects.
#[derive(Default)]
pub struct ComponentProvider {
    components: HashMap<(TypeId, String), Arc<dyn Any + Send + Sync>>,
    registrars: BTreeMap<String, Arc<dyn Registrar>>,
    discoveries: BTreeMap<String, Arc<dyn Discovery>>,
}

impl ComponentProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component under [`DEFAULT_COMPONENT`].
    pub fn register<T: Send + Sync + 'static>(&mut self, component: Arc<T>) {
        self.register_named(DEFAULT_COMPONENT, component);
    }

    /// Registers a component under `name`, replacing any previous component
    /// of the same type and name.
    pub fn register_named<T: Send + Sync + 'static>(
        &mut self,
        name: impl Into<String>,
        component: Arc<T>,
    ) {
        self.components
            .insert((TypeId::of::<T>(), name.into()), component);
    }

    /// Resolves the component registered under [`DEFAULT_COMPONENT`].
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.get_named(DEFAULT_COMPONENT)
    }

    /// Resolves the component of type `T` registered under `name`.
    #[must_use]
    pub fn get_named<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.components
            .get(&(TypeId::of::<T>(), name.to_string()))
            .and_then(|c| Arc::clone(c).downcast::<T>().ok())
    }

    /// Resolves a component or returns an error.
    pub fn require<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ComponentError> {
        self.get_named(name)
            .ok_or_else(|| ComponentError::not_registered::<T>(name))
    }

    /// Returns the names under which components of type `T` are registered,
    /// sorted.
    #[must_use]
    pub fn names_of<T: Send + Sync + 'static>(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .components
            .keys()
            .filter(|(id, _)| *id == TypeId::of::<T>())
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Registers a registrar under `name`.
    pub fn register_registrar(&mut self, name: impl Into<String>, registrar: Arc<dyn Registrar>) {
        self.registrars.insert(name.into(), registrar);
    }

    /// Returns the registrar registered under `name`.
    #[must_use]
    pub fn registrar(&self, name: &str) -> Option<Arc<dyn Registrar>> {
        self.registrars.get(name).cloned()
    }

    /// Returns all registrars keyed by name.
    #[must_use]
    pub fn registrars(&self) -> &BTreeMap<String, Arc<dyn Registrar>> {
        &self.registrars
    }

    /// Registers a discovery under `name`.
    pub fn register_discovery(&mut self, name: impl Into<String>, discovery: Arc<dyn Discovery>) {
        self.discoveries.insert(name.into(), discovery);
    }

    /// Returns the discovery registered under `name`.
    #[must_use]
    pub fn discovery(&self, name: &str) -> Option<Arc<dyn Discovery>> {
        self.discoveries.get(name).cloned()
    }

    /// Returns all discoveries keyed by name.
    #[must_use]
    pub fn discoveries(&self) -> &BTreeMap<String, Arc<dyn Discovery>> {
        &self.discoveries
    }

    /// Returns the number of registered components, excluding registrars
    /// and discoveries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if no components are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Debug for ComponentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentProvider")
            .field("component_count", &self.components.len())
            .field("registrars", &self.registrars.keys().collect::<Vec<_>>())
            .field("discoveries", &self.discoveries.keys().collect::<Vec<_>>())
            .finish()
    }
}
