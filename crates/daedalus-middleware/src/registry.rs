//! Middleware factory registry.
//!
//! The [`Registry`] maps factory keys to [`Factory`] implementations. The
//! chain builder looks entries up by their instance name first and by their
//! type second. A process-wide registry pre-populated with the built-in
//! factories is available through [`Registry::global`].

use crate::declaration::MiddlewareDecl;
use crate::middleware::BoxedMiddleware;
use crate::stages;
use daedalus_core::Opt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Builds middleware instances from declarations.
///
/// Factories return `None` when the entry does not apply to the side or
/// cannot be built; they log the reason themselves.
pub trait Factory: Send + Sync + 'static {
    /// Builds a middleware for the client pipeline.
    fn build_client(&self, decl: &MiddlewareDecl, opts: &[Opt]) -> Option<BoxedMiddleware>;

    /// Builds a middleware for the server pipeline.
    fn build_server(&self, decl: &MiddlewareDecl, opts: &[Opt]) -> Option<BoxedMiddleware>;
}

/// A factory built from a closure that serves both sides.
///
/// # Example
///
/// ```
/// use daedalus_middleware::registry::{FnFactory, Registry};
/// use std::sync::Arc;
///
/// let registry = Registry::new();
/// registry.register("noop", Arc::new(FnFactory::new(|_side, _decl, _opts| None)));
/// assert!(registry.get("noop").is_some());
/// ```
pub struct FnFactory<F> {
    func: F,
}

impl<F> FnFactory<F>
where
    F: Fn(crate::Side, &MiddlewareDecl, &[Opt]) -> Option<BoxedMiddleware> + Send + Sync + 'static,
{
    /// Wraps `func` as a factory.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Factory for FnFactory<F>
where
    F: Fn(crate::Side, &MiddlewareDecl, &[Opt]) -> Option<BoxedMiddleware> + Send + Sync + 'static,
{
    fn build_client(&self, decl: &MiddlewareDecl, opts: &[Opt]) -> Option<BoxedMiddleware> {
        (self.func)(crate::Side::Client, decl, opts)
    }

    fn build_server(&self, decl: &MiddlewareDecl, opts: &[Opt]) -> Option<BoxedMiddleware> {
        (self.func)(crate::Side::Server, decl, opts)
    }
}

/// Name-keyed factory table.
///
/// Reads and writes may happen concurrently. Registering an existing key
/// replaces the previous factory; there is no removal.
#[derive(Default)]
pub struct Registry {
    factories: RwLock<HashMap<String, Arc<dyn Factory>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in factories.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        stages::register_builtins(&registry);
        registry
    }

    /// Returns the process-wide registry.
    pub fn global() -> Arc<Registry> {
        static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::with_builtins())))
    }

    /// Registers `factory` under `name`, replacing any previous factory.
    pub fn register(&self, name: impl Into<String>, factory: Arc<dyn Factory>) {
        let name = name.into();
        let replaced = self.factories.write().insert(name.clone(), factory);
        if replaced.is_some() {
            tracing::debug!(factory = %name, "Replaced middleware factory");
        }
    }

    /// Looks up the factory registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Factory>> {
        self.factories.read().get(name).cloned()
    }

    /// Returns the registered keys, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of registered factories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    /// Returns `true` if no factory is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("factories", &self.names())
            .finish()
    }
}

/// Registers `factory` in the process-wide registry.
pub fn register(name: impl Into<String>, factory: Arc<dyn Factory>) {
    Registry::global().register(name, factory);
}

/// Looks up a factory in the process-wide registry.
#[must_use]
pub fn get(name: &str) -> Option<Arc<dyn Factory>> {
    Registry::global().get(name)
}
