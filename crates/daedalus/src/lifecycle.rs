//! Lifecycle hooks for application startup and shutdown.
//!
//! # Example
//!
//! ```rust,ignore
//! use daedalus::Lifecycle;
//!
//! let lifecycle = Lifecycle::new()
//!     .on_startup(|components| async move {
//!         let pool = components.require::<Pool>("primary")?;
//!         pool.warm_up().await;
//!         Ok(())
//!     })
//!     .on_shutdown(|components| async move {
//!         if let Some(pool) = components.get::<Pool>() {
//!             pool.close().await;
//!         }
//!         Ok(())
//!     });
//! ```
//!
//! # Execution Order
//!
//! - **Startup hooks**: run in registration order; the first failure stops the run
//! - **Shutdown hooks**: run in reverse registration order; every hook runs and
//!   failures are collected

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use daedalus_core::{BoxFuture, ComponentError, ComponentProvider};
use thiserror::Error;

/// Error type for lifecycle hook failures.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A startup hook failed.
    #[error("Startup hook failed: {0}")]
    StartupFailed(String),

    /// One or more shutdown hooks failed.
    #[error("Shutdown hook failed: {0}")]
    ShutdownFailed(String),

    /// Generic hook error with source.
    #[error("Lifecycle hook error: {message}")]
    HookError {
        /// Error message
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl LifecycleError {
    /// Creates a new hook error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::HookError {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new hook error with a source.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::HookError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<ComponentError> for LifecycleError {
    fn from(err: ComponentError) -> Self {
        Self::with_source("component lookup failed", err)
    }
}

/// Result type for lifecycle hooks.
pub type LifecycleResult<T = ()> = Result<T, LifecycleError>;

/// A lifecycle hook callback.
///
/// Receives the application's component provider and returns a future
/// resolving to a result.
pub type LifecycleHook =
    Arc<dyn Fn(Arc<ComponentProvider>) -> BoxFuture<'static, LifecycleResult> + Send + Sync>;

/// Ordered startup and shutdown hooks.
#[must_use]
#[derive(Default)]
pub struct Lifecycle {
    startup_hooks: Vec<(String, LifecycleHook)>,
    shutdown_hooks: Vec<(String, LifecycleHook)>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("startup_hooks", &hook_names(&self.startup_hooks))
            .field("shutdown_hooks", &hook_names(&self.shutdown_hooks))
            .finish()
    }
}

impl Lifecycle {
    /// Creates a new empty lifecycle manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a startup hook.
    pub fn on_startup<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(Arc<ComponentProvider>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        let name = format!("startup_{}", self.startup_hooks.len());
        self.on_startup_named(name, hook)
    }

    /// Registers a named startup hook.
    ///
    /// Like `on_startup` but with a custom name for logging.
    pub fn on_startup_named<F, Fut>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(Arc<ComponentProvider>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        self.startup_hooks.push((name.into(), boxed(hook)));
        self
    }

    /// Registers a shutdown hook.
    pub fn on_shutdown<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(Arc<ComponentProvider>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        let name = format!("shutdown_{}", self.shutdown_hooks.len());
        self.on_shutdown_named(name, hook)
    }

    /// Registers a named shutdown hook.
    ///
    /// Like `on_shutdown` but with a custom name for logging.
    pub fn on_shutdown_named<F, Fut>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(Arc<ComponentProvider>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        self.shutdown_hooks.push((name.into(), boxed(hook)));
        self
    }

    /// Returns the number of startup hooks.
    pub fn startup_hook_count(&self) -> usize {
        self.startup_hooks.len()
    }

    /// Returns the number of shutdown hooks.
    pub fn shutdown_hook_count(&self) -> usize {
        self.shutdown_hooks.len()
    }

    /// Runs all startup hooks in registration order.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::StartupFailed` for the first hook that fails;
    /// later hooks do not run.
    pub async fn run_startup(&self, components: &Arc<ComponentProvider>) -> LifecycleResult {
        for (name, hook) in &self.startup_hooks {
            tracing::debug!(hook = %name, "Running startup hook");
            if let Err(e) = hook(Arc::clone(components)).await {
                tracing::error!(hook = %name, error = %e, "Startup hook failed");
                return Err(LifecycleError::StartupFailed(format!(
                    "Hook '{}' failed: {}",
                    name, e
                )));
            }
            tracing::debug!(hook = %name, "Startup hook completed");
        }
        Ok(())
    }

    /// Runs all shutdown hooks in reverse registration order.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::ShutdownFailed` summarising every hook that
    /// failed.
    pub async fn run_shutdown(&self, components: &Arc<ComponentProvider>) -> LifecycleResult {
        let mut errors: Vec<String> = Vec::new();

        for (name, hook) in self.shutdown_hooks.iter().rev() {
            tracing::debug!(hook = %name, "Running shutdown hook");
            match hook(Arc::clone(components)).await {
                Ok(()) => tracing::debug!(hook = %name, "Shutdown hook completed"),
                Err(e) => {
                    tracing::error!(hook = %name, error = %e, "Shutdown hook failed");
                    errors.push(format!("{}: {}", name, e));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::ShutdownFailed(errors.join("; ")))
        }
    }

    /// Appends the hooks of `other` after this lifecycle's hooks.
    pub fn merge(mut self, other: Lifecycle) -> Self {
        self.startup_hooks.extend(other.startup_hooks);
        self.shutdown_hooks.extend(other.shutdown_hooks);
        self
    }
}

fn hook_names(hooks: &[(String, LifecycleHook)]) -> Vec<&str> {
    hooks.iter().map(|(name, _)| name.as_str()).collect()
}

fn boxed<F, Fut>(hook: F) -> LifecycleHook
where
    F: Fn(Arc<ComponentProvider>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LifecycleResult> + Send + 'static,
{
    Arc::new(move |components| Box::pin(hook(components)))
}
