//! Built-in middleware factories.
//!
//! | Type | Middleware |
//! |---|---|
//! | `logging` | structured call logging with duration and outcome |
//! | `tracing` | W3C `traceparent` propagation and a `tracing` span per call |
//! | `metadata` | header-based metadata extraction and injection |
//! | `timeout` | per-call deadline enforcement |
//! | `selector` | applies already-built middleware to matching calls only |
//!
//! Each factory parses its entry's `params` into a config struct. Entries
//! whose params do not parse are logged and skipped.

pub mod logging;
pub mod metadata;
pub mod selector;
pub mod timeout;
pub mod tracing;

use crate::declaration::MiddlewareDecl;
use crate::registry::Registry;
use crate::types::Side;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Registers every built-in factory under its type name.
pub fn register_builtins(registry: &Registry) {
    registry.register(logging::TYPE, Arc::new(logging::LoggingFactory));
    registry.register(metadata::TYPE, Arc::new(metadata::MetadataFactory));
    registry.register(selector::TYPE, Arc::new(selector::SelectorFactory));
    registry.register(timeout::TYPE, Arc::new(timeout::TimeoutFactory));
    registry.register(tracing::TYPE, Arc::new(tracing::TracingFactory));
}

/// Parses `decl.params`, logging and returning `None` on failure.
pub(crate) fn parse_params<T: DeserializeOwned + Default>(
    side: Side,
    decl: &MiddlewareDecl,
) -> Option<T> {
    match decl.params_as::<T>() {
        Ok(config) => Some(config),
        Err(e) => {
            ::tracing::warn!(
                side = %side,
                middleware = %decl.effective_name(),
                error = %e,
                "Invalid middleware params, skipping"
            );
            None
        }
    }
}
