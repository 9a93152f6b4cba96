//! Builder options for middleware chains.
//!
//! These options are threaded through an [`OptionContext`] by the chain
//! builder and read back by factories with [`MiddlewareOptions::from_options`].
//!
//! [`OptionContext`]: daedalus_core::OptionContext

use crate::carrier::Carrier;
use crate::registry::Registry;
use daedalus_core::options::{configure, new_t};
use daedalus_core::Opt;
use std::sync::Arc;

/// Structured options consumed by the chain builder and factories.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareOptions {
    /// Middleware already built in the current pass.
    pub carrier: Carrier,
    /// Registry override; the process-wide registry is used when unset.
    pub registry: Option<Arc<Registry>>,
    /// Name of the service the chain is built for.
    pub service_name: Option<String>,
}

impl MiddlewareOptions {
    /// Resolves the options from a functional option list.
    #[must_use]
    pub fn from_options(opts: &[Opt]) -> Self {
        new_t(opts)
    }

    /// Returns the registry to build from.
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone().unwrap_or_else(Registry::global)
    }
}

/// Option handing factories a carrier snapshot.
pub fn with_carrier(carrier: Carrier) -> Opt {
    configure(move |o: &mut MiddlewareOptions| o.carrier = carrier.clone())
}

/// Option selecting the registry the builder reads.
pub fn with_registry(registry: Arc<Registry>) -> Opt {
    configure(move |o: &mut MiddlewareOptions| o.registry = Some(Arc::clone(&registry)))
}

/// Option naming the service the chain belongs to.
pub fn with_service_name(name: impl Into<String>) -> Opt {
    let name = name.into();
    configure(move |o: &mut MiddlewareOptions| o.service_name = Some(name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_global_registry() {
        let options = MiddlewareOptions::from_options(&[]);
        assert!(options.registry.is_none());
        assert_eq!(options.carrier.server_len(), 0);
        assert!(Arc::ptr_eq(&options.registry(), &Registry::global()));
    }

    #[test]
    fn test_options_applied() {
        let registry = Arc::new(Registry::new());
        let options = MiddlewareOptions::from_options(&[
            with_registry(Arc::clone(&registry)),
            with_service_name("greeter"),
        ]);

        assert!(Arc::ptr_eq(&options.registry(), &registry));
        assert_eq!(options.service_name.as_deref(), Some("greeter"));
    }
}
