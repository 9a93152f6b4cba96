//! Two-pass middleware chain builder.
//!
//! Declarations are built in order. Selector entries are deferred to a
//! second pass so every non-selector middleware of the same side is already
//! in the carrier when a selector's factory runs. Entries that cannot be
//! built are logged and skipped; a build never fails as a whole.

use crate::carrier::Carrier;
use crate::chain::Chain;
use crate::declaration::MiddlewareDecl;
use crate::middleware::BoxedMiddleware;
use crate::options::{with_carrier, MiddlewareOptions};
use crate::registry::{Factory, Registry};
use crate::types::Side;
use daedalus_core::Opt;
use std::sync::Arc;

/// Builds client and server chains from declarations.
///
/// # Example
///
/// ```
/// use daedalus_middleware::builder::ChainBuilder;
/// use daedalus_middleware::MiddlewareDecl;
///
/// let decls = vec![
///     MiddlewareDecl::new("selector").with_params(serde_json::json!({ "wraps": "logging" })),
///     MiddlewareDecl::new("logging"),
///     MiddlewareDecl::new("timeout").disabled(),
/// ];
///
/// let chain = ChainBuilder::new(&[]).build_server(&decls);
/// assert_eq!(chain.names(), vec!["logging", "selector"]);
/// ```
pub struct ChainBuilder<'o> {
    opts: &'o [Opt],
    registry: Arc<Registry>,
}

impl<'o> ChainBuilder<'o> {
    /// Creates a builder, resolving the registry from `opts`.
    #[must_use]
    pub fn new(opts: &'o [Opt]) -> Self {
        let registry = MiddlewareOptions::from_options(opts).registry();
        Self { opts, registry }
    }

    /// Builds the client chain.
    #[must_use]
    pub fn build_client(&self, decls: &[MiddlewareDecl]) -> Chain {
        self.build(Side::Client, decls)
    }

    /// Builds the server chain.
    #[must_use]
    pub fn build_server(&self, decls: &[MiddlewareDecl]) -> Chain {
        self.build(Side::Server, decls)
    }

    /// Builds the chain for `side`.
    #[must_use]
    pub fn build(&self, side: Side, decls: &[MiddlewareDecl]) -> Chain {
        let mut pass = Pass {
            side,
            opts: self.opts,
            chain: Vec::with_capacity(decls.len()),
            carrier: Carrier::new(),
        };
        let mut deferred = Vec::new();

        for decl in decls {
            if !decl.enabled {
                tracing::debug!(side = %side, middleware = %decl.effective_name(), "Skipping disabled middleware");
                continue;
            }
            if decl.is_selector() {
                deferred.push(decl);
                continue;
            }
            let factory = self
                .registry
                .get(decl.effective_name())
                .or_else(|| self.registry.get(&decl.kind));
            pass.build_one(decl, factory);
        }

        for decl in deferred {
            pass.build_one(decl, self.registry.get(&decl.kind));
        }

        Chain::new(pass.chain)
    }
}

struct Pass<'o> {
    side: Side,
    opts: &'o [Opt],
    chain: Vec<BoxedMiddleware>,
    carrier: Carrier,
}

impl Pass<'_> {
    fn build_one(&mut self, decl: &MiddlewareDecl, factory: Option<Arc<dyn Factory>>) {
        let name = decl.effective_name();
        let Some(factory) = factory else {
            tracing::warn!(
                side = %self.side,
                middleware = %name,
                kind = %decl.kind,
                "No factory registered for middleware, skipping"
            );
            return;
        };

        let mut opts = self.opts.to_vec();
        opts.push(with_carrier(self.carrier.clone()));

        let built = match self.side {
            Side::Client => factory.build_client(decl, &opts),
            Side::Server => factory.build_server(decl, &opts),
        };
        let Some(middleware) = built else {
            tracing::debug!(side = %self.side, middleware = %name, "Factory produced no middleware");
            return;
        };

        if self.carrier.get(self.side, name).is_some() {
            tracing::warn!(
                side = %self.side,
                middleware = %name,
                "Duplicate middleware name, later instance replaces earlier in carrier"
            );
        }
        tracing::debug!(side = %self.side, middleware = %name, "Built middleware");
        self.carrier.put(self.side, name, Arc::clone(&middleware));
        self.chain.push(middleware);
    }
}

/// Builds the client chain for `decls`.
#[must_use]
pub fn build_client(decls: &[MiddlewareDecl], opts: &[Opt]) -> Chain {
    ChainBuilder::new(opts).build_client(decls)
}

/// Builds the server chain for `decls`.
#[must_use]
pub fn build_server(decls: &[MiddlewareDecl], opts: &[Opt]) -> Chain {
    ChainBuilder::new(opts).build_server(decls)
}
