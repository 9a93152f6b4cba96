//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait every chain element
//! implements and the [`Next`] continuation used to invoke the rest of the
//! chain.
//!
//! # Example
//!
//! ```
//! use daedalus_middleware::{BoxFuture, HandlerResult, Middleware, Next, Request};
//! use daedalus_middleware::context::CallContext;
//!
//! struct Audit;
//!
//! impl Middleware for Audit {
//!     fn name(&self) -> &str {
//!         "audit"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut CallContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, HandlerResult> {
//!         Box::pin(async move {
//!             ctx.set_metadata("x-md-audited", "true");
//!             next.run(ctx, request).await
//!         })
//!     }
//! }
//! ```

use crate::context::CallContext;
use crate::types::{HandlerResult, Request};
use daedalus_core::BoxFuture;
use std::sync::Arc;

/// A shared, type-erased middleware.
///
/// Chains and carriers hold the same instances, so they are reference
/// counted.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The core middleware trait.
///
/// Middleware receives a mutable context, the request, and a [`Next`]
/// continuation. Calling `next.run()` invokes the rest of the chain; not
/// calling it short-circuits the chain.
pub trait Middleware: Send + Sync + 'static {
    /// Returns the instance name of this middleware.
    fn name(&self) -> &str;

    /// Processes the request through this middleware.
    fn process<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult>;
}

/// The terminal handler at the end of a chain.
pub type Handler<'a> =
    Box<dyn FnOnce(&mut CallContext, Request) -> BoxFuture<'static, HandlerResult> + Send + 'a>;

/// Continuation invoking the next middleware in the chain.
///
/// `run` consumes `self`, so the rest of the chain runs at most once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Handler(Handler<'a>),
}

impl<'a> Next<'a> {
    /// Creates a `Next` that invokes `middleware` and then `next`.
    pub fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the handler.
    pub fn handler<F>(f: F) -> Self
    where
        F: FnOnce(&mut CallContext, Request) -> BoxFuture<'static, HandlerResult> + Send + 'a,
    {
        Self {
            inner: NextInner::Handler(Box::new(f)),
        }
    }

    /// Invokes the next middleware or the handler.
    pub async fn run(self, ctx: &mut CallContext, request: Request) -> HandlerResult {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(ctx, request, *next).await,
            NextInner::Handler(handler) => handler(ctx, request).await,
        }
    }
}

/// Wraps `middlewares` around `next`, the first element outermost.
pub fn compose<'a>(middlewares: &'a [BoxedMiddleware], next: Next<'a>) -> Next<'a> {
    middlewares
        .iter()
        .rev()
        .fold(next, |next, middleware| Next::new(middleware.as_ref(), next))
}
