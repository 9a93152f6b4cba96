//! Built middleware chains.
//!
//! A [`Chain`] is the ordered list of middleware produced by the chain
//! builder for one side of one service. The first middleware is the
//! outermost: it sees the request first and the reply last.

use crate::context::CallContext;
use crate::middleware::{compose, BoxedMiddleware, Next};
use crate::types::{HandlerResult, Request};
use daedalus_core::BoxFuture;
use std::fmt;

/// An ordered, immutable middleware chain.
///
/// # Example
///
/// ```
/// use daedalus_middleware::{Chain, ResponseExt, Response, Side};
/// use daedalus_middleware::context::CallContext;
/// use bytes::Bytes;
/// use http_body_util::Full;
///
/// # tokio_test::block_on(async {
/// let chain = Chain::default();
/// let mut ctx = CallContext::new(Side::Server);
/// let request = http::Request::new(Full::new(Bytes::new()));
///
/// let response = chain
///     .handle(&mut ctx, request, |_ctx, _req| {
///         Box::pin(async { Ok(Response::ok("hello")) })
///     })
///     .await
///     .unwrap();
/// assert_eq!(response.status(), http::StatusCode::OK);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct Chain {
    middlewares: Vec<BoxedMiddleware>,
}

impl Chain {
    /// Creates a chain from built middleware.
    #[must_use]
    pub fn new(middlewares: Vec<BoxedMiddleware>) -> Self {
        Self { middlewares }
    }

    /// Runs `request` through every middleware and then `handler`.
    pub async fn handle<'a, H>(
        &'a self,
        ctx: &mut CallContext,
        request: Request,
        handler: H,
    ) -> HandlerResult
    where
        H: FnOnce(&mut CallContext, Request) -> BoxFuture<'static, HandlerResult> + Send + 'a,
    {
        compose(&self.middlewares, Next::handler(handler))
            .run(ctx, request)
            .await
    }

    /// Returns the instance names in chain order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Returns the middleware in chain order.
    #[must_use]
    pub fn middlewares(&self) -> &[BoxedMiddleware] {
        &self.middlewares
    }

    /// Returns the number of middleware in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns `true` if the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl From<Vec<BoxedMiddleware>> for Chain {
    fn from(middlewares: Vec<BoxedMiddleware>) -> Self {
        Self::new(middlewares)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("middlewares", &self.names())
            .finish()
    }
}
