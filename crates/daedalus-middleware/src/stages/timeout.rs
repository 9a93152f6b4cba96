//! Timeout middleware.
//!
//! Bounds the rest of the chain by the earlier of the call's existing
//! deadline and `timeout_ms` from now. The effective deadline is written
//! back to the [`CallContext`] so downstream middleware and handlers can
//! observe it.

use super::parse_params;
use crate::context::CallContext;
use crate::declaration::MiddlewareDecl;
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::registry::Factory;
use crate::types::{HandlerResult, Request, Side};
use daedalus_core::{BoxFuture, Opt, RuntimeError};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Factory key.
pub const TYPE: &str = "timeout";

/// Parameters of the timeout middleware.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Per-call budget in milliseconds. `0` enforces only an existing
    /// context deadline.
    pub timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { timeout_ms: 1_000 }
    }
}

/// Fails calls that outlive their deadline with a timeout error.
#[derive(Debug, Clone)]
pub struct TimeoutMiddleware {
    name: String,
    timeout: Option<Duration>,
}

impl TimeoutMiddleware {
    /// Creates a timeout middleware.
    #[must_use]
    pub fn new(name: impl Into<String>, config: &TimeoutConfig) -> Self {
        Self {
            name: name.into(),
            timeout: (config.timeout_ms > 0).then(|| Duration::from_millis(config.timeout_ms)),
        }
    }

    fn deadline(&self, ctx: &CallContext) -> Option<Instant> {
        let own = self.timeout.map(|t| Instant::now() + t);
        match (ctx.deadline(), own) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

impl Middleware for TimeoutMiddleware {
    fn name(&self) -> &str {
        &self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let Some(deadline) = self.deadline(ctx) else {
                return next.run(ctx, request).await;
            };
            ctx.set_deadline(deadline);
            if ctx.is_expired() {
                return Err(RuntimeError::timeout("deadline already exceeded"));
            }

            let budget = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(budget, next.run(ctx, request)).await {
                Ok(result) => result,
                Err(_) => Err(RuntimeError::timeout(format!(
                    "call exceeded its deadline of {}ms",
                    budget.as_millis()
                ))),
            }
        })
    }
}

/// Builds [`TimeoutMiddleware`] for both sides.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutFactory;

impl TimeoutFactory {
    fn build(side: Side, decl: &MiddlewareDecl) -> Option<BoxedMiddleware> {
        let config: TimeoutConfig = parse_params(side, decl)?;
        Some(Arc::new(TimeoutMiddleware::new(decl.effective_name(), &config)))
    }
}

impl Factory for TimeoutFactory {
    fn build_client(&self, decl: &MiddlewareDecl, _opts: &[Opt]) -> Option<BoxedMiddleware> {
        Self::build(Side::Client, decl)
    }

    fn build_server(&self, decl: &MiddlewareDecl, _opts: &[Opt]) -> Option<BoxedMiddleware> {
        Self::build(Side::Server, decl)
    }
}
