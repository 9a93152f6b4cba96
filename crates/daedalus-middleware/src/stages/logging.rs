//! Call logging middleware.
//!
//! Emits one structured event per call once the rest of the chain has
//! finished: `info` for successful calls, `warn` for errors and for calls
//! slower than the configured threshold.
//!
//! ```toml
//! [[services.middlewares.server]]
//! type = "logging"
//! params = { slow_threshold_ms = 500, include_metadata = true }
//! ```

use super::parse_params;
use crate::context::CallContext;
use crate::declaration::MiddlewareDecl;
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::registry::Factory;
use crate::types::{HandlerResult, Request, Side};
use daedalus_core::{BoxFuture, Opt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Factory key.
pub const TYPE: &str = "logging";

/// Parameters of the logging middleware.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Calls slower than this are logged at `warn`. `0` disables the check.
    pub slow_threshold_ms: u64,
    /// Whether call metadata is included in the event.
    pub include_metadata: bool,
}

/// Logs each call with its duration and outcome.
#[derive(Debug, Clone)]
pub struct LoggingMiddleware {
    name: String,
    config: LoggingConfig,
}

impl LoggingMiddleware {
    /// Creates a logging middleware.
    #[must_use]
    pub fn new(name: impl Into<String>, config: LoggingConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    fn is_slow(&self, elapsed: Duration) -> bool {
        self.config.slow_threshold_ms > 0
            && elapsed >= Duration::from_millis(self.config.slow_threshold_ms)
    }
}

impl Middleware for LoggingMiddleware {
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
            let method = request.method().to_string();
            let path = request.uri().path().to_string();
            let started = std::time::Instant::now();

            let result = next.run(ctx, request).await;

            let elapsed = started.elapsed();
            let duration_ms = elapsed.as_secs_f64() * 1000.0;
            let operation = ctx.operation().unwrap_or(&path);
            let metadata = if self.config.include_metadata {
                format!("{:?}", ctx.metadata_map())
            } else {
                String::new()
            };

            match &result {
                Ok(response) if self.is_slow(elapsed) => tracing::warn!(
                    request_id = %ctx.request_id(),
                    side = %ctx.side(),
                    service = ctx.service().unwrap_or_default(),
                    method = %method,
                    operation = %operation,
                    status = response.status().as_u16(),
                    duration_ms,
                    metadata = %metadata,
                    "Slow call"
                ),
                Ok(response) => tracing::info!(
                    request_id = %ctx.request_id(),
                    side = %ctx.side(),
                    service = ctx.service().unwrap_or_default(),
                    method = %method,
                    operation = %operation,
                    status = response.status().as_u16(),
                    duration_ms,
                    metadata = %metadata,
                    "Call completed"
                ),
                Err(e) => tracing::warn!(
                    request_id = %ctx.request_id(),
                    side = %ctx.side(),
                    service = ctx.service().unwrap_or_default(),
                    method = %method,
                    operation = %operation,
                    error_kind = %e.kind(),
                    error = %e,
                    duration_ms,
                    metadata = %metadata,
                    "Call failed"
                ),
            }

            result
        })
    }
}

/// Builds [`LoggingMiddleware`] for both sides.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingFactory;

impl LoggingFactory {
    fn build(side: Side, decl: &MiddlewareDecl) -> Option<BoxedMiddleware> {
        let config: LoggingConfig = parse_params(side, decl)?;
        Some(Arc::new(LoggingMiddleware::new(decl.effective_name(), config)))
    }
}

impl Factory for LoggingFactory {
    fn build_client(&self, decl: &MiddlewareDecl, _opts: &[Opt]) -> Option<BoxedMiddleware> {
        Self::build(Side::Client, decl)
    }

    fn build_server(&self, decl: &MiddlewareDecl, _opts: &[Opt]) -> Option<BoxedMiddleware> {
        Self::build(Side::Server, decl)
    }
}
