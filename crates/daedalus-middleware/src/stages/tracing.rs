//! Tracing middleware.
//!
//! Propagates [W3C Trace Context](https://www.w3.org/TR/trace-context/)
//! ids and runs the rest of the chain inside a `tracing` span.
//!
//! - Server side: the trace id is taken from the incoming `traceparent`
//!   header, or generated when absent or malformed.
//! - Client side: the trace id already on the context is reused (or
//!   generated), and a `traceparent` header is written to the outgoing
//!   request.
//!
//! Either way a fresh span id is generated for the call.
//!
//! This is a reference adapter. It carries ids in-process and opens
//! spans; sampling and export belong to whatever subscriber the process
//! installs. Registering another factory under `tracing` replaces it.

use crate::context::CallContext;
use crate::declaration::MiddlewareDecl;
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::registry::Factory;
use crate::types::{HandlerResult, Request, Side};
use daedalus_core::{BoxFuture, Opt};
use http::HeaderValue;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Factory key.
pub const TYPE: &str = "tracing";

/// The W3C Trace Context header.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Parsed `traceparent` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// The 128-bit trace id as 32 hex characters.
    pub trace_id: String,
    /// The parent span id as 16 hex characters.
    pub parent_span_id: String,
    /// Trace flags.
    pub flags: TraceFlags,
}

impl TraceContext {
    /// Parses a `traceparent` value.
    ///
    /// Format: `{version}-{trace-id}-{parent-span-id}-{flags}`, for example
    /// `00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01`.
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.trim().split('-').collect();
        let [version, trace_id, parent_span_id, flags] = parts.as_slice() else {
            return None;
        };

        if *version != "00"
            || !is_hex(trace_id, 32)
            || !is_hex(parent_span_id, 16)
            || !is_hex(flags, 2)
        {
            return None;
        }
        // All-zero ids are invalid.
        if trace_id.bytes().all(|b| b == b'0') || parent_span_id.bytes().all(|b| b == b'0') {
            return None;
        }

        Some(Self {
            trace_id: trace_id.to_ascii_lowercase(),
            parent_span_id: parent_span_id.to_ascii_lowercase(),
            flags: TraceFlags(u8::from_str_radix(flags, 16).ok()?),
        })
    }

    /// Formats a `traceparent` value for `trace_id` and `span_id`.
    #[must_use]
    pub fn header_value(trace_id: &str, span_id: &str, flags: TraceFlags) -> String {
        format!("00-{trace_id}-{span_id}-{:02x}", flags.0)
    }
}

fn is_hex(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Trace flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceFlags(u8);

impl TraceFlags {
    /// No flags set.
    pub const NONE: Self = Self(0x00);
    /// The trace is sampled.
    pub const SAMPLED: Self = Self(0x01);

    /// Returns true if the sampled flag is set.
    #[must_use]
    pub const fn is_sampled(self) -> bool {
        self.0 & 0x01 != 0
    }
}

/// Parent span information stored as a context extension on the server side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentSpan {
    /// The upstream span id.
    pub span_id: String,
    /// The upstream flags.
    pub flags: TraceFlags,
}

fn generate_trace_id() -> String {
    Uuid::now_v7().simple().to_string()
}

fn generate_span_id() -> String {
    // The tail of a v7 UUID is random; the head is a timestamp.
    Uuid::now_v7().simple().to_string()[16..].to_string()
}

/// Propagates trace ids and instruments the call.
#[derive(Debug, Clone)]
pub struct TracingMiddleware {
    name: String,
    side: Side,
}

impl TracingMiddleware {
    /// Creates a tracing middleware for `side`.
    #[must_use]
    pub fn new(name: impl Into<String>, side: Side) -> Self {
        Self {
            name: name.into(),
            side,
        }
    }

    fn start(&self, ctx: &mut CallContext, request: &mut Request) {
        let span_id = generate_span_id();
        match self.side {
            Side::Server => {
                let incoming = request
                    .headers()
                    .get(TRACEPARENT_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(TraceContext::parse);
                match incoming {
                    Some(parent) => {
                        ctx.set_trace_id(parent.trace_id);
                        ctx.set_extension(ParentSpan {
                            span_id: parent.parent_span_id,
                            flags: parent.flags,
                        });
                    }
                    None => ctx.set_trace_id(generate_trace_id()),
                }
            }
            Side::Client => {
                if ctx.trace_id().is_none() {
                    ctx.set_trace_id(generate_trace_id());
                }
                let trace_id = ctx.trace_id().unwrap_or_default();
                let header = TraceContext::header_value(trace_id, &span_id, TraceFlags::SAMPLED);
                if let Ok(value) = HeaderValue::from_str(&header) {
                    request.headers_mut().insert(TRACEPARENT_HEADER, value);
                }
            }
        }
        ctx.set_span_id(span_id);
    }
}

impl Middleware for TracingMiddleware {
    fn name(&self) -> &str {
        &self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            self.start(ctx, &mut request);

            let span = tracing::info_span!(
                "call",
                side = %self.side,
                service = ctx.service().unwrap_or_default(),
                operation = ctx.operation().unwrap_or_else(|| request.uri().path()),
                trace_id = ctx.trace_id().unwrap_or_default(),
                span_id = ctx.span_id().unwrap_or_default(),
            );

            next.run(ctx, request).instrument(span).await
        })
    }
}

/// Builds [`TracingMiddleware`] for both sides.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFactory;

impl Factory for TracingFactory {
    fn build_client(&self, decl: &MiddlewareDecl, _opts: &[Opt]) -> Option<BoxedMiddleware> {
        Some(Arc::new(TracingMiddleware::new(decl.effective_name(), Side::Client)))
    }

    fn build_server(&self, decl: &MiddlewareDecl, _opts: &[Opt]) -> Option<BoxedMiddleware> {
        Some(Arc::new(TracingMiddleware::new(decl.effective_name(), Side::Server)))
    }
}
