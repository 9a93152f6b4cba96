//! Metadata propagation middleware.
//!
//! Metadata travels as request headers whose names start with one of the
//! configured prefixes (`x-md-` by default), plus the `x-request-id`
//! header.
//!
//! - Server side: matching headers are copied into the [`CallContext`], the
//!   upstream request id is adopted when it parses and
//!   `trust_request_id` is set, and the request id is echoed on the reply.
//! - Client side: context metadata with a matching prefix is written to the
//!   outgoing request together with the request id.
//!
//! `constants` are added to the context on both sides before the rest of
//! the chain runs.

use super::parse_params;
use crate::context::{CallContext, RequestId};
use crate::declaration::MiddlewareDecl;
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::registry::Factory;
use crate::types::{HandlerResult, Request, Side};
use daedalus_core::{BoxFuture, Opt};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Factory key.
pub const TYPE: &str = "metadata";

/// The request id header.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Default metadata header prefix.
pub const DEFAULT_PREFIX: &str = "x-md-";

/// Parameters of the metadata middleware.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    /// Header name prefixes treated as metadata.
    pub prefixes: Vec<String>,
    /// Metadata added to every call.
    pub constants: BTreeMap<String, String>,
    /// Whether an incoming `x-request-id` replaces the generated id.
    pub trust_request_id: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            prefixes: vec![DEFAULT_PREFIX.to_string()],
            constants: BTreeMap::new(),
            trust_request_id: true,
        }
    }
}

impl MetadataConfig {
    fn matches(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        self.prefixes
            .iter()
            .any(|p| key.starts_with(&p.to_ascii_lowercase()))
    }
}

/// Moves metadata between headers and the call context.
#[derive(Debug, Clone)]
pub struct MetadataMiddleware {
    name: String,
    side: Side,
    config: MetadataConfig,
}

impl MetadataMiddleware {
    /// Creates a metadata middleware for `side`.
    #[must_use]
    pub fn new(name: impl Into<String>, side: Side, config: MetadataConfig) -> Self {
        Self {
            name: name.into(),
            side,
            config,
        }
    }

    fn extract(&self, ctx: &mut CallContext, headers: &HeaderMap) {
        for (key, value) in headers {
            if !self.config.matches(key.as_str()) {
                continue;
            }
            if let Ok(value) = value.to_str() {
                ctx.set_metadata(key.as_str(), value);
            }
        }

        if self.config.trust_request_id {
            if let Some(id) = headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(RequestId::parse)
            {
                ctx.set_request_id(id);
            }
        }
    }

    fn inject(&self, ctx: &CallContext, headers: &mut HeaderMap) {
        for (key, value) in ctx.metadata_map() {
            if !self.config.matches(key) {
                continue;
            }
            match (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::debug!(key = %key, "Skipping metadata that is not a valid header"),
            }
        }
        insert_request_id(ctx, headers);
    }
}

fn insert_request_id(ctx: &CallContext, headers: &mut HeaderMap) {
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id().to_string()) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
}

impl Middleware for MetadataMiddleware {
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
            for (key, value) in &self.config.constants {
                ctx.set_metadata(key.as_str(), value.as_str());
            }

            match self.side {
                Side::Server => {
                    self.extract(ctx, request.headers());
                    let mut response = next.run(ctx, request).await?;
                    insert_request_id(ctx, response.headers_mut());
                    Ok(response)
                }
                Side::Client => {
                    self.inject(ctx, request.headers_mut());
                    next.run(ctx, request).await
                }
            }
        })
    }
}

/// Builds [`MetadataMiddleware`] for both sides.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataFactory;

impl MetadataFactory {
    fn build(side: Side, decl: &MiddlewareDecl) -> Option<BoxedMiddleware> {
        let config: MetadataConfig = parse_params(side, decl)?;
        Some(Arc::new(MetadataMiddleware::new(
            decl.effective_name(),
            side,
            config,
        )))
    }
}

impl Factory for MetadataFactory {
    fn build_client(&self, decl: &MiddlewareDecl, _opts: &[Opt]) -> Option<BoxedMiddleware> {
        Self::build(Side::Client, decl)
    }

    fn build_server(&self, decl: &MiddlewareDecl, _opts: &[Opt]) -> Option<BoxedMiddleware> {
        Self::build(Side::Server, decl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Response, ResponseExt};
    use bytes::Bytes;
    use http_body_util::Full;
    use serde_json::json;

    fn ok<'a>() -> Next<'a> {
        Next::handler(|_ctx, _req| Box::pin(async { Ok(Response::ok("")) }))
    }

    #[tokio::test]
    async fn test_server_extracts_prefixed_headers() {
        let middleware = MetadataMiddleware::new(TYPE, Side::Server, MetadataConfig::default());
        let upstream = RequestId::new();
        let request = http::Request::builder()
            .uri("/")
            .header("X-MD-Tenant", "acme")
            .header("x-other", "ignored")
            .header(REQUEST_ID_HEADER, upstream.to_string())
            .body(Full::new(Bytes::new()))
            .unwrap();

        let mut ctx = CallContext::new(Side::Server);
        let response = middleware.process(&mut ctx, request, ok()).await.unwrap();

        assert_eq!(ctx.metadata("x-md-tenant"), Some("acme"));
        assert_eq!(ctx.metadata("x-other"), None);
        assert_eq!(ctx.request_id(), upstream);
        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).unwrap(),
            upstream.to_string().as_str()
        );
    }

    #[tokio::test]
    async fn test_server_ignores_untrusted_request_id() {
        let config = MetadataConfig {
            trust_request_id: false,
            ..MetadataConfig::default()
        };
        let middleware = MetadataMiddleware::new(TYPE, Side::Server, config);
        let upstream = RequestId::new();
        let request = http::Request::builder()
            .header(REQUEST_ID_HEADER, upstream.to_string())
            .body(Full::new(Bytes::new()))
            .unwrap();

        let mut ctx = CallContext::new(Side::Server);
        middleware.process(&mut ctx, request, ok()).await.unwrap();
        assert_ne!(ctx.request_id(), upstream);
    }

    #[tokio::test]
    async fn test_client_injects_metadata_and_constants() {
        let decl = MiddlewareDecl::new(TYPE).with_params(json!({
            "constants": { "x-md-caller": "billing" }
        }));
        let middleware = MetadataFactory.build_client(&decl, &[]).unwrap();

        let mut ctx = CallContext::new(Side::Client);
        ctx.set_metadata("x-md-tenant", "acme");
        ctx.set_metadata("internal", "secret");
        let expected_id = ctx.request_id().to_string();

        let request = http::Request::new(Full::new(Bytes::new()));
        let next = Next::handler(move |_ctx, req: Request| {
            let headers = req.headers().clone();
            Box::pin(async move {
                assert_eq!(headers.get("x-md-tenant").unwrap(), "acme");
                assert_eq!(headers.get("x-md-caller").unwrap(), "billing");
                assert!(headers.get("internal").is_none());
                assert_eq!(headers.get(REQUEST_ID_HEADER).unwrap(), expected_id.as_str());
                Ok(Response::ok(""))
            })
        });

        middleware.process(&mut ctx, request, next).await.unwrap();
    }

    #[test]
    fn test_prefix_matching_is_case_insensitive() {
        let config = MetadataConfig {
            prefixes: vec!["X-Tenant-".to_string()],
            ..MetadataConfig::default()
        };
        assert!(config.matches("x-tenant-id"));
        assert!(!config.matches("x-md-id"));
    }
}
