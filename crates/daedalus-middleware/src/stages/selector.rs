//! Selector middleware.
//!
//! A selector applies middleware built earlier in the same pass only to the
//! calls that match its rules. It references the wrapped middleware by
//! effective name and reads them from the carrier handed to its factory,
//! which is why the chain builder defers selectors to a second pass.
//!
//! ```toml
//! [[services.middlewares.server]]
//! type = "selector"
//! params = { wraps = ["audit", "timeout"], prefixes = ["/admin"] }
//! ```
//!
//! A call matches when its operation (or, without one, its request path)
//! equals one of `paths`, starts with one of `prefixes`, or matches
//! `regex`. A selector with no rules matches every call.

use super::parse_params;
use crate::context::CallContext;
use crate::declaration::MiddlewareDecl;
use crate::middleware::{compose, BoxedMiddleware, Middleware, Next};
use crate::options::MiddlewareOptions;
use crate::registry::Factory;
use crate::types::{HandlerResult, Request, Side};
use daedalus_core::{BoxFuture, Opt};
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;

/// Factory key.
pub const TYPE: &str = crate::declaration::SELECTOR;

/// One wrapped name or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Wraps {
    /// A single middleware name.
    One(String),
    /// Several middleware names, applied in order.
    Many(Vec<String>),
}

impl Default for Wraps {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl Wraps {
    /// Returns the wrapped names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::One(name) => vec![name.as_str()],
            Self::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Parameters of the selector middleware.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectorConfig {
    /// Names of the middleware to apply.
    pub wraps: Wraps,
    /// Exact operations or paths.
    pub paths: Vec<String>,
    /// Operation or path prefixes.
    pub prefixes: Vec<String>,
    /// Regular expression over the operation or path.
    pub regex: Option<String>,
}

/// Per-call predicate of a selector.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    paths: Vec<String>,
    prefixes: Vec<String>,
    regex: Option<Regex>,
}

impl Matcher {
    /// Compiles the rules of `config`.
    pub fn new(config: &SelectorConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            paths: config.paths.clone(),
            prefixes: config.prefixes.clone(),
            regex: config.regex.as_deref().map(Regex::new).transpose()?,
        })
    }

    /// Returns `true` if `target` satisfies any rule, or if there are none.
    #[must_use]
    pub fn matches(&self, target: &str) -> bool {
        if self.paths.is_empty() && self.prefixes.is_empty() && self.regex.is_none() {
            return true;
        }
        self.paths.iter().any(|p| p == target)
            || self.prefixes.iter().any(|p| target.starts_with(p.as_str()))
            || self.regex.as_ref().is_some_and(|r| r.is_match(target))
    }
}

/// Runs the wrapped middleware around the rest of the chain for matching
/// calls and goes straight to the rest of the chain otherwise.
pub struct SelectorMiddleware {
    name: String,
    wrapped: Vec<BoxedMiddleware>,
    matcher: Matcher,
}

impl SelectorMiddleware {
    /// Creates a selector over `wrapped`.
    #[must_use]
    pub fn new(name: impl Into<String>, wrapped: Vec<BoxedMiddleware>, matcher: Matcher) -> Self {
        Self {
            name: name.into(),
            wrapped,
            matcher,
        }
    }

    /// Returns the names of the wrapped middleware.
    #[must_use]
    pub fn wrapped(&self) -> Vec<&str> {
        self.wrapped.iter().map(|m| m.name()).collect()
    }
}

impl std::fmt::Debug for SelectorMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectorMiddleware")
            .field("name", &self.name)
            .field("wrapped", &self.wrapped())
            .field("matcher", &self.matcher)
            .finish()
    }
}

impl Middleware for SelectorMiddleware {
    fn name(&self) -> &str {
        &self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        let target = ctx
            .operation()
            .unwrap_or_else(|| request.uri().path())
            .to_string();
        if self.matcher.matches(&target) {
            Box::pin(compose(&self.wrapped, next).run(ctx, request))
        } else {
            Box::pin(next.run(ctx, request))
        }
    }
}

/// Builds [`SelectorMiddleware`] from the carrier of the current pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorFactory;

impl SelectorFactory {
    fn build(side: Side, decl: &MiddlewareDecl, opts: &[Opt]) -> Option<BoxedMiddleware> {
        let config: SelectorConfig = parse_params(side, decl)?;
        let name = decl.effective_name();

        let matcher = match Matcher::new(&config) {
            Ok(matcher) => matcher,
            Err(e) => {
                tracing::warn!(side = %side, middleware = %name, error = %e, "Invalid selector regex, skipping");
                return None;
            }
        };

        let carrier = MiddlewareOptions::from_options(opts).carrier;
        let mut wrapped = Vec::new();
        for target in config.wraps.names() {
            match carrier.get(side, target) {
                Some(middleware) => wrapped.push(middleware),
                None => tracing::warn!(
                    side = %side,
                    middleware = %name,
                    wraps = %target,
                    "Selector target was not built, ignoring"
                ),
            }
        }

        if wrapped.is_empty() {
            tracing::warn!(side = %side, middleware = %name, "Selector wraps nothing, skipping");
            return None;
        }

        Some(Arc::new(SelectorMiddleware::new(name, wrapped, matcher)))
    }
}

impl Factory for SelectorFactory {
    fn build_client(&self, decl: &MiddlewareDecl, opts: &[Opt]) -> Option<BoxedMiddleware> {
        Self::build(Side::Client, decl, opts)
    }

    fn build_server(&self, decl: &MiddlewareDecl, opts: &[Opt]) -> Option<BoxedMiddleware> {
        Self::build(Side::Server, decl, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::Carrier;
    use crate::options::with_carrier;
    use crate::types::{Response, ResponseExt};
    use bytes::Bytes;
    use http_body_util::Full;
    use serde_json::json;

    #[derive(Default)]
    struct Hits(u32);

    struct Counter;

    impl Middleware for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut CallContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, HandlerResult> {
            Box::pin(async move {
                let hits = ctx.get_extension::<Hits>().map_or(0, |h| h.0);
                ctx.set_extension(Hits(hits + 1));
                next.run(ctx, request).await
            })
        }
    }

    fn carrier_with_counter() -> Carrier {
        let mut carrier = Carrier::new();
        carrier.put_server("counter", Arc::new(Counter));
        carrier
    }

    async fn call(selector: &BoxedMiddleware, path: &str) -> u32 {
        let mut ctx = CallContext::new(Side::Server);
        let request = http::Request::builder()
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap();
        selector
            .process(
                &mut ctx,
                request,
                Next::handler(|_ctx, _req| Box::pin(async { Ok(Response::ok("")) })),
            )
            .await
            .unwrap();
        ctx.get_extension::<Hits>().map_or(0, |h| h.0)
    }

    #[test]
    fn test_wraps_one_or_many() {
        let one: SelectorConfig = serde_json::from_value(json!({ "wraps": "a" })).unwrap();
        assert_eq!(one.wraps.names(), vec!["a"]);

        let many: SelectorConfig = serde_json::from_value(json!({ "wraps": ["a", "b"] })).unwrap();
        assert_eq!(many.wraps.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_matcher_rules() {
        let matcher = Matcher::new(&SelectorConfig {
            paths: vec!["/health".to_string()],
            prefixes: vec!["/admin/".to_string()],
            regex: Some(r"^/v\d+/users$".to_string()),
            ..SelectorConfig::default()
        })
        .unwrap();

        assert!(matcher.matches("/health"));
        assert!(matcher.matches("/admin/users"));
        assert!(matcher.matches("/v2/users"));
        assert!(!matcher.matches("/healthz"));
        assert!(!matcher.matches("/public"));
        assert!(Matcher::default().matches("/anything"));
    }

    #[test]
    fn test_invalid_regex_is_skipped() {
        let decl = MiddlewareDecl::new(TYPE).with_params(json!({ "wraps": "counter", "regex": "(" }));
        let opts = vec![with_carrier(carrier_with_counter())];
        assert!(SelectorFactory.build_server(&decl, &opts).is_none());
    }

    #[test]
    fn test_missing_target_is_skipped() {
        let decl = MiddlewareDecl::new(TYPE).with_params(json!({ "wraps": "counter" }));
        assert!(SelectorFactory.build_server(&decl, &[]).is_none());

        // Targets are looked up on the side being built.
        let opts = vec![with_carrier(carrier_with_counter())];
        assert!(SelectorFactory.build_client(&decl, &opts).is_none());
    }

    #[tokio::test]
    async fn test_applies_only_to_matching_calls() {
        let decl = MiddlewareDecl::new(TYPE)
            .with_params(json!({ "wraps": "counter", "prefixes": ["/admin"] }));
        let opts = vec![with_carrier(carrier_with_counter())];
        let selector = SelectorFactory.build_server(&decl, &opts).unwrap();

        assert_eq!(call(&selector, "/admin/reset").await, 1);
        assert_eq!(call(&selector, "/public").await, 0);
    }

    #[tokio::test]
    async fn test_without_rules_applies_to_every_call() {
        let decl = MiddlewareDecl::new(TYPE).with_params(json!({ "wraps": ["counter", "counter"] }));
        let opts = vec![with_carrier(carrier_with_counter())];
        let selector = SelectorFactory.build_server(&decl, &opts).unwrap();

        assert_eq!(call(&selector, "/anything").await, 2);
    }
}
