//! Chain builder integration tests.
//!
//! These tests drive the two-pass builder through the public API with the
//! built-in factories and with recording factories that observe the
//! carrier they are handed.

use bytes::Bytes;
use daedalus_core::Opt;
use daedalus_middleware::stages::selector::SelectorFactory;
use daedalus_middleware::{
    build_client, build_server, with_registry, BoxFuture, BoxedMiddleware, CallContext, Chain,
    ChainBuilder, Factory, HandlerResult, Middleware, MiddlewareDecl, MiddlewareOptions, Next,
    Registry, Request, Response, ResponseExt, Side,
};
use http_body_util::Full;
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

struct Named(String);

impl Middleware for Named {
    fn name(&self) -> &str {
        &self.0
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(next.run(ctx, request))
    }
}

/// Builds a [`Named`] middleware and records the carrier it was handed.
#[derive(Default)]
struct Recording {
    seen: Mutex<Vec<Vec<String>>>,
}

impl Recording {
    fn record(&self, side: Side, decl: &MiddlewareDecl, opts: &[Opt]) -> Option<BoxedMiddleware> {
        let carrier = MiddlewareOptions::from_options(opts).carrier;
        self.seen.lock().push(carrier.names(side));
        Some(Arc::new(Named(decl.effective_name().to_string())))
    }
}

impl Factory for Recording {
    fn build_client(&self, decl: &MiddlewareDecl, opts: &[Opt]) -> Option<BoxedMiddleware> {
        self.record(Side::Client, decl, opts)
    }

    fn build_server(&self, decl: &MiddlewareDecl, opts: &[Opt]) -> Option<BoxedMiddleware> {
        self.record(Side::Server, decl, opts)
    }
}

/// Wraps the real selector factory and records what it observed.
#[derive(Default)]
struct ObservingSelector {
    seen: Mutex<Vec<String>>,
}

impl ObservingSelector {
    fn observe(&self, side: Side, opts: &[Opt]) {
        let carrier = MiddlewareOptions::from_options(opts).carrier;
        self.seen.lock().extend(carrier.names(side));
    }
}

impl Factory for ObservingSelector {
    fn build_client(&self, decl: &MiddlewareDecl, opts: &[Opt]) -> Option<BoxedMiddleware> {
        self.observe(Side::Client, opts);
        SelectorFactory.build_client(decl, opts)
    }

    fn build_server(&self, decl: &MiddlewareDecl, opts: &[Opt]) -> Option<BoxedMiddleware> {
        self.observe(Side::Server, opts);
        SelectorFactory.build_server(decl, opts)
    }
}

fn request(path: &str) -> Request {
    http::Request::builder()
        .uri(path)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

async fn run(chain: &Chain, ctx: &mut CallContext, path: &str) -> HandlerResult {
    chain
        .handle(ctx, request(path), |_ctx, _req| {
            Box::pin(async { Ok(Response::ok("handled")) })
        })
        .await
}

#[test]
fn test_selector_is_built_last_and_sees_wrapped_middleware() {
    let selector = Arc::new(ObservingSelector::default());
    let registry = Arc::new(Registry::with_builtins());
    registry.register("selector", selector.clone());
    let opts = vec![with_registry(registry)];

    let decls = vec![
        MiddlewareDecl::new("logging"),
        MiddlewareDecl::new("selector").with_params(json!({ "wraps": "logging" })),
        MiddlewareDecl::new("tracing"),
    ];

    let chain = build_server(&decls, &opts);
    assert_eq!(chain.names(), vec!["logging", "tracing", "selector"]);
    assert!(selector.seen.lock().contains(&"logging".to_string()));

    let chain = build_client(&decls, &opts);
    assert_eq!(chain.len(), 3);
}

#[test]
fn test_duplicate_names_append_twice() {
    let decls = vec![
        MiddlewareDecl::named("logging", "X"),
        MiddlewareDecl::named("logging", "X"),
    ];
    let chain = build_server(&decls, &[]);
    assert_eq!(chain.names(), vec!["X", "X"]);
    assert!(!Arc::ptr_eq(&chain.middlewares()[0], &chain.middlewares()[1]));
}

#[test]
fn test_non_selectors_never_observe_selectors() {
    let recording = Arc::new(Recording::default());
    let registry = Arc::new(Registry::with_builtins());
    registry.register("probe", recording.clone());
    let opts = vec![with_registry(registry)];

    let decls = vec![
        MiddlewareDecl::named("logging", "first"),
        MiddlewareDecl::named("selector", "sel").with_params(json!({ "wraps": "first" })),
        MiddlewareDecl::new("probe"),
    ];
    let chain = build_server(&decls, &opts);

    assert_eq!(chain.names(), vec!["first", "probe", "sel"]);
    assert_eq!(*recording.seen.lock(), vec![vec!["first".to_string()]]);
}

#[test]
fn test_disabled_entry_is_invisible() {
    let with_disabled = vec![
        MiddlewareDecl::new("logging"),
        MiddlewareDecl::new("timeout").disabled(),
        MiddlewareDecl::new("selector").with_params(json!({ "wraps": "timeout" })),
        MiddlewareDecl::new("tracing"),
    ];
    let without: Vec<_> = with_disabled.iter().filter(|d| d.enabled).cloned().collect();

    let a = build_server(&with_disabled, &[]);
    let b = build_server(&without, &[]);
    assert_eq!(a.names(), b.names());
    // The selector wraps a disabled entry, so it is dropped too.
    assert_eq!(a.names(), vec!["logging", "tracing"]);
}

#[test]
fn test_registration_order_does_not_matter() {
    let make = |first: &str, second: &str| {
        let registry = Registry::new();
        for name in [first, second] {
            registry.register(name, Arc::new(Recording::default()));
        }
        Arc::new(registry)
    };
    let decls = vec![MiddlewareDecl::new("b"), MiddlewareDecl::new("a")];

    let ab = ChainBuilder::new(&[with_registry(make("a", "b"))]).build_server(&decls);
    let ba = ChainBuilder::new(&[with_registry(make("b", "a"))]).build_server(&decls);
    assert_eq!(ab.names(), ba.names());
}

#[tokio::test]
async fn test_built_chain_runs_end_to_end() {
    let decls = vec![
        MiddlewareDecl::new("metadata").with_params(json!({ "constants": { "x-md-zone": "eu-1" } })),
        MiddlewareDecl::new("tracing"),
        MiddlewareDecl::new("timeout").with_params(json!({ "timeout_ms": 5000 })),
        MiddlewareDecl::new("logging"),
    ];
    let chain = build_server(&decls, &[]);
    assert_eq!(chain.len(), 4);

    let mut ctx = CallContext::new(Side::Server).with_service("greeter");
    let response = run(&chain, &mut ctx, "/greeter/hello").await.unwrap();

    assert_eq!(response.status(), http::StatusCode::OK);
    assert_eq!(ctx.metadata("x-md-zone"), Some("eu-1"));
    assert!(ctx.trace_id().is_some());
    assert!(ctx.deadline().is_some());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_selector_limits_timeout_to_matching_paths() {
    let decls = vec![
        MiddlewareDecl::named("timeout", "tight").with_params(json!({ "timeout_ms": 10 })),
        MiddlewareDecl::named("selector", "only-admin")
            .with_params(json!({ "wraps": "tight", "prefixes": ["/admin"] })),
    ];
    // Keep only the selector in the final chain by dropping the bare timeout.
    let built = build_server(&decls, &[]);
    let chain = Chain::new(built.middlewares()[1..].to_vec());
    assert_eq!(chain.names(), vec!["only-admin"]);

    let slow = |_ctx: &mut CallContext, _req: Request| -> BoxFuture<'static, HandlerResult> {
        Box::pin(async {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok(Response::ok("slow"))
        })
    };

    let mut ctx = CallContext::new(Side::Server);
    let admin = chain.handle(&mut ctx, request("/admin/purge"), slow).await;
    assert!(admin.is_err());

    let mut ctx = CallContext::new(Side::Server);
    let public = chain.handle(&mut ctx, request("/public"), slow).await;
    assert!(public.is_ok());
}

fn decl_strategy() -> impl Strategy<Value = MiddlewareDecl> {
    (
        prop::sample::select(vec!["logging", "tracing", "metadata", "timeout", "selector"]),
        0usize..4,
        any::<bool>(),
    )
        .prop_map(|(kind, n, enabled)| {
            let decl = MiddlewareDecl::named(kind, format!("{kind}-{n}")).with_enabled(enabled);
            if kind == "selector" {
                decl.with_params(json!({ "wraps": ["logging-0", "tracing-1", "timeout-2"] }))
            } else {
                decl
            }
        })
}

proptest! {
    #[test]
    fn prop_selectors_follow_all_other_middleware(decls in prop::collection::vec(decl_strategy(), 0..12)) {
        let chain = build_server(&decls, &[]);
        let names = chain.names();
        let non_selectors = names.iter().filter(|n| !n.starts_with("selector")).count();

        for (index, name) in names.iter().enumerate() {
            if name.starts_with("selector") {
                prop_assert!(index >= non_selectors);
            }
        }
    }

    #[test]
    fn prop_disabled_entries_are_invisible(decls in prop::collection::vec(decl_strategy(), 0..12)) {
        let enabled: Vec<_> = decls.iter().filter(|d| d.enabled).cloned().collect();
        let all_chain = build_client(&decls, &[]);
        let enabled_chain = build_client(&enabled, &[]);
        prop_assert_eq!(all_chain.names(), enabled_chain.names());
    }
}
