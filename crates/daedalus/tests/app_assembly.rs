//! Application assembly from bootstrap documents.

use bytes::Bytes;
use daedalus::core::{BoxFuture, RuntimeError, RuntimeResult};
use daedalus::middleware::{BoxedMiddleware, FnFactory, MiddlewareOptions};
use daedalus::prelude::*;
use daedalus::AppResult;
use http_body_util::Full;
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::sync::Arc;

const BOOTSTRAP: &str = r#"
[app]
name = "greeter"
version = "1.0.0"
id = "greeter-1"

[logging]
enabled = false

[files]
embed_threshold = 8
chunk_size = 4

[registries.local]
type = "static"
params = { instances = [{ id = "b-1", name = "billing" }, { id = "b-2", name = "billing" }] }

[registries.central]
type = "consul"
endpoint = "127.0.0.1:8500"

[[services]]
name = "greeter"

[[services.middlewares.server]]
type = "selector"
params = { wraps = "metadata", prefixes = ["/api"] }

[[services.middlewares.server]]
type = "metadata"

[[services.middlewares.server]]
type = "logging"

[[services.middlewares.client]]
type = "timeout"
enabled = false

[[services]]
name = "billing"
"#;

fn bootstrap_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(BOOTSTRAP.as_bytes()).unwrap();
    file
}

fn request(path: &str) -> Request {
    http::Request::builder()
        .uri(path)
        .header("x-request-id", "0190b6a0-0000-7000-8000-000000000001")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Records register and deregister calls into a shared log.
struct RecordingRegistrar {
    log: Arc<Mutex<Vec<String>>>,
    fail_deregister: bool,
}

impl Registrar for RecordingRegistrar {
    fn register<'a>(&'a self, instance: &'a ServiceInstance) -> BoxFuture<'a, RuntimeResult<()>> {
        Box::pin(async move {
            self.log.lock().push(format!("register:{}", instance.id));
            Ok(())
        })
    }

    fn deregister<'a>(
        &'a self,
        instance: &'a ServiceInstance,
    ) -> BoxFuture<'a, RuntimeResult<()>> {
        Box::pin(async move {
            self.log.lock().push(format!("deregister:{}", instance.id));
            if self.fail_deregister {
                Err(RuntimeError::internal("backend unreachable"))
            } else {
                Ok(())
            }
        })
    }
}

fn push(
    log: &Arc<Mutex<Vec<String>>>,
    entry: &'static str,
) -> impl Fn(Arc<ComponentProvider>) -> BoxFuture<'static, Result<(), LifecycleError>> + Send + Sync
{
    let log = Arc::clone(log);
    move |_| {
        let log = Arc::clone(&log);
        Box::pin(async move {
            log.lock().push(entry.to_string());
            Ok(())
        })
    }
}

#[test]
fn test_builds_services_from_bootstrap_file() {
    let file = bootstrap_file();
    let app = App::builder(file.path()).without_logging().build().unwrap();

    assert_eq!(app.config().app.name, "greeter");
    assert_eq!(app.service_names(), vec!["billing", "greeter"]);

    let greeter = app.service("greeter").unwrap();
    assert_eq!(greeter.server.names(), vec!["metadata", "logging", "selector"]);
    assert!(greeter.client.is_empty());

    let billing = app.service("billing").unwrap();
    assert!(billing.server.is_empty());
    assert!(app.service("missing").is_none());
}

#[test]
fn test_missing_bootstrap_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = App::builder(dir.path().join("bootstrap.toml"))
        .without_logging()
        .build()
        .unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_with_config_is_validated() {
    let config = BootstrapConfig::builder()
        .service(ServiceConfig::new("greeter"))
        .service(ServiceConfig::new("greeter"))
        .build();

    let err = App::builder("unused.toml")
        .with_config(config)
        .without_logging()
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

#[tokio::test]
async fn test_static_registry_becomes_discovery() {
    let file = bootstrap_file();
    let app = App::builder(file.path()).without_logging().build().unwrap();

    let discovery = app.discovery("local").unwrap();
    let instances = discovery.instances("billing").await.unwrap();
    let ids: Vec<_> = instances.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["b-1", "b-2"]);

    assert!(app.discovery("central").is_none());
    assert!(app.registrar("central").is_none());
}

#[tokio::test]
async fn test_start_and_shutdown_order() {
    let file = bootstrap_file();
    let log = Arc::new(Mutex::new(Vec::new()));

    let app = App::builder(file.path())
        .without_logging()
        .with_registrar(
            "central",
            Arc::new(RecordingRegistrar {
                log: Arc::clone(&log),
                fail_deregister: false,
            }),
        )
        .on_startup(push(&log, "startup:1"))
        .on_startup(push(&log, "startup:2"))
        .on_shutdown(push(&log, "shutdown:1"))
        .on_shutdown(push(&log, "shutdown:2"))
        .build()
        .unwrap();

    assert!(app.registrar("central").is_some());

    app.start().await.unwrap();
    assert!(matches!(app.start().await, Err(AppError::AlreadyStarted(_))));
    app.shutdown().await.unwrap();
    app.shutdown().await.unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            "startup:1",
            "startup:2",
            "register:greeter-1",
            "deregister:greeter-1",
            "shutdown:2",
            "shutdown:1",
        ]
    );
}

#[tokio::test]
async fn test_shutdown_collects_errors() {
    let file = bootstrap_file();
    let log = Arc::new(Mutex::new(Vec::new()));

    let app = App::builder(file.path())
        .without_logging()
        .with_registrar(
            "central",
            Arc::new(RecordingRegistrar {
                log: Arc::clone(&log),
                fail_deregister: true,
            }),
        )
        .on_shutdown(push(&log, "shutdown:1"))
        .on_shutdown(|_| async { Err(LifecycleError::new("flush failed")) })
        .build()
        .unwrap();

    app.start().await.unwrap();
    let err = app.shutdown().await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("central"));
    assert!(message.contains("flush failed"));
    assert_eq!(log.lock().last().map(String::as_str), Some("shutdown:1"));
}

#[tokio::test]
async fn test_failed_startup_skips_registration() {
    let file = bootstrap_file();
    let log = Arc::new(Mutex::new(Vec::new()));

    let app = App::builder(file.path())
        .without_logging()
        .with_registrar(
            "central",
            Arc::new(RecordingRegistrar {
                log: Arc::clone(&log),
                fail_deregister: false,
            }),
        )
        .on_startup(|_| async { Err(LifecycleError::new("database down")) })
        .on_shutdown(push(&log, "shutdown:1"))
        .build()
        .unwrap();

    let err = app.run_until(async {}).await.unwrap_err();
    assert!(err.to_string().contains("database down"));
    assert_eq!(*log.lock(), vec!["shutdown:1"]);
}

#[tokio::test]
async fn test_run_until_signal() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let app = App::builder("unused.toml")
        .with_config(BootstrapConfig::default())
        .without_logging()
        .on_startup(push(&log, "startup"))
        .on_shutdown(push(&log, "shutdown"))
        .build()
        .unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    tx.send(()).unwrap();
    app.run_until(async {
        let _ = rx.await;
    })
    .await
    .unwrap();

    assert_eq!(*log.lock(), vec!["startup", "shutdown"]);
}

#[tokio::test]
async fn test_server_chain_handles_requests() {
    let file = bootstrap_file();
    let app = App::builder(file.path()).without_logging().build().unwrap();
    let chain = &app.service("greeter").unwrap().server;

    let mut ctx = CallContext::new(Side::Server);
    let response = chain
        .handle(&mut ctx, request("/api/greet"), |_ctx, _req| {
            Box::pin(async { Ok(Response::ok("hello")) })
        })
        .await
        .unwrap();

    assert_eq!(response.status(), http::StatusCode::OK);
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "0190b6a0-0000-7000-8000-000000000001"
    );
}

#[test]
fn test_options_and_custom_registry_reach_factories() {
    #[derive(Debug, Clone, Default)]
    struct Tenant(String);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let registry = Arc::new(Registry::new());
    registry.register(
        "audit",
        Arc::new(FnFactory::new(
            move |side: Side, _decl: &MiddlewareDecl, opts: &[Opt]| -> Option<BoxedMiddleware> {
                let tenant: Tenant = new_t(opts);
                let service = MiddlewareOptions::from_options(opts).service_name;
                seen_clone.lock().push(format!(
                    "{side}:{}:{}",
                    tenant.0,
                    service.unwrap_or_default()
                ));
                None
            },
        )),
    );

    let mut service = ServiceConfig::new("greeter");
    service.middlewares.client.push(MiddlewareDecl::new("audit"));
    service.middlewares.server.push(MiddlewareDecl::new("audit"));
    service.middlewares.server.push(MiddlewareDecl::new("logging"));

    let app = App::builder("unused.toml")
        .with_config(BootstrapConfig::builder().service(service).build())
        .with_registry(registry)
        .with_option(configure(|t: &mut Tenant| t.0 = "acme".to_string()))
        .without_logging()
        .build()
        .unwrap();

    assert_eq!(*seen.lock(), vec!["client:acme:greeter", "server:acme:greeter"]);
    // "logging" is not registered in the custom registry.
    assert!(app.service("greeter").unwrap().server.is_empty());
}

#[test]
fn test_file_service_uses_bootstrap_tuning() {
    let file = bootstrap_file();
    let app = App::builder(file.path()).without_logging().build().unwrap();

    let files = app.files();
    assert_eq!(
        files.config(),
        &FileServiceConfig {
            embed_threshold: 8,
            chunk_size: 4
        }
    );

    let data = b"sharded payload".to_vec();
    let id = files.create(&data[..], data.len() as i64).unwrap();
    assert!(!files.get(&id).unwrap().is_embedded());

    let mut out = Vec::new();
    files.read(&id).unwrap().read_to_end(&mut out).unwrap();
    assert_eq!(out, data);

    let same: Arc<FileService> = app.components().get().unwrap();
    assert!(Arc::ptr_eq(&same, files));
    let config: Arc<BootstrapConfig> = app.components().get().unwrap();
    assert_eq!(config.app.id, "greeter-1");
}

fn _assert_send(app: &App) -> impl std::future::Future<Output = AppResult<()>> + Send + '_ {
    app.start()
}
