//! Application assembly.
//!
//! [`App::builder`] loads the bootstrap document, initialises logging,
//! collects runtime components and builds the client and server chains of
//! every declared service. The resulting [`App`] exposes those pieces to
//! user code and drives the startup and shutdown sequence.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use daedalus_config::{BootstrapConfig, ConfigLoader};
use daedalus_core::{ComponentProvider, Discovery, Opt, Registrar, ServiceInstance, StaticDiscovery};
use daedalus_files::{BlobStore, FileService, MemoryBlobStore, MemoryMetaStore, MetaStore};
use daedalus_middleware::{with_registry, with_service_name, Chain, ChainBuilder, Registry};
use parking_lot::Mutex;

use crate::error::{AppError, AppResult};
use crate::lifecycle::{Lifecycle, LifecycleError, LifecycleResult};

/// Client and server chains built for one service.
#[derive(Clone, Default)]
pub struct ServiceChains {
    /// Outgoing call pipeline.
    pub client: Chain,
    /// Incoming call pipeline.
    pub server: Chain,
}

impl fmt::Debug for ServiceChains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceChains")
            .field("client", &self.client.names())
            .field("server", &self.server.names())
            .finish()
    }
}

/// Builder for [`App`].
///
/// # Example
///
/// ```
/// use daedalus::{App, BootstrapConfig, ServiceConfig};
///
/// let config = BootstrapConfig::builder()
///     .service(ServiceConfig::new("greeter"))
///     .build();
///
/// let app = App::builder("unused.toml")
///     .with_config(config)
///     .without_logging()
///     .build()
///     .unwrap();
///
/// assert!(app.service("greeter").is_some());
/// ```
#[must_use]
pub struct AppBuilder {
    bootstrap: PathBuf,
    config: Option<BootstrapConfig>,
    env_prefix: Option<String>,
    dotenv: bool,
    init_logging: bool,
    opts: Vec<Opt>,
    registry: Option<Arc<Registry>>,
    components: ComponentProvider,
    stores: Option<(Arc<dyn MetaStore>, Arc<dyn BlobStore>)>,
    lifecycle: Lifecycle,
}

impl AppBuilder {
    fn new(bootstrap: PathBuf) -> Self {
        Self {
            bootstrap,
            config: None,
            env_prefix: None,
            dotenv: false,
            init_logging: true,
            opts: Vec::new(),
            registry: None,
            components: ComponentProvider::new(),
            stores: None,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Adds an option passed to every chain build.
    pub fn with_option(mut self, opt: Opt) -> Self {
        self.opts.push(opt);
        self
    }

    /// Adds several chain build options.
    pub fn with_options(mut self, opts: impl IntoIterator<Item = Opt>) -> Self {
        self.opts.extend(opts);
        self
    }

    /// Applies `PREFIX__SECTION__KEY` environment overrides to the
    /// bootstrap file.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Loads a `.env` file before reading environment overrides.
    pub fn with_dotenv(mut self) -> Self {
        self.dotenv = true;
        self
    }

    /// Uses `config` instead of reading the bootstrap file.
    pub fn with_config(mut self, config: BootstrapConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds chains from `registry` instead of the process-wide registry.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Skips global logging initialisation.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Registers a component under `name`.
    pub fn with_component<T: Send + Sync + 'static>(
        mut self,
        name: impl Into<String>,
        component: Arc<T>,
    ) -> Self {
        self.components.register_named(name, component);
        self
    }

    /// Supplies the backend for the `[registries.<name>]` entry as a
    /// registrar.
    pub fn with_registrar(mut self, name: impl Into<String>, registrar: Arc<dyn Registrar>) -> Self {
        self.components.register_registrar(name, registrar);
        self
    }

    /// Supplies the backend for the `[registries.<name>]` entry as a
    /// discovery.
    pub fn with_discovery(mut self, name: impl Into<String>, discovery: Arc<dyn Discovery>) -> Self {
        self.components.register_discovery(name, discovery);
        self
    }

    /// Stores files in `meta` and `blobs` instead of memory.
    pub fn with_file_stores(mut self, meta: Arc<dyn MetaStore>, blobs: Arc<dyn BlobStore>) -> Self {
        self.stores = Some((meta, blobs));
        self
    }

    /// Registers a startup hook.
    pub fn on_startup<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<ComponentProvider>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        self.lifecycle = self.lifecycle.on_startup(hook);
        self
    }

    /// Registers a shutdown hook. Shutdown hooks run in reverse order.
    pub fn on_shutdown<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<ComponentProvider>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        self.lifecycle = self.lifecycle.on_shutdown(hook);
        self
    }

    /// Appends the hooks of `lifecycle`.
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = self.lifecycle.merge(lifecycle);
        self
    }

    /// Assembles the application.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the bootstrap cannot be loaded or is
    /// invalid, `AppError::Telemetry` if logging cannot be initialised and
    /// `AppError::Files` if the file service rejects its configuration.
    pub fn build(mut self) -> AppResult<App> {
        let config = self.load_config()?;

        if self.init_logging {
            match daedalus_telemetry::init_logging(&config.logging) {
                Ok(()) => {}
                Err(e) if e.is_already_initialized() => {
                    tracing::debug!(error = %e, "logging already initialized");
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.attach_registries(&config)?;

        let (meta, blobs): (Arc<dyn MetaStore>, Arc<dyn BlobStore>) = match self.stores.take() {
            Some(stores) => stores,
            None => (Arc::new(MemoryMetaStore::new()), Arc::new(MemoryBlobStore::new())),
        };
        let files = Arc::new(FileService::new(meta, blobs, config.files.clone())?);

        let config = Arc::new(config);
        self.components.register(Arc::clone(&config));
        self.components.register(Arc::clone(&files));

        let services = self.build_services(&config);

        tracing::info!(
            app = %config.app.name,
            services = services.len(),
            registrars = self.components.registrars().len(),
            discoveries = self.components.discoveries().len(),
            "application assembled"
        );

        Ok(App {
            instance: config.app.instance(),
            config,
            components: Arc::new(self.components),
            files,
            services,
            lifecycle: self.lifecycle,
            registered: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    fn load_config(&mut self) -> AppResult<BootstrapConfig> {
        if let Some(config) = self.config.take() {
            config.validate()?;
            return Ok(config);
        }

        let mut loader = ConfigLoader::new().with_file(&self.bootstrap)?;
        if self.dotenv {
            loader = loader.with_dotenv()?;
        }
        if let Some(prefix) = &self.env_prefix {
            loader = loader.with_env_prefix(prefix);
        }
        Ok(loader.load()?)
    }

    fn attach_registries(&mut self, config: &BootstrapConfig) -> AppResult<()> {
        for (name, registry) in &config.registries {
            if registry.is_static() {
                let discovery = StaticDiscovery::new(registry.static_instances()?);
                self.components.register_discovery(name.clone(), Arc::new(discovery));
                continue;
            }

            let supplied = self.components.registrar(name).is_some()
                || self.components.discovery(name).is_some();
            if !supplied {
                tracing::warn!(
                    registry = %name,
                    kind = %registry.kind,
                    "no backend supplied for registry, skipping"
                );
            }
        }
        Ok(())
    }

    fn build_services(&self, config: &BootstrapConfig) -> BTreeMap<String, ServiceChains> {
        config
            .services
            .iter()
            .map(|service| {
                let mut opts = self.opts.clone();
                if let Some(registry) = &self.registry {
                    opts.push(with_registry(Arc::clone(registry)));
                }
                opts.push(with_service_name(service.name.clone()));

                let builder = ChainBuilder::new(&opts);
                let chains = ServiceChains {
                    client: builder.build_client(&service.middlewares.client),
                    server: builder.build_server(&service.middlewares.server),
                };
                tracing::debug!(
                    service = %service.name,
                    client = ?chains.client.names(),
                    server = ?chains.server.names(),
                    "service chains built"
                );
                (service.name.clone(), chains)
            })
            .collect()
    }
}

impl fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppBuilder")
            .field("bootstrap", &self.bootstrap)
            .field("has_config", &self.config.is_some())
            .field("env_prefix", &self.env_prefix)
            .field("option_count", &self.opts.len())
            .field("components", &self.components)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

/// An assembled application.
pub struct App {
    config: Arc<BootstrapConfig>,
    components: Arc<ComponentProvider>,
    files: Arc<FileService>,
    services: BTreeMap<String, ServiceChains>,
    lifecycle: Lifecycle,
    instance: ServiceInstance,
    registered: Mutex<Vec<String>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl App {
    /// Starts building an application from the bootstrap file at `path`.
    pub fn builder(path: impl Into<PathBuf>) -> AppBuilder {
        AppBuilder::new(path.into())
    }

    /// Returns the loaded bootstrap document.
    #[must_use]
    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Returns the component provider.
    #[must_use]
    pub fn components(&self) -> &Arc<ComponentProvider> {
        &self.components
    }

    /// Returns the registrar supplied for `name`.
    #[must_use]
    pub fn registrar(&self, name: &str) -> Option<Arc<dyn Registrar>> {
        self.components.registrar(name)
    }

    /// Returns the discovery supplied or built for `name`.
    #[must_use]
    pub fn discovery(&self, name: &str) -> Option<Arc<dyn Discovery>> {
        self.components.discovery(name)
    }

    /// Returns the file service.
    #[must_use]
    pub fn files(&self) -> &Arc<FileService> {
        &self.files
    }

    /// Returns the chains built for the service `name`.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceChains> {
        self.services.get(name)
    }

    /// Returns the names of all services, sorted.
    #[must_use]
    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    /// Returns the instance advertised to registrars.
    #[must_use]
    pub fn instance(&self) -> &ServiceInstance {
        &self.instance
    }

    /// Runs the startup hooks in order, then registers the instance with
    /// every registrar.
    ///
    /// # Errors
    ///
    /// Returns `AppError::AlreadyStarted` on a second call and
    /// `AppError::Lifecycle` if a hook or a registration fails.
    pub async fn start(&self) -> AppResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(AppError::AlreadyStarted(self.config.app.name.clone()));
        }

        self.lifecycle.run_startup(&self.components).await?;

        for (name, registrar) in self.components.registrars() {
            if let Err(e) = registrar.register(&self.instance).await {
                tracing::error!(registrar = %name, error = %e, "registration failed");
                return Err(LifecycleError::with_source(
                    format!("registrar '{name}' failed to register"),
                    e,
                )
                .into());
            }
            self.registered.lock().push(name.clone());
            tracing::info!(registrar = %name, instance = %self.instance.id, "instance registered");
        }

        tracing::info!(app = %self.config.app.name, "application started");
        Ok(())
    }

    /// Deregisters the instance, then runs the shutdown hooks in reverse
    /// order. Every step runs even when an earlier one fails. Later calls
    /// are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Lifecycle` summarising every failed step.
    pub async fn shutdown(&self) -> AppResult<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut errors = Vec::new();

        let registered: Vec<String> = self.registered.lock().drain(..).rev().collect();
        for name in registered {
            let Some(registrar) = self.components.registrar(&name) else {
                continue;
            };
            match registrar.deregister(&self.instance).await {
                Ok(()) => tracing::info!(registrar = %name, "instance deregistered"),
                Err(e) => {
                    tracing::error!(registrar = %name, error = %e, "deregistration failed");
                    errors.push(format!("registrar '{name}': {e}"));
                }
            }
        }

        if let Err(e) = self.lifecycle.run_shutdown(&self.components).await {
            errors.push(e.to_string());
        }

        tracing::info!(app = %self.config.app.name, "application stopped");

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::ShutdownFailed(errors.join("; ")).into())
        }
    }

    /// Starts the application, waits for `signal`, then shuts down.
    ///
    /// Shutdown also runs when startup fails.
    ///
    /// # Errors
    ///
    /// Returns the startup error, or the shutdown error if startup
    /// succeeded.
    pub async fn run_until<F>(&self, signal: F) -> AppResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        if let Err(e) = self.start().await {
            if let Err(shutdown) = self.shutdown().await {
                tracing::error!(error = %shutdown, "shutdown after failed start also failed");
            }
            return Err(e);
        }

        signal.await;
        tracing::info!("shutdown signal received");
        self.shutdown().await
    }

    /// Runs until SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// See [`App::run_until`].
    pub async fn run(&self) -> AppResult<()> {
        self.run_until(wait_for_os_signal()).await
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.config.app.name)
            .field("services", &self.services)
            .field("components", &self.components)
            .field("lifecycle", &self.lifecycle)
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish()
    }
}

/// Waits for SIGTERM or SIGINT on Unix and Ctrl+C elsewhere.
async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM, waiting for Ctrl+C only");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl+C");
    }
}
