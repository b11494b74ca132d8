//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order: configuration, logger,
//!   store, cache, route aggregate
//! - Bind the listener and serve it on a supervised task
//! - On trigger: stop accepting, drain under a deadline, release resources
//!   in reverse acquisition order
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and the listener never starts
//! - Handles acquired before a failing step are not closed explicitly;
//!   process exit reclaims them
//! - Subsystems initialize in order, not concurrently
//! - Listener starts last (traffic only when ready)

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use notify::RecommendedWatcher;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::{validate_config, AppConfig, ConfigError, ConfigWatcher, SharedConfig};
use crate::error::Error;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::{self, DrainOutcome, Shutdown, SHUTDOWN_DEADLINE};
use crate::lifecycle::state::{Lifecycle, LifecycleState};
use crate::observability::{metrics, Logger};
use crate::resources::{Connector, ResourceSet};
use crate::routing;

type RouteFactory = Box<dyn FnOnce(&ResourceSet) -> Router + Send>;

/// What happened during shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub drain: DrainOutcome,
    /// Resource names in release order.
    pub released: Vec<String>,
}

impl ShutdownReport {
    /// Drained within the deadline.
    pub fn is_clean(&self) -> bool {
        self.drain == DrainOutcome::Completed
    }
}

/// Brings the service up and down.
pub struct Orchestrator {
    config: AppConfig,
    config_path: Option<PathBuf>,
    logger: Option<Logger>,
    connectors: Vec<Box<dyn Connector>>,
    routes: RouteFactory,
    lifecycle: Lifecycle,
    drain_deadline: Duration,
}

impl Orchestrator {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            config_path: None,
            logger: None,
            connectors: Vec::new(),
            routes: Box::new(routing::setup),
            lifecycle: Lifecycle::new(),
            drain_deadline: SHUTDOWN_DEADLINE,
        }
    }

    /// Use `logger` instead of the process-wide one.
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Watch the file the configuration came from and apply changes.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Register a resource client. Clients connect in registration order.
    pub fn with_resource<C: Connector + 'static>(mut self, connector: C) -> Self {
        self.connectors.push(Box::new(connector));
        self
    }

    /// Replace the route aggregate factory.
    pub fn with_routes<F>(mut self, routes: F) -> Self
    where
        F: FnOnce(&ResourceSet) -> Router + Send + 'static,
    {
        self.routes = Box::new(routes);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_drain_deadline(mut self, deadline: Duration) -> Self {
        self.drain_deadline = deadline;
        self
    }

    /// Handle for observing the lifecycle from outside.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    /// Start, wait for `trigger`, then shut down.
    pub async fn run<F: Future>(self, trigger: F) -> Result<ShutdownReport, Error> {
        self.start().await?.wait(trigger).await
    }

    /// Run the startup sequence and begin serving.
    pub async fn start(self) -> Result<Running, Error> {
        let Orchestrator {
            config,
            config_path,
            logger,
            connectors,
            routes,
            lifecycle,
            drain_deadline,
        } = self;

        // 1. Configuration
        validate_config(&config).map_err(ConfigError::Validation)?;

        // 2. Logger
        let logger = logger.unwrap_or_else(|| Logger::global().clone());
        logger.init(&config.log)?;
        tracing::debug!("logger initialized successfully");
        tracing::info!(
            name = %config.app.name,
            version = %config.app.version,
            mode = %config.app.mode,
            "Configuration loaded"
        );

        if config.server.metrics_enabled {
            if let Ok(addr) = config.server.metrics_address.parse() {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::warn!(error = %e, "Failed to start metrics endpoint");
                }
            }
        }

        let started = async {
            // 3. Resource clients
            let mut resources = ResourceSet::new();
            for connector in &connectors {
                let resource = connector.name();
                match connector.connect().await {
                    Ok(handle) => {
                        tracing::info!(resource, "Resource connected");
                        resources.push(handle);
                    }
                    Err(source) => {
                        tracing::error!(resource, error = %source, "Resource connect failed");
                        return Err(Error::Connect { resource, source });
                    }
                }
            }

            // 4. Route aggregate
            let server = HttpServer::new(routes(&resources), &config);

            // 5. Listener
            let listener = TcpListener::bind(config.app.bind_address())
                .await
                .map_err(|e| {
                    tracing::error!(address = %config.app.bind_address(), error = %e, "listen failed");
                    Error::Listen(e)
                })?;
            let local_addr = listener.local_addr().map_err(Error::Listen)?;
            Ok::<_, Error>((resources, server, listener, local_addr))
        }
        .await;
        let (resources, server, listener, local_addr) = match started {
            Ok(started) => started,
            Err(e) => {
                close_logger(&logger).await;
                return Err(e);
            }
        };

        let shared = SharedConfig::new(config);
        let reloader = config_path
            .as_deref()
            .and_then(|path| Reloader::spawn(path, shared.clone(), logger.clone()));

        let shutdown = Shutdown::new();
        lifecycle.advance(LifecycleState::Serving);
        let server = tokio::spawn(server.run(listener, shutdown.clone()));
        tracing::info!(address = %local_addr, "Server listening");

        Ok(Running {
            lifecycle,
            local_addr,
            config: shared,
            logger,
            shutdown,
            server,
            resources,
            reloader,
            drain_deadline,
        })
    }
}

/// A serving process.
///
/// Dropping it without calling [`Running::stop`] only stops the accept loop.
pub struct Running {
    lifecycle: Lifecycle,
    local_addr: SocketAddr,
    config: SharedConfig,
    logger: Logger,
    shutdown: Shutdown,
    server: JoinHandle<io::Result<()>>,
    resources: ResourceSet,
    reloader: Option<Reloader>,
    drain_deadline: Duration,
}

impl Running {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    /// Configuration currently in effect.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.current()
    }

    /// Serve until `trigger` resolves, then shut down.
    ///
    /// If the listener stops on its own first, resources are still released
    /// and the failure is returned.
    pub async fn wait<F: Future>(mut self, trigger: F) -> Result<ShutdownReport, Error> {
        let listener_exit = tokio::select! {
            _ = trigger => None,
            result = &mut self.server => Some(result),
        };

        let Some(result) = listener_exit else {
            return Ok(self.stop().await);
        };

        let err = match result {
            Ok(Ok(())) => io::Error::other("listener stopped unexpectedly"),
            Ok(Err(e)) => e,
            Err(join) => io::Error::other(join.to_string()),
        };
        tracing::error!(error = %err, "listen failed");
        self.lifecycle.advance(LifecycleState::Draining);
        self.finish().await;
        Err(Error::Listen(err))
    }

    /// Stop accepting, drain in-flight requests, release resources.
    pub async fn stop(mut self) -> ShutdownReport {
        self.lifecycle.advance(LifecycleState::Draining);
        tracing::info!("Shutdown Server ...");
        self.shutdown.trigger();

        let drain = shutdown::drain(&mut self.server, self.drain_deadline).await;
        match &drain {
            DrainOutcome::Completed => tracing::info!("In-flight requests drained"),
            DrainOutcome::DeadlineExceeded => tracing::error!(
                fatal = true,
                deadline_secs = self.drain_deadline.as_secs_f64(),
                "Server Shutdown: deadline exceeded"
            ),
            DrainOutcome::Failed(reason) => {
                tracing::error!(fatal = true, error = %reason, "Server Shutdown")
            }
        }

        let released = self.finish().await;
        ShutdownReport { drain, released }
    }

    async fn finish(&mut self) -> Vec<String> {
        if let Some(reloader) = self.reloader.take() {
            reloader.stop().await;
        }
        let released = self.resources.release().await;
        self.lifecycle.advance(LifecycleState::Terminated);
        tracing::info!("Server exiting");
        close_logger(&self.logger).await;
        released
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Uninstall the logger's sink once everything queued has been written.
async fn close_logger(logger: &Logger) {
    let logger = logger.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || logger.shutdown()).await {
        eprintln!("log shutdown failed: {e}");
    }
}

/// Applies configuration file changes while serving.
struct Reloader {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Reloader {
    fn spawn(path: &Path, shared: SharedConfig, logger: Logger) -> Option<Self> {
        let (watcher, mut updates) = ConfigWatcher::new(path);
        let watcher = match watcher.run() {
            Ok(watcher) => watcher,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Config watcher unavailable");
                return None;
            }
        };

        let path = path.display().to_string();
        let task = tokio::spawn(async move {
            while let Some(next) = updates.recv().await {
                tracing::info!(path = %path, "Config file changed");
                if shared.current().log != next.log {
                    // Replacing the sink waits for the old writer to drain.
                    let (swapper, settings) = (logger.clone(), next.log.clone());
                    match tokio::task::spawn_blocking(move || swapper.init(&settings)).await {
                        Ok(Err(e)) => tracing::error!(error = %e, "Failed to apply log settings"),
                        Err(e) => tracing::error!(error = %e, "Failed to apply log settings"),
                        Ok(Ok(())) => {}
                    }
                }
                shared.replace(next);
            }
        });

        Some(Self {
            _watcher: watcher,
            task,
        })
    }

    async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}
