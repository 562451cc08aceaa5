//! Applying the route table to a web server
//!
//! [`AppBinder`] is the only component that creates, starts and stops
//! server instances. The server itself sits behind [`AppServer`] and
//! [`ServerFactory`]; [`axum_server::AxumServer`] is the shipped implementation.

pub mod axum_server;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::loader::{Handler, Middleware, ModuleLoader};
use crate::middleware::MiddlewareCache;
use crate::{HttpMethod, Result, RouteDefinition, RouteTable};

/// A route with its handler and middleware loaded, ready for registration
#[derive(Clone)]
pub struct BoundRoute {
    pub method: HttpMethod,
    /// URL path relative to the server's base path
    pub path: String,
    pub handler: Handler,
    /// Loaded middleware, closest scope first (runs first)
    pub middleware: Vec<Middleware>,
    /// Handler file this route was loaded from
    pub source: PathBuf,
    /// Loader generation of the handler file at load time
    pub generation: u64,
}

impl std::fmt::Debug for BoundRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundRoute")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("middleware", &self.middleware.len())
            .field("source", &self.source)
            .field("generation", &self.generation)
            .finish()
    }
}

/// One web server instance
///
/// Routes may be registered before `listen` (full rebuild) or while the
/// instance is live (incremental update). Registering a `(method, path)`
/// that is already present replaces its handler.
pub trait AppServer: Send + 'static {
    fn route(&mut self, route: BoundRoute);

    fn listen(&mut self, port: u16) -> impl Future<Output = Result<()>> + Send;

    fn stop(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn is_running(&self) -> bool;
}

/// Creates fresh server instances whose routes live under a base path
pub trait ServerFactory: Send + Sync + 'static {
    type Server: AppServer;

    fn create(&self, base_path: &str) -> Self::Server;
}

/// Materializes route tables on server instances
pub struct AppBinder<F: ServerFactory> {
    factory: F,
    loader: Arc<dyn ModuleLoader>,
    middleware: MiddlewareCache,
    base_path: String,
    port: u16,
    live: Option<F::Server>,
}

impl<F: ServerFactory> AppBinder<F> {
    pub fn new(factory: F, loader: Arc<dyn ModuleLoader>, base_path: impl Into<String>, port: u16) -> Self {
        Self {
            factory,
            loader,
            middleware: MiddlewareCache::new(),
            base_path: base_path.into(),
            port,
            live: None,
        }
    }

    /// Builds a fresh server from the whole table and swaps it in
    ///
    /// The new instance is fully populated before the previous one is
    /// stopped. Routes whose handler fails to load are skipped.
    pub async fn rebuild_app(&mut self, table: &RouteTable) -> Result<()> {
        let mut server = self.factory.create(&self.base_path);

        let mut bound = 0usize;
        for def in table.values() {
            if let Some(route) = self.bind(def) {
                server.route(route);
                bound += 1;
            }
        }

        if let Some(mut previous) = self.live.take() {
            if previous.is_running() {
                if let Err(e) = previous.stop().await {
                    warn!(error = %e, "failed to stop previous server instance");
                }
            }
        }

        server.listen(self.port).await?;
        info!(routes = bound, port = self.port, base_path = %self.base_path, "server rebuilt");
        self.live = Some(server);
        Ok(())
    }

    /// Registers one route on the live server without teardown
    ///
    /// Returns `false` when the handler could not be loaded and nothing was
    /// registered.
    pub fn apply_single_route(&mut self, def: &RouteDefinition) -> Result<bool> {
        let route = self.bind(def);
        let server = self.live.as_mut().ok_or(crate::Error::NotRunning)?;

        match route {
            Some(route) => {
                info!(method = %route.method, path = %route.path, generation = route.generation, "route applied");
                server.route(route);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether a live server instance is currently running
    pub fn is_live(&self) -> bool {
        self.live.as_ref().map_or(false, |server| server.is_running())
    }

    pub fn live_server(&self) -> Option<&F::Server> {
        self.live.as_ref()
    }

    /// Stops the live server, if any
    pub async fn shutdown(&mut self) -> Result<()> {
        match self.live.take() {
            Some(mut server) if server.is_running() => server.stop().await,
            _ => Ok(()),
        }
    }

    /// Forgets the loaded value of a middleware file
    pub fn evict_middleware(&mut self, path: &std::path::Path) {
        self.middleware.evict(path);
    }

    /// Loads the handler and middleware chain of a definition
    ///
    /// Middleware failures drop only the failing entry; handler failures
    /// drop the route.
    fn bind(&mut self, def: &RouteDefinition) -> Option<BoundRoute> {
        let generation = self.loader.generation(&def.handler_path);
        let handler = match self.loader.load_handler(&def.handler_path) {
            Ok(handler) => handler,
            Err(e) => {
                warn!(
                    path = %def.handler_path.display(),
                    route = %def.route_path,
                    error = %e,
                    "failed to load handler, route skipped"
                );
                return None;
            }
        };

        let loader = self.loader.as_ref();
        let middleware = def
            .middleware
            .iter()
            .filter_map(|path| match self.middleware.get_or_load(path, loader) {
                Ok(middleware) => Some(middleware),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load middleware, skipped");
                    None
                }
            })
            .collect();

        Some(BoundRoute {
            method: def.method,
            path: def.route_path.clone(),
            handler,
            middleware,
            source: def.handler_path.clone(),
            generation,
        })
    }
}
