// File: src/binder/axum_server.rs
// Purpose: AppServer implementation on top of axum

use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{from_fn, Next};
use axum::response::IntoResponse;
use axum::routing::{any, on, MethodRouter};
use axum::Router;
use dashmap::DashMap;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::{AppServer, BoundRoute, ServerFactory};
use crate::path::join_route_path;
use crate::{Error, HttpMethod, Result};

type RouteKey = (HttpMethod, String);

/// Indirection cell between a registered route and its current handler
///
/// The slot owns the handler composed with its middleware chain. Requests
/// resolve the slot at dispatch time, so an incremental update or a
/// colliding registration replaces handler and middleware together.
struct HandlerSlot {
    generation: u64,
    source: PathBuf,
    service: MethodRouter,
}

impl HandlerSlot {
    fn compose(route: &BoundRoute) -> Self {
        let handler = route.handler.clone();
        let mut service = any(move |req: Request| {
            let handler = handler.clone();
            async move { handler(req).await }
        });

        // Closest middleware is applied last so it ends up outermost
        for middleware in route.middleware.iter().rev() {
            let middleware = Arc::clone(middleware);
            service = service.layer(from_fn(move |req: Request, next: Next| middleware(req, next)));
        }

        Self {
            generation: route.generation,
            source: route.source.clone(),
            service,
        }
    }
}

/// Creates [`AxumServer`] instances bound to one host
#[derive(Debug, Clone)]
pub struct AxumServerFactory {
    host: String,
}

impl AxumServerFactory {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl ServerFactory for AxumServerFactory {
    type Server = AxumServer;

    fn create(&self, base_path: &str) -> AxumServer {
        AxumServer::new(&self.host, base_path)
    }
}

struct Running {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
    local_addr: SocketAddr,
}

/// One axum application instance
///
/// The router is published through an `ArcSwap`, so routes added while the
/// instance is listening become visible to the next request without a
/// restart.
pub struct AxumServer {
    host: String,
    base_path: String,
    router: Router,
    slots: Arc<DashMap<RouteKey, HandlerSlot>>,
    published: Arc<ArcSwap<Router>>,
    running: Option<Running>,
}

impl AxumServer {
    pub fn new(host: impl Into<String>, base_path: &str) -> Self {
        Self {
            host: host.into(),
            base_path: join_route_path(base_path, "/"),
            router: Router::new(),
            slots: Arc::new(DashMap::new()),
            published: Arc::new(ArcSwap::from_pointee(Router::new())),
            running: None,
        }
    }

    /// Snapshot of the current router
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Address actually bound, once listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    /// Generation of the handler currently serving `(method, path)`
    pub fn slot_generation(&self, method: HttpMethod, path: &str) -> Option<u64> {
        let key = (method, join_route_path(&self.base_path, path));
        self.slots.get(&key).map(|slot| slot.generation)
    }

    pub fn route_count(&self) -> usize {
        self.slots.len()
    }

    fn publish(&self) {
        self.published.store(Arc::new(self.router.clone()));
    }
}

impl AppServer for AxumServer {
    fn route(&mut self, route: BoundRoute) {
        let full_path = join_route_path(&self.base_path, &route.path);
        let key = (route.method, full_path.clone());

        if let Some(previous) = self.slots.insert(key.clone(), HandlerSlot::compose(&route)) {
            if previous.source != route.source {
                warn!(
                    method = %route.method,
                    route = %full_path,
                    kept = %route.source.display(),
                    shadowed = %previous.source.display(),
                    "route collision, last registration wins"
                );
            }
            debug!(method = %route.method, route = %full_path, generation = route.generation, "handler slot replaced");
            return;
        }

        let slots = Arc::clone(&self.slots);
        let dispatch_key = key.clone();
        let dispatch = move |req: Request| {
            let service = slots.get(&dispatch_key).map(|slot| slot.service.clone());
            async move {
                match service {
                    Some(service) => match service.oneshot(req).await {
                        Ok(response) => response,
                        Err(never) => match never {},
                    },
                    None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
                }
            }
        };

        // axum panics on paths it cannot insert (conflicting parameter names)
        let candidate = self.router.clone();
        let method_router = on(route.method.filter(), dispatch);
        let inserted = panic::catch_unwind(AssertUnwindSafe(move || {
            candidate.route(&full_path, method_router)
        }));

        match inserted {
            Ok(router) => {
                self.router = router;
                self.publish();
            }
            Err(_) => {
                self.slots.remove(&key);
                warn!(
                    method = %route.method,
                    route = %key.1,
                    path = %route.source.display(),
                    "route rejected by router, skipped"
                );
            }
        }
    }

    async fn listen(&mut self, port: u16) -> Result<()> {
        if self.running.is_some() {
            return Ok(());
        }

        let listener = TcpListener::bind((self.host.as_str(), port)).await?;
        let local_addr = listener.local_addr()?;
        self.publish();

        let published = Arc::clone(&self.published);
        let app = Router::new()
            .fallback_service(tower::service_fn(move |req: Request| {
                let router = published.load_full();
                async move { Router::clone(&router).oneshot(req).await }
            }))
            .layer(TraceLayer::new_for_http());

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await
        });

        info!(addr = %local_addr, base_path = %self.base_path, "listening");
        self.running = Some(Running {
            shutdown,
            task,
            local_addr,
        });
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let running = self.running.take().ok_or(Error::NotRunning)?;
        let _ = running.shutdown.send(());
        running.task.await??;

        info!(addr = %running.local_addr, "stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map_or(false, |running| !running.task.is_finished())
    }
}
