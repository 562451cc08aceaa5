// File: src/builder.rs
// Purpose: Owns route discovery state and wires scanning, binding and watching together

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::binder::{AppBinder, ServerFactory};
use crate::expectations::ExpectationsResolver;
use crate::loader::ModuleLoader;
use crate::middleware::MiddlewareResolver;
use crate::reactor::{ChangeReactor, FsEvent, ReactorState};
use crate::scanner::DirectoryScanner;
use crate::source::SourceTree;
use crate::watcher::RouteWatcher;
use crate::{tree, Result, RouteConfig, RouteDefinition, RouteTable};

/// Entry point of the route engine
///
/// Holds the route table, both resolvers and the binder. After the initial
/// [`build`](Self::build), ownership moves into a [`ChangeReactor`] through
/// [`watch`](Self::watch) or [`reactor`](Self::reactor).
pub struct RouteBuilder<F: ServerFactory> {
    pub(crate) config: RouteConfig,
    pub(crate) source: SourceTree,
    pub(crate) loader: Arc<dyn ModuleLoader>,
    pub(crate) table: RouteTable,
    pub(crate) expectations: ExpectationsResolver,
    pub(crate) middleware: MiddlewareResolver,
    pub(crate) binder: AppBinder<F>,
}

impl<F: ServerFactory> RouteBuilder<F> {
    pub fn new(config: RouteConfig, loader: Arc<dyn ModuleLoader>, factory: F) -> Self {
        let source = SourceTree::new(&config.source_directory, config.extensions.clone());
        let binder = AppBinder::new(factory, Arc::clone(&loader), config.base_path.clone(), config.port);

        Self {
            middleware: MiddlewareResolver::new(source.clone()),
            source,
            loader,
            table: RouteTable::new(),
            expectations: ExpectationsResolver::new(),
            binder,
            config,
        }
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    pub fn source(&self) -> &SourceTree {
        &self.source
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn binder(&self) -> &AppBinder<F> {
        &self.binder
    }

    /// Rebuilds the route table from the whole source tree
    ///
    /// Returns the number of routes discovered. The server is not touched.
    pub fn scan(&mut self) -> usize {
        self.table = RouteTable::new();
        self.expectations = ExpectationsResolver::new();

        let root = self.source.root().to_path_buf();
        let found = self.scanner().scan(&root, "/");
        let count = found.len();
        for def in found {
            self.record(def);
        }

        info!(root = %root.display(), routes = count, "source tree scanned");
        count
    }

    /// Scans the source tree and starts a server with the result
    pub async fn build(&mut self) -> Result<()> {
        self.scan();
        info!("route tree:\n{}", tree::render(&self.table));
        self.binder.rebuild_app(&self.table).await
    }

    /// Hands the builder to a reactor without starting a watcher
    pub fn reactor(self) -> ChangeReactor<F> {
        ChangeReactor::new(self)
    }

    /// Starts watching the source tree and reacting to changes
    ///
    /// With `watch = false` in the config, no filesystem watcher is started
    /// and events can only be fed through [`WatchHandle::sender`].
    pub fn watch(self) -> Result<WatchHandle<F>> {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));

        let watcher = if self.config.watch {
            Some(RouteWatcher::new(self.source.clone(), tx.clone())?)
        } else {
            warn!("file watching disabled by configuration");
            None
        };

        let reactor = self.reactor();
        let state = reactor.subscribe();
        let task = tokio::spawn(reactor.run(rx));

        Ok(WatchHandle {
            watcher,
            events: tx,
            state,
            task,
        })
    }

    /// Stops the live server, if any
    pub async fn shutdown(&mut self) -> Result<()> {
        self.binder.shutdown().await
    }

    pub(crate) fn scanner(&mut self) -> DirectoryScanner<'_> {
        DirectoryScanner::new(
            &self.source,
            &self.middleware,
            &mut self.expectations,
            self.loader.as_ref(),
        )
    }

    /// Stores a definition, warning when it shadows another file's route
    pub(crate) fn record(&mut self, def: RouteDefinition) {
        if let Some(existing) = self.table.conflict_for(&def) {
            warn!(
                method = %def.method,
                route = %def.route_path,
                kept = %def.handler_path.display(),
                shadowed = %existing.handler_path.display(),
                "route collision, last registration wins"
            );
        }
        self.table.set(def.handler_path.clone(), def);
    }
}

/// Running watcher plus the reactor task draining its events
pub struct WatchHandle<F: ServerFactory> {
    watcher: Option<RouteWatcher>,
    events: mpsc::Sender<FsEvent>,
    state: watch::Receiver<ReactorState>,
    task: JoinHandle<RouteBuilder<F>>,
}

impl<F: ServerFactory> WatchHandle<F> {
    /// Queue for injecting events by hand
    pub fn sender(&self) -> mpsc::Sender<FsEvent> {
        self.events.clone()
    }

    pub fn state(&self) -> ReactorState {
        *self.state.borrow()
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Stops watching, drains queued events, then stops the live server
    ///
    /// Returns the builder with its final route table. Senders handed out by
    /// [`sender`](Self::sender) must be dropped first or this never returns.
    pub async fn stop(self) -> Result<RouteBuilder<F>> {
        drop(self.watcher);
        drop(self.events);

        let mut builder = self.task.await?;
        builder.shutdown().await?;
        info!("route watcher stopped");
        Ok(builder)
    }
}
