// File: src/reactor.rs
// Purpose: Applies filesystem events to the route table and the live server

use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::binder::ServerFactory;
use crate::builder::RouteBuilder;
use crate::source::DeclarationKind;
use crate::tree;

/// Filesystem change delivered to the reactor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Add(PathBuf),
    Change(PathBuf),
    Unlink(PathBuf),
    UnlinkDir(PathBuf),
    AddDir(PathBuf),
    Error(String),
}

/// What a single event did to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Nothing in the route table changed
    Unchanged,
    /// One route was reapplied to the live server
    Incremental,
    /// The server was torn down and rebuilt from the whole table
    FullRebuild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReactorState {
    #[default]
    Idle,
    Reacting,
}

/// Serializes filesystem events into route table updates
///
/// Owns the [`RouteBuilder`]. Events are handled one at a time and each
/// reaction, including any server stop/listen, completes before the next
/// event is taken from the queue.
pub struct ChangeReactor<F: ServerFactory> {
    builder: RouteBuilder<F>,
    state: watch::Sender<ReactorState>,
}

impl<F: ServerFactory> ChangeReactor<F> {
    pub fn new(builder: RouteBuilder<F>) -> Self {
        let (state, _) = watch::channel(ReactorState::Idle);
        Self { builder, state }
    }

    pub fn builder(&self) -> &RouteBuilder<F> {
        &self.builder
    }

    pub fn into_builder(self) -> RouteBuilder<F> {
        self.builder
    }

    pub fn state(&self) -> ReactorState {
        *self.state.borrow()
    }

    /// Follows state transitions from another task
    pub fn subscribe(&self) -> watch::Receiver<ReactorState> {
        self.state.subscribe()
    }

    /// Handles one event to completion
    pub async fn handle(&mut self, event: FsEvent) -> Reaction {
        self.state.send_replace(ReactorState::Reacting);
        let reaction = self.builder.react(event).await;
        self.state.send_replace(ReactorState::Idle);
        reaction
    }

    /// Drains the pending-event queue until every sender is gone
    pub async fn run(mut self, mut events: mpsc::Receiver<FsEvent>) -> RouteBuilder<F> {
        while let Some(event) = events.recv().await {
            let reaction = self.handle(event).await;
            debug!(?reaction, "event handled");
        }

        info!("event queue closed, reactor stopped");
        self.builder
    }
}

impl<F: ServerFactory> RouteBuilder<F> {
    pub(crate) async fn react(&mut self, event: FsEvent) -> Reaction {
        debug!(?event, "reacting");

        let reaction = match event {
            FsEvent::Add(path) | FsEvent::Change(path) => self.on_file_written(&path).await,
            FsEvent::Unlink(path) => self.on_file_removed(&path).await,
            FsEvent::UnlinkDir(dir) => self.on_dir_removed(&dir).await,
            FsEvent::AddDir(dir) => self.on_dir_added(&dir).await,
            FsEvent::Error(message) => {
                warn!(error = %message, "file watcher error");
                Reaction::Unchanged
            }
        };

        if reaction != Reaction::Unchanged {
            info!("route tree:\n{}", tree::render(&self.table));
        }
        reaction
    }

    async fn on_file_written(&mut self, path: &Path) -> Reaction {
        if self.source.is_ignored(path) {
            return Reaction::Unchanged;
        }

        if let Some(kind) = self.declaration_kind(path) {
            return self.on_declaration_changed(path, kind).await;
        }

        self.loader.invalidate(path);
        let Some(def) = self.scanner().definition_for(path) else {
            debug!(path = %path.display(), "not a handler file");
            return Reaction::Unchanged;
        };

        self.record(def.clone());

        if !self.binder.is_live() {
            return self.full_rebuild().await;
        }

        match self.binder.apply_single_route(&def) {
            Ok(_) => Reaction::Incremental,
            Err(e) => {
                warn!(error = %e, route = %def.route_path, "incremental update failed, rebuilding");
                self.full_rebuild().await
            }
        }
    }

    async fn on_file_removed(&mut self, path: &Path) -> Reaction {
        if let Some(kind) = self.declaration_kind(path) {
            if kind == DeclarationKind::Middleware {
                self.binder.evict_middleware(path);
            }
            return self.on_declaration_changed(path, kind).await;
        }

        self.loader.invalidate(path);
        match self.table.remove(path) {
            Some(def) => {
                info!(method = %def.method, route = %def.route_path, "route removed");
                self.full_rebuild().await
            }
            // Removal events do not always say whether a file or a directory went away
            None => self.on_dir_removed(path).await,
        }
    }

    async fn on_dir_removed(&mut self, dir: &Path) -> Reaction {
        self.expectations.invalidate_under(dir);

        let removed = self.table.remove_all_under(dir);
        if removed.is_empty() {
            return Reaction::Unchanged;
        }

        info!(dir = %dir.display(), routes = removed.len(), "directory removed");
        self.full_rebuild().await
    }

    async fn on_dir_added(&mut self, dir: &Path) -> Reaction {
        let found = self.scanner().scan_subtree(dir);
        if found.is_empty() {
            return Reaction::Unchanged;
        }

        info!(dir = %dir.display(), routes = found.len(), "directory added");
        for def in found {
            self.record(def);
        }
        self.full_rebuild().await
    }

    /// Middleware or expectations changed: the whole directory is rescanned
    async fn on_declaration_changed(&mut self, path: &Path, kind: DeclarationKind) -> Reaction {
        let Some(dir) = path.parent() else {
            return Reaction::Unchanged;
        };
        if self.source.is_ignored(dir) {
            return Reaction::Unchanged;
        }

        self.loader.invalidate(path);
        if kind == DeclarationKind::Expectations {
            self.expectations.invalidate(dir);
        }

        let removed = self.table.remove_all_under(dir);
        let found = self.scanner().scan_subtree(dir);
        info!(
            path = %path.display(),
            removed = removed.len(),
            found = found.len(),
            "directory declaration changed, rescanned"
        );

        for def in found {
            self.record(def);
        }
        self.full_rebuild().await
    }

    async fn full_rebuild(&mut self) -> Reaction {
        if let Err(e) = self.binder.rebuild_app(&self.table).await {
            error!(error = %e, "full rebuild failed");
        }
        Reaction::FullRebuild
    }

    fn declaration_kind(&self, path: &Path) -> Option<DeclarationKind> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| self.source.declaration_kind(name))
    }
}
