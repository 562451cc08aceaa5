// File: src/loader.rs
// Purpose: Resolves handler, middleware and expectations files to loaded values

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::expectations::Expectations;
use crate::{Error, Result};

/// A loaded request handler
pub type Handler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// A loaded middleware: receives the request and the rest of the chain
pub type Middleware = Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync>;

/// Wraps an async function into a [`Handler`]
pub fn handler_fn<F, Fut, R>(f: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    Arc::new(move |req: Request| -> BoxFuture<'static, Response> {
        let fut = f(req);
        Box::pin(async move { fut.await.into_response() })
    })
}

/// Wraps an async function into a [`Middleware`]
pub fn middleware_fn<F, Fut, R>(f: F) -> Middleware
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    Arc::new(move |req: Request, next: Next| -> BoxFuture<'static, Response> {
        let fut = f(req, next);
        Box::pin(async move { fut.await.into_response() })
    })
}

/// Resolves files of the source tree to loadable values
///
/// Every file carries a generation counter. [`ModuleLoader::invalidate`]
/// bumps it so that caches keyed by generation reload on next use.
pub trait ModuleLoader: Send + Sync + 'static {
    fn load_handler(&self, path: &Path) -> Result<Handler>;

    fn load_middleware(&self, path: &Path) -> Result<Middleware>;

    fn load_expectations(&self, path: &Path) -> Result<Expectations>;

    /// Current generation of a file (0 until first invalidated)
    fn generation(&self, path: &Path) -> u64;

    /// Marks a file as changed and returns its new generation
    fn invalidate(&self, path: &Path) -> u64;
}

/// In-process module registry
///
/// Handlers and middleware are Rust closures registered under the path of
/// the file they stand for, relative to the source root
/// (`users/list.get.rs`). Expectations may be registered the same way or
/// read from `expectations.toml` / `expectations.json` on disk.
pub struct ModuleRegistry {
    root: PathBuf,
    handlers: DashMap<PathBuf, Handler>,
    middleware: DashMap<PathBuf, Middleware>,
    expectations: DashMap<PathBuf, Expectations>,
    generations: DashMap<PathBuf, u64>,
}

impl ModuleRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = fs::canonicalize(&root).unwrap_or(root);

        Self {
            root,
            handlers: DashMap::new(),
            middleware: DashMap::new(),
            expectations: DashMap::new(),
            generations: DashMap::new(),
        }
    }

    /// Builder-style handler registration
    pub fn with_handler(self, file: impl AsRef<Path>, handler: Handler) -> Self {
        self.register_handler(file, handler);
        self
    }

    /// Builder-style middleware registration
    pub fn with_middleware(self, file: impl AsRef<Path>, middleware: Middleware) -> Self {
        self.register_middleware(file, middleware);
        self
    }

    /// Builder-style expectations registration
    pub fn with_expectations(self, file: impl AsRef<Path>, expectations: Expectations) -> Self {
        self.register_expectations(file, expectations);
        self
    }

    pub fn register_handler(&self, file: impl AsRef<Path>, handler: Handler) {
        self.handlers.insert(self.key(file.as_ref()), handler);
    }

    pub fn register_middleware(&self, file: impl AsRef<Path>, middleware: Middleware) {
        self.middleware.insert(self.key(file.as_ref()), middleware);
    }

    pub fn register_expectations(&self, file: impl AsRef<Path>, expectations: Expectations) {
        self.expectations.insert(self.key(file.as_ref()), expectations);
    }

    /// Drops every registration for a file
    pub fn unregister(&self, file: impl AsRef<Path>) {
        let key = self.key(file.as_ref());
        self.handlers.remove(&key);
        self.middleware.remove(&key);
        self.expectations.remove(&key);
    }

    /// Registry key: the path relative to the root when it lies inside it
    fn key(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).unwrap_or(path).to_path_buf()
    }

    fn read_expectations(&self, path: &Path) -> Result<Expectations> {
        let content = fs::read_to_string(path)?;
        let invalid = |message: String| Error::Expectations {
            path: path.to_path_buf(),
            message,
        };

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| invalid(e.to_string())),
            Some("json") => serde_json::from_str(&content).map_err(|e| invalid(e.to_string())),
            _ => Err(Error::ModuleNotFound(path.to_path_buf())),
        }
    }
}

impl ModuleLoader for ModuleRegistry {
    fn load_handler(&self, path: &Path) -> Result<Handler> {
        self.handlers
            .get(&self.key(path))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::ModuleNotFound(path.to_path_buf()))
    }

    fn load_middleware(&self, path: &Path) -> Result<Middleware> {
        self.middleware
            .get(&self.key(path))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::ModuleNotFound(path.to_path_buf()))
    }

    fn load_expectations(&self, path: &Path) -> Result<Expectations> {
        if let Some(registered) = self.expectations.get(&self.key(path)) {
            return Ok(registered.value().clone());
        }

        self.read_expectations(path)
    }

    fn generation(&self, path: &Path) -> u64 {
        self.generations
            .get(&self.key(path))
            .map_or(0, |generation| *generation)
    }

    fn invalidate(&self, path: &Path) -> u64 {
        let mut generation = self.generations.entry(self.key(path)).or_insert(0);
        *generation += 1;
        *generation
    }
}
