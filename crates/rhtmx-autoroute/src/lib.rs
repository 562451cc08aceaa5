//! # RHTMX Autoroute
//!
//! Turns a directory tree of handler files into a live axum application and
//! keeps it in sync with the filesystem.
//!
//! ## Filesystem convention
//!
//! - `users/list.get.rs` → `GET /users/list`
//! - `users/index.post.rs` → `POST /users` (`index` adds no segment)
//! - `(admin)/users/list.get.rs` → `GET /users/list` (group directories add no segment)
//! - `_drafts/…`, `_helper.get.rs` → ignored
//! - `middleware.rs` → applied to every route at or below its directory,
//!   the closest declaration running first
//! - `expectations.toml` / `expectations.json` → metadata attached to routes
//!   directly inside the directory
//!
//! ## Hot reload
//!
//! Handler changes are applied to the running server in place. Middleware,
//! expectations and deletions rebuild the whole app: the old server is
//! stopped and a fresh one starts listening. Events are processed one at a
//! time, so at most one rebuild is ever in flight.
//!
//! ## Example
//!
//! ```no_run
//! use rhtmx_autoroute::binder::axum_server::AxumServerFactory;
//! use rhtmx_autoroute::loader::{handler_fn, ModuleRegistry};
//! use rhtmx_autoroute::{RouteBuilder, RouteConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> rhtmx_autoroute::Result<()> {
//! let config = RouteConfig::default();
//! let registry = ModuleRegistry::new(&config.source_directory)
//!     .with_handler("users/list.get.rs", handler_fn(|_req| async { "all users" }));
//!
//! let mut builder = RouteBuilder::new(
//!     config.clone(),
//!     Arc::new(registry),
//!     AxumServerFactory::new(&config.host),
//! );
//! builder.build().await?;
//! let handle = builder.watch()?;
//!
//! let _ = tokio::signal::ctrl_c().await;
//! handle.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

// ============================================================================
// Module Declarations
// ============================================================================

pub mod binder;
pub mod builder;
pub mod config;
mod error;
pub mod expectations;
pub mod loader;
pub mod middleware;
pub mod path;
pub mod reactor;
pub mod route;
pub mod scanner;
pub mod source;
pub mod table;
pub mod tree;
pub mod watcher;

pub use builder::{RouteBuilder, WatchHandle};
pub use config::RouteConfig;
pub use error::{Error, Result};
pub use expectations::Expectations;
pub use reactor::{ChangeReactor, FsEvent, Reaction, ReactorState};
pub use route::HttpMethod;
pub use table::RouteTable;

// ============================================================================
// Core Types
// ============================================================================

/// One discovered route, produced by exactly one handler file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDefinition {
    /// Normalized URL path like "/users/list"
    pub route_path: String,
    /// HTTP method taken from the filename
    pub method: HttpMethod,
    /// Absolute handler file path; resolved lazily through the module loader
    pub handler_path: PathBuf,
    /// Middleware files, own directory first, then ancestors nearest first
    pub middleware: Vec<PathBuf>,
    /// Expectations declared by the handler's directory
    pub expectations: Option<Expectations>,
    /// Inner name of the enclosing `(group)` directory
    pub group: Option<String>,
}

impl RouteDefinition {
    /// Creates a definition with no middleware or expectations
    pub fn new(route_path: impl Into<String>, method: HttpMethod, handler_path: impl Into<PathBuf>) -> Self {
        Self {
            route_path: route_path.into(),
            method,
            handler_path: handler_path.into(),
            middleware: Vec::new(),
            expectations: None,
            group: None,
        }
    }

    pub fn with_middleware<I, P>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.middleware = middleware.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expectations(mut self, expectations: Expectations) -> Self {
        self.expectations = Some(expectations);
        self
    }
}
