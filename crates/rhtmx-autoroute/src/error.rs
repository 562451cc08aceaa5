use std::path::PathBuf;

/// Errors surfaced by the route engine
///
/// Most failures inside a scan or a reaction are isolated and only logged;
/// these variants are what individual loads, the config layer and the
/// server lifecycle report to their caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no module registered for {}", .0.display())]
    ModuleNotFound(PathBuf),

    #[error("invalid expectations in {}: {message}", path.display())]
    Expectations { path: PathBuf, message: String },

    #[error("invalid config file {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("server task failed: {0}")]
    ServerTask(#[from] tokio::task::JoinError),

    #[error("no server instance is running")]
    NotRunning,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
