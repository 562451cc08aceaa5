use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rhtmx_autoroute::binder::axum_server::AxumServerFactory;
use rhtmx_autoroute::loader::{handler_fn, middleware_fn, ModuleRegistry};
use rhtmx_autoroute::{RouteBuilder, RouteConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Handlers compiled into the binary, one module per file under routes/
#[path = "../routes/index.get.rs"]
mod index_get;
#[path = "../routes/users/list.get.rs"]
mod users_list_get;
#[path = "../routes/users/index.post.rs"]
mod users_index_post;
#[path = "../routes/users/middleware.rs"]
mod users_middleware;
#[path = "../routes/(admin)/stats.get.rs"]
mod admin_stats_get;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    info!(
        source = %config.source_directory.display(),
        host = %config.host,
        port = config.port,
        base_path = %config.base_path,
        "rhtmx-autoroute starting"
    );

    let registry = registry(&config.source_directory);
    let factory = AxumServerFactory::new(&config.host);

    let mut builder = RouteBuilder::new(config, Arc::new(registry), factory);
    builder.build().await.context("initial build failed")?;

    let handle = builder.watch().context("failed to start watcher")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    info!("shutting down");
    let builder = handle.stop().await?;
    info!(routes = builder.table().len(), "stopped");
    Ok(())
}

/// autoroute.toml, then environment overrides
fn load_config() -> Result<RouteConfig> {
    let mut config = RouteConfig::load_default().unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        RouteConfig::default()
    });

    if let Ok(port) = env::var("AUTOROUTE_PORT") {
        config.port = port
            .parse()
            .with_context(|| format!("invalid AUTOROUTE_PORT: {}", port))?;
    }
    if let Ok(source) = env::var("AUTOROUTE_SOURCE") {
        config.source_directory = source.into();
    }

    Ok(config)
}

fn registry(root: &Path) -> ModuleRegistry {
    ModuleRegistry::new(root)
        .with_handler("index.get.rs", handler_fn(index_get::handler))
        .with_handler("users/list.get.rs", handler_fn(users_list_get::handler))
        .with_handler("users/index.post.rs", handler_fn(users_index_post::handler))
        .with_handler("(admin)/stats.get.rs", handler_fn(admin_stats_get::handler))
        .with_middleware("users/middleware.rs", middleware_fn(users_middleware::middleware))
}
