//! Serve command - run the update and download endpoints

use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::error::DepotResult;
use crate::server;
use crate::service::Depot;
use std::sync::Arc;
use tracing::{info, warn};

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: &Config) -> DepotResult<()> {
    let depot = Arc::new(Depot::from_config(config)?);
    if depot.registry().is_empty() {
        warn!("No packages configured; every update request will be rejected");
    }
    if config.upstream.token().is_none() {
        warn!("No upstream token configured; update requests will fail");
    }

    let bind = args.bind.as_deref().unwrap_or(&config.server.bind);
    let listener = server::bind(bind).await?;
    info!("Artifacts stored under {}", depot.store().root().display());

    server::serve(listener, depot, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
