use std::sync::Arc;

use anyhow::Context;
use kmap_core::{run_stdio, HttpBackend, HttpBackendConfig, SessionConfig, SessionController};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SessionConfig::from_env()?;

    // stdout carries the protocol, so logs go to stderr.
    // RUST_LOG takes precedence over KMAP_LOG_LEVEL.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let backend = HttpBackend::new(HttpBackendConfig::from(&config))
        .context("Failed to build the API client")?;
    tracing::info!(api = %backend.base_url(), "Starting kmap session bridge");

    let (controller, handle, events) = SessionController::new(Arc::new(backend), config);
    let session = tokio::spawn(controller.run());

    run_stdio(handle, events).await?;
    session.await.context("Session task panicked")?;
    Ok(())
}
