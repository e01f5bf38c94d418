use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;

use neoledger_api::app::{build_app, build_services};
use neoledger_infra::{AppConfig, OutboxRelay};

const RELAY_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    neoledger_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = Arc::new(build_services(&config).await.context("failed to initialise storage")?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay = OutboxRelay::new(services.store.clone());
    let relay_task = tokio::spawn(relay.run(services.bus.clone(), RELAY_INTERVAL, shutdown_rx));

    let app = build_app(services);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    let _ = relay_task.await;
    Ok(())
}
