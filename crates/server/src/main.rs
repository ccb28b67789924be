use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use gobuddy_core::config::{AppConfig, LoadOptions};
use gobuddy_server::{bootstrap, router, telemetry};
use tokio::sync::Notify;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    // Logging needs the config, so load it before anything else
    let config = AppConfig::load(LoadOptions::default())?;
    telemetry::init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let server_config = app.config.server.clone();

    let eviction = bootstrap::spawn_limiter_eviction(
        vec![app.state.ai_limiter.clone(), app.state.general_limiter.clone()],
        Duration::from_secs(app.config.rate_limit.eviction_interval_secs),
    );

    let routes = router(app.state, &server_config.cors_origins());
    let address = format!("{}:{}", server_config.bind_address, server_config.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "gobuddy-server listening"
    );

    let shutdown = Arc::new(Notify::new());
    let trigger = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, routes.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move { trigger.notified().await })
            .await
    });

    wait_for_shutdown().await?;
    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = server_config.graceful_shutdown_secs,
        "gobuddy-server draining in-flight requests"
    );
    shutdown.notify_one();
    eviction.abort();

    match tokio::time::timeout(Duration::from_secs(server_config.graceful_shutdown_secs), server)
        .await
    {
        Ok(joined) => joined.context("server task panicked")??,
        Err(_) => warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            "in-flight requests did not finish before the grace period"
        ),
    }
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
