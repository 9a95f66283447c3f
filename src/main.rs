use anyhow::{Context, Result};
use gps_relay::api::create_router;
use gps_relay::config::RelayConfig;
use gps_relay::health::HealthReporter;
use gps_relay::relay::Relay;
use gps_relay::store;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gps_relay=info".into()),
        )
        .init();

    info!("GPS relay starting...");

    let config = RelayConfig::from_env().context("Failed to load configuration")?;

    info!(
        backend = ?config.store.backend,
        store_url = %store::redis_url(&config.store, true),
        key = %config.store.key,
        poll_interval_ms = config.poller.interval_ms,
        port = config.server.port,
        environment = %config.server.environment,
        allowed_origins = ?config.server.allowed_origins,
        "Configuration loaded"
    );

    // Store adapter never fails construction; an unusable client degrades to offline
    let store = store::connect(&config.store);

    let relay = Arc::new(Relay::from_config(Arc::clone(&store), &config));
    relay.watch_connectivity();

    let health = Arc::new(HealthReporter::new(
        Arc::clone(&store),
        config.server.port,
        config.server.environment.clone(),
    ));

    let router = create_router(Arc::clone(&relay), health, config.server.origin_policy());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(addr = %addr, "GPS relay listening (WebSocket: /ws, health: /health)");

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "HTTP server error");
    }

    // Graceful shutdown
    relay.shutdown().await;
    info!("GPS relay stopped");

    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl_c signal");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Shutdown signal received"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
