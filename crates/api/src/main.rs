use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weldwatch_api::config::ServerConfig;
use weldwatch_api::router::build_app_router;
use weldwatch_api::{state, ws};
use weldwatch_live::{LiveConfig, LiveTelemetry, WsTransport};

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "weldwatch_api=debug,weldwatch_live=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid server configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let live_config = match LiveConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid live telemetry configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        transport_url = %live_config.transport_url,
        stale_policy = ?live_config.stale_policy,
        "Loaded live telemetry configuration",
    );

    // --- Live telemetry ---
    let transport = Arc::new(WsTransport::new(live_config.transport_url.clone()));
    let telemetry = LiveTelemetry::start(transport, live_config);
    tracing::info!("Live telemetry started");

    // --- Dashboard clients ---
    let dashboards = Arc::new(ws::DashboardHub::new());

    // --- Relay (change feed -> dashboards) ---
    let relay_cancel = CancellationToken::new();
    let relay_handle = ws::start_relay(
        Arc::clone(&telemetry),
        Arc::clone(&dashboards),
        relay_cancel.clone(),
    );

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        telemetry: Arc::clone(&telemetry),
        dashboards: Arc::clone(&dashboards),
    };

    // --- Router ---
    let app = match build_app_router(state, &config) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build router");
            std::process::exit(1);
        }
    };

    // --- Start server ---
    let addr = config.bind_addr();
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Unsubscribe from the transport first so no new samples arrive.
    telemetry.shutdown().await;
    tracing::info!("Live telemetry shut down");

    relay_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), relay_handle).await;
    tracing::info!("Relay stopped");

    let closed = dashboards.close_all();
    tracing::info!(closed, "Closed remaining dashboard connections");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM (on Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
