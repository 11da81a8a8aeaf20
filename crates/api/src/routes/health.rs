use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the telemetry transport is currently connected.
    pub transport_connected: bool,
    /// Devices with a live record.
    pub tracked_devices: usize,
    /// Dashboards connected to the push channel.
    pub dashboard_clients: usize,
}

/// GET /health -- returns service and transport health.
///
/// A disconnected transport reports `degraded` rather than failing: the
/// last known readings are still served.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let transport_connected = state.telemetry.is_connected();
    let status = if transport_connected { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        transport_connected,
        tracked_devices: state.telemetry.snapshot_all().len(),
        dashboard_clients: state.dashboards.client_count(),
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
