use std::sync::Arc;

use weldwatch_live::LiveTelemetry;

use crate::config::ServerConfig;
use crate::ws::DashboardHub;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Live telemetry core: subscriptions, snapshots and rollups.
    pub telemetry: Arc<LiveTelemetry>,
    /// Connected dashboard WebSocket clients.
    pub dashboards: Arc<DashboardHub>,
}
