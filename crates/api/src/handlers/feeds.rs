//! Handlers for the backend-pushed topology and historical metrics.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use weldwatch_core::telemetry::{HistoricalMetricsBook, Topology};

use crate::response::DataResponse;
use crate::state::AppState;

/// Outcome of a topology replacement.
#[derive(Debug, Serialize)]
pub struct TopologyReplaced {
    /// Devices in the new topology.
    pub devices: usize,
    /// Tracked records whose thresholds changed.
    pub updated_records: usize,
}

/// PUT /api/v1/topology
pub async fn replace_topology(
    State(state): State<AppState>,
    Json(topology): Json<Topology>,
) -> Json<DataResponse<TopologyReplaced>> {
    let devices = topology.len();
    let updated_records = state.telemetry.replace_topology(topology);
    Json(DataResponse {
        data: TopologyReplaced {
            devices,
            updated_records,
        },
    })
}

/// PUT /api/v1/historical-metrics
pub async fn replace_historical_metrics(
    State(state): State<AppState>,
    Json(book): Json<HistoricalMetricsBook>,
) -> StatusCode {
    state.telemetry.replace_historical_metrics(book);
    StatusCode::NO_CONTENT
}
