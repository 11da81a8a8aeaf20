use axum::extract::State;
use axum::Json;
use weldwatch_live::{ConnectionStatus, CounterSnapshot};

use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/connection
pub async fn get_connection(
    State(state): State<AppState>,
) -> Json<DataResponse<ConnectionStatus>> {
    Json(DataResponse {
        data: state.telemetry.connection_status(),
    })
}

/// GET /api/v1/counters
pub async fn get_counters(State(state): State<AppState>) -> Json<DataResponse<CounterSnapshot>> {
    Json(DataResponse {
        data: state.telemetry.counters(),
    })
}
