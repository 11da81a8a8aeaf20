//! Handlers for station and machine-type rollups.

use axum::extract::{Path, State};
use axum::Json;
use weldwatch_core::error::CoreError;
use weldwatch_core::telemetry::GroupSummary;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/stations
pub async fn list_stations(State(state): State<AppState>) -> Json<DataResponse<Vec<GroupSummary>>> {
    Json(DataResponse {
        data: state.telemetry.station_summaries(),
    })
}

/// GET /api/v1/stations/{id}
pub async fn get_station(
    State(state): State<AppState>,
    Path(station): Path<String>,
) -> AppResult<Json<DataResponse<GroupSummary>>> {
    let summary = state
        .telemetry
        .station_summary(&station)
        .ok_or(CoreError::NotFound {
            entity: "station",
            id: station,
        })?;
    Ok(Json(DataResponse { data: summary }))
}

/// GET /api/v1/machine-types
pub async fn list_machine_types(
    State(state): State<AppState>,
) -> Json<DataResponse<Vec<GroupSummary>>> {
    Json(DataResponse {
        data: state.telemetry.machine_type_summaries(),
    })
}

/// GET /api/v1/machine-types/{id}
pub async fn get_machine_type(
    State(state): State<AppState>,
    Path(machine_type): Path<String>,
) -> AppResult<Json<DataResponse<GroupSummary>>> {
    let summary = state
        .telemetry
        .machine_type_summary(&machine_type)
        .ok_or(CoreError::NotFound {
            entity: "machine type",
            id: machine_type,
        })?;
    Ok(Json(DataResponse { data: summary }))
}
