//! Handlers for per-device live records.

use axum::extract::{Path, State};
use axum::Json;
use weldwatch_core::error::CoreError;
use weldwatch_core::telemetry::{DeviceLiveRecord, ThresholdConfig};
use weldwatch_core::types::DeviceId;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/devices
///
/// Every tracked device, ordered by id.
pub async fn list_devices(
    State(state): State<AppState>,
) -> Json<DataResponse<Vec<DeviceLiveRecord>>> {
    Json(DataResponse {
        data: state.telemetry.devices(),
    })
}

/// GET /api/v1/devices/{id}
pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<DeviceId>,
) -> AppResult<Json<DataResponse<DeviceLiveRecord>>> {
    let record = state
        .telemetry
        .device_snapshot(&device_id)
        .ok_or_else(|| CoreError::NotFound {
            entity: "device",
            id: device_id.to_string(),
        })?;
    Ok(Json(DataResponse { data: record }))
}

/// PUT /api/v1/devices/{id}/thresholds
///
/// Replace the thresholds of a tracked device. The health colour is
/// re-derived from the last sample immediately.
pub async fn update_thresholds(
    State(state): State<AppState>,
    Path(device_id): Path<DeviceId>,
    Json(config): Json<ThresholdConfig>,
) -> AppResult<Json<DataResponse<DeviceLiveRecord>>> {
    let record = state.telemetry.upsert_thresholds(&device_id, config)?;
    tracing::info!(device_id = %device_id, "Thresholds updated");
    Ok(Json(DataResponse { data: record }))
}
