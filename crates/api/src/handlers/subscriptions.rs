//! Handlers for starting and stopping device streams.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use weldwatch_core::telemetry::ThresholdConfig;
use weldwatch_core::types::DeviceId;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /subscriptions`.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub device_ids: Vec<DeviceId>,
    /// Per-device thresholds. Devices left out use the topology thresholds.
    #[serde(default)]
    pub configs: HashMap<DeviceId, ThresholdConfig>,
}

/// Request body for `DELETE /subscriptions`.
#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub device_ids: Vec<DeviceId>,
    /// Keep the last reading readable instead of dropping the records.
    #[serde(default)]
    pub keep_snapshot: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/subscriptions
///
/// Devices currently being streamed, in id order.
pub async fn list_subscriptions(
    State(state): State<AppState>,
) -> Json<DataResponse<Vec<DeviceId>>> {
    Json(DataResponse {
        data: state.telemetry.active_devices(),
    })
}

/// POST /api/v1/subscriptions
pub async fn subscribe(
    State(state): State<AppState>,
    Json(input): Json<SubscribeRequest>,
) -> AppResult<StatusCode> {
    validate_device_ids(&input.device_ids)?;
    if let Some(stray) = input.configs.keys().find(|id| !input.device_ids.contains(id)) {
        return Err(AppError::BadRequest(format!(
            "config supplied for device {stray} which is not being subscribed"
        )));
    }

    state.telemetry.subscribe(&input.device_ids, input.configs).await?;

    tracing::info!(count = input.device_ids.len(), "Devices subscribed");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/subscriptions
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(input): Json<UnsubscribeRequest>,
) -> AppResult<StatusCode> {
    validate_device_ids(&input.device_ids)?;

    if input.keep_snapshot {
        state.telemetry.pause(&input.device_ids).await?;
    } else {
        state.telemetry.unsubscribe(&input.device_ids).await?;
    }

    tracing::info!(
        count = input.device_ids.len(),
        keep_snapshot = input.keep_snapshot,
        "Devices unsubscribed",
    );
    Ok(StatusCode::NO_CONTENT)
}

fn validate_device_ids(ids: &[DeviceId]) -> AppResult<()> {
    if ids.is_empty() {
        return Err(AppError::BadRequest("device_ids must not be empty".to_string()));
    }
    if ids.iter().any(|id| id.as_str().trim().is_empty()) {
        return Err(AppError::BadRequest("device_ids must not contain blank ids".to_string()));
    }
    Ok(())
}
