use axum::routing::{get, put};
use axum::Router;

use crate::handlers::devices;
use crate::state::AppState;

/// ```text
/// GET /devices                  -> list_devices
/// GET /devices/{id}             -> get_device
/// PUT /devices/{id}/thresholds  -> update_thresholds
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/devices", get(devices::list_devices))
        .route("/devices/{id}", get(devices::get_device))
        .route("/devices/{id}/thresholds", put(devices::update_thresholds))
}
