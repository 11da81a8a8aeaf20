use axum::routing::get;
use axum::Router;

use crate::handlers::groups;
use crate::state::AppState;

/// ```text
/// GET /stations             -> list_stations
/// GET /stations/{id}        -> get_station
/// GET /machine-types        -> list_machine_types
/// GET /machine-types/{id}   -> get_machine_type
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stations", get(groups::list_stations))
        .route("/stations/{id}", get(groups::get_station))
        .route("/machine-types", get(groups::list_machine_types))
        .route("/machine-types/{id}", get(groups::get_machine_type))
}
