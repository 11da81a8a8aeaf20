pub mod devices;
pub mod feeds;
pub mod groups;
pub mod health;
pub mod subscriptions;

use axum::routing::get;
use axum::Router;

use crate::handlers::status;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                  live push WebSocket
///
/// /subscriptions                       list, subscribe, unsubscribe (GET, POST, DELETE)
///
/// /devices                             list live records (GET)
/// /devices/{id}                        get live record (GET)
/// /devices/{id}/thresholds             replace thresholds (PUT)
///
/// /stations                            list station rollups (GET)
/// /stations/{id}                       get station rollup (GET)
/// /machine-types                       list machine-type rollups (GET)
/// /machine-types/{id}                  get machine-type rollup (GET)
///
/// /topology                            replace topology (PUT)
/// /historical-metrics                  replace historical metrics (PUT)
///
/// /connection                          transport connection status (GET)
/// /counters                            ingestion counters (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(subscriptions::router())
        .merge(devices::router())
        .merge(groups::router())
        .merge(feeds::router())
        .route("/connection", get(status::get_connection))
        .route("/counters", get(status::get_counters))
}
