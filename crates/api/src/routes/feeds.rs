use axum::routing::put;
use axum::Router;

use crate::handlers::feeds;
use crate::state::AppState;

/// Backend-pushed reference data.
///
/// ```text
/// PUT /topology             -> replace_topology
/// PUT /historical-metrics   -> replace_historical_metrics
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/topology", put(feeds::replace_topology))
        .route("/historical-metrics", put(feeds::replace_historical_metrics))
}
