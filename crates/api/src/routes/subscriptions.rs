use axum::routing::get;
use axum::Router;

use crate::handlers::subscriptions;
use crate::state::AppState;

/// ```text
/// GET    /subscriptions   -> list_subscriptions
/// POST   /subscriptions   -> subscribe
/// DELETE /subscriptions   -> unsubscribe
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/subscriptions",
        get(subscriptions::list_subscriptions)
            .post(subscriptions::subscribe)
            .delete(subscriptions::unsubscribe),
    )
}
