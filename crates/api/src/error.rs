use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use weldwatch_core::error::CoreError;
use weldwatch_live::LiveError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`LiveError`] and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Live(#[from] LiveError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => classify_core_error(core),

            // --- LiveError variants ---
            AppError::Live(live) => match live {
                LiveError::InvalidConfig(core) => classify_core_error(core),
                LiveError::UnknownDevice(id) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("device with id {id} not found"),
                ),
                LiveError::SubscriptionTimeout { .. } => (
                    StatusCode::GATEWAY_TIMEOUT,
                    "SUBSCRIPTION_TIMEOUT",
                    live.to_string(),
                ),
                LiveError::Closed => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "UNAVAILABLE",
                    live.to_string(),
                ),
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
