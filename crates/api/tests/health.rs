//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, build_test_app, build_test_app_with, get, wait_for, MockTransport};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with expected JSON fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_when_transport_connected() {
    let app = build_test_app();
    assert!(wait_for(|| app.telemetry.is_connected()).await);

    let response = get(app.router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["transport_connected"], true);
    assert_eq!(json["tracked_devices"], 0);
    assert_eq!(json["dashboard_clients"], 0);
}

// ---------------------------------------------------------------------------
// Test: a transport that cannot connect reports degraded, still 200
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_reports_degraded_without_transport() {
    let transport = MockTransport::default();
    transport.set_fail_connect(true);
    let app = build_test_app_with(transport);

    let response = get(app.router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["transport_connected"], false);
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app();
    let response = get(app.router, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = build_test_app();
    let response = get(app.router, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    let id_str = request_id.to_str().expect("ascii header");
    assert_eq!(id_str.len(), 36, "x-request-id should be a UUID string");
}

// ---------------------------------------------------------------------------
// Test: CORS preflight OPTIONS request returns correct headers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cors_preflight_returns_correct_headers() {
    let app = build_test_app();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/devices")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "PUT")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .expect("valid request");

    let response = app.router.oneshot(request).await.expect("infallible service");
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    let allow_origin = headers
        .get("access-control-allow-origin")
        .expect("Missing Access-Control-Allow-Origin header")
        .to_str()
        .expect("ascii header");
    assert_eq!(allow_origin, "http://localhost:5173");

    let allow_methods = headers
        .get("access-control-allow-methods")
        .expect("Missing Access-Control-Allow-Methods header")
        .to_str()
        .expect("ascii header");
    assert!(
        allow_methods.contains("PUT"),
        "Allow-Methods should contain PUT, got: {allow_methods}"
    );
}
