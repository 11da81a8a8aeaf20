//! Shared helpers for API integration tests.
//!
//! The app is built through [`build_app_router`] so tests run the same
//! middleware stack as production, with an in-memory transport standing in
//! for the telemetry WebSocket.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use weldwatch_api::config::ServerConfig;
use weldwatch_api::router::build_app_router;
use weldwatch_api::state::AppState;
use weldwatch_api::ws::DashboardHub;
use weldwatch_live::testing;
use weldwatch_live::{LiveConfig, LiveTelemetry};

pub use weldwatch_live::testing::{wait_for, MockTransport};

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: [127, 0, 0, 1].into(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// Live telemetry timings short enough for timeout paths to run quickly.
pub fn live_config() -> LiveConfig {
    LiveConfig {
        subscribe_timeout: Duration::from_millis(200),
        ..testing::test_config()
    }
}

/// Everything a test needs to drive the API and the transport behind it.
pub struct TestApp {
    pub router: Router,
    pub transport: MockTransport,
    pub telemetry: Arc<LiveTelemetry>,
    pub dashboards: Arc<DashboardHub>,
}

/// Build the full application router backed by a fresh mock transport.
pub fn build_test_app() -> TestApp {
    build_test_app_with(MockTransport::default())
}

pub fn build_test_app_with(transport: MockTransport) -> TestApp {
    let config = test_config();
    let telemetry = LiveTelemetry::start(Arc::new(transport.clone()), live_config());
    let dashboards = Arc::new(DashboardHub::new());

    let state = AppState {
        config: Arc::new(config.clone()),
        telemetry: Arc::clone(&telemetry),
        dashboards: Arc::clone(&dashboards),
    };
    let router = build_app_router(state, &config).expect("test config builds a router");

    TestApp {
        router,
        transport,
        telemetry,
        dashboards,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");
    app.oneshot(request).await.expect("infallible service")
}

pub async fn send_json(app: Router, method: Method, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request");
    app.oneshot(request).await.expect("infallible service")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("readable body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}

/// Serve `app` on an ephemeral localhost port for tests that need a real
/// socket (WebSocket upgrades).
pub async fn serve(app: Router) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    addr
}
