//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get, Behaviour, MockBackend, MOCK_ENDPOINT};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with expected JSON fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(MockBackend::new(Behaviour::Pending), dir.path());
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["backend"], MOCK_ENDPOINT);
    assert_eq!(json["backend_healthy"], true);
}

// ---------------------------------------------------------------------------
// Test: an unreachable backend degrades health but still answers 200
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_reports_degraded_backend() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(MockBackend::unhealthy(), dir.path());
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["backend_healthy"], false);
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(MockBackend::new(Behaviour::Pending), dir.path());
    let response = get(app, "/api/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: task routes only accept POST
// ---------------------------------------------------------------------------

#[tokio::test]
async fn task_route_rejects_get() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(MockBackend::new(Behaviour::Pending), dir.path());
    let response = get(app, "/api/text_gen").await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(MockBackend::new(Behaviour::Pending), dir.path());
    let response = get(app, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");

    // The value should be a valid UUID (36 chars with hyphens).
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

// ---------------------------------------------------------------------------
// Test: CORS preflight OPTIONS request returns correct headers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cors_preflight_returns_correct_headers() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(MockBackend::new(Behaviour::Pending), dir.path());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/text_gen")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(
        headers["access-control-allow-origin"].to_str().unwrap(),
        "http://localhost:5173"
    );
    let allow_methods = headers["access-control-allow-methods"].to_str().unwrap();
    assert!(
        allow_methods.contains("POST"),
        "Allow-Methods should contain POST, got: {allow_methods}"
    );
}
