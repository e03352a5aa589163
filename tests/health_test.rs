mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp};

#[tokio::test]
async fn liveness_and_readiness_respond() {
    let app = TestApp::new().await;

    let live = app.get("/health").await;
    assert_eq!(live.status(), StatusCode::OK);

    let ready = app.get("/health/ready").await;
    assert_eq!(ready.status(), StatusCode::OK);
}

#[tokio::test]
async fn api_status_reports_the_service() {
    let app = TestApp::new().await;
    let response = app.get("/api/v2/status").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "dealership-api");
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let app = TestApp::new().await;
    let response = app.get("/api/v2/warehouses").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
