//! 健康检查 API 集成测试

use axum::http::{Method, StatusCode};

mod common;
use common::TestApp;

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new(3600).await;

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_readiness_reports_both_stores() {
    let app = TestApp::new(3600).await;

    let (status, body) = app.send(Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);

    let names: Vec<&str> = body["checks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["credential_store", "memory"]);
}

#[tokio::test]
async fn test_responses_carry_trace_headers() {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    let app = TestApp::new(3600).await;
    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-trace-id", "trace-abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-trace-id"], "trace-abc");
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new(3600).await;
    let (status, _) = app.send(Method::GET, "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
