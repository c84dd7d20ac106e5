//! 错误处理测试
//!
//! 测试错误响应格式和客户端可见消息

use auth_server::{
    auth::TokenError,
    error::{AppError, CredentialFailure},
    session::SessionError,
};
use axum::{http::StatusCode, response::IntoResponse};
use http_body_util::BodyExt;

async fn body_json(error: AppError) -> (StatusCode, serde_json::Value) {
    let response = error.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ==================== 错误状态码测试 ====================

#[test]
fn test_error_status_codes() {
    assert_eq!(
        AppError::InvalidCredentials(CredentialFailure::UnknownUser).status_code(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(AppError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        AppError::InvalidToken(TokenError::Malformed).status_code(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(AppError::SessionAbsent.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::Validation("error".to_string()).status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        AppError::SessionStore(SessionError::Timeout).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        AppError::Database(sqlx::Error::RowNotFound).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

// ==================== 响应体测试 ====================

#[tokio::test]
async fn test_error_response_shape() {
    let (status, body) = body_json(AppError::SessionAbsent).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], 401);
    assert_eq!(body["error"]["message"], "token expired or logged out");
    assert!(body["error"]["request_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_token_failure_detail_not_exposed() {
    for reason in [
        TokenError::Malformed,
        TokenError::BadSignature,
        TokenError::UnsupportedAlgorithm,
        TokenError::Expired,
    ] {
        let (_, body) = body_json(AppError::InvalidToken(reason)).await;
        assert_eq!(body["error"]["message"], "invalid token");
    }
}

#[tokio::test]
async fn test_infrastructure_detail_not_exposed() {
    let (status, body) = body_json(AppError::SessionStore(SessionError::Unavailable(
        "redis 10.0.0.7:6379 connection refused".to_string(),
    )))
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"]["message"].as_str().unwrap();
    assert!(!message.contains("10.0.0.7"));
    assert!(!message.contains("redis"));
}

#[test]
fn test_validation_errors_convert() {
    use validator::Validate;

    let req = auth_server::models::auth::LoginRequest {
        username: String::new(),
        password: "x".to_string(),
    };
    let err: AppError = req.validate().unwrap_err().into();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
}
