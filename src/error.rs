//! 统一错误模型
//! 定义所有错误类型和错误响应格式
//!
//! `Display` 携带服务端诊断细节，`user_message` 是返回给客户端的文本，两者分开。

use crate::{auth::jwt::TokenError, session::SessionError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 登录失败的内部原因（只记录在日志中）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFailure {
    UnknownUser,
    WrongPassword,
}

impl std::fmt::Display for CredentialFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialFailure::UnknownUser => f.write_str("unknown username"),
            CredentialFailure::WrongPassword => f.write_str("password mismatch"),
        }
    }
}

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Session store error: {0}")]
    SessionStore(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(CredentialFailure),

    #[error("Missing or malformed bearer credential")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("Session absent for a correctly signed token")]
    SessionAbsent,

    #[error("Access denied")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials(_)
            | AppError::MissingToken
            | AppError::InvalidToken(_)
            | AppError::SessionAbsent => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::SessionStore(_)
            | AppError::Database(_)
            | AppError::Config(_)
            | AppError::Timeout(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidCredentials(_) => "invalid credentials".to_string(),
            AppError::MissingToken => "missing or invalid token".to_string(),
            AppError::InvalidToken(_) => "invalid token".to_string(),
            AppError::SessionAbsent => "token expired or logged out".to_string(),
            AppError::Forbidden => "forbidden".to_string(),
            AppError::NotFound(msg) => format!("Resource not found: {}", msg),
            AppError::Conflict(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::SessionStore(_) => "Session store unavailable".to_string(),
            AppError::Database(_) => "Database error occurred".to_string(),
            AppError::Config(_) => "Configuration error".to_string(),
            AppError::Timeout(_) => "Service temporarily unavailable".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    /// 基础设施故障（凭据存储或会话存储不可用）
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AppError::SessionStore(_) | AppError::Database(_) | AppError::Timeout(_)
        )
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    pub request_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.user_message(),
                request_id,
            },
        };

        // 记录错误日志，4xx 只是客户端问题
        if status.is_server_error() {
            tracing::error!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Application error"
            );
        } else {
            tracing::info!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Request rejected"
            );
        }

        (status, Json(error_response)).into_response()
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

/// 从 validator 校验错误转换
impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::MissingToken.code(), 401);
        assert_eq!(AppError::SessionAbsent.code(), 401);
        assert_eq!(AppError::InvalidToken(TokenError::Expired).code(), 401);
        assert_eq!(AppError::Forbidden.code(), 403);
        assert_eq!(AppError::NotFound("test".to_string()).code(), 404);
        assert_eq!(AppError::Conflict("test".to_string()).code(), 409);
        assert_eq!(AppError::BadRequest("test".to_string()).code(), 400);
        assert_eq!(AppError::SessionStore(SessionError::Timeout).code(), 500);
        assert_eq!(AppError::Timeout("query".to_string()).code(), 500);
    }

    #[test]
    fn test_credential_failures_look_identical_to_clients() {
        let unknown = AppError::InvalidCredentials(CredentialFailure::UnknownUser);
        let wrong = AppError::InvalidCredentials(CredentialFailure::WrongPassword);

        assert_eq!(unknown.user_message(), wrong.user_message());
        assert_eq!(unknown.status_code(), wrong.status_code());
        // 服务端细节保留在 Display 中
        assert_ne!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn test_user_message_no_sensitive_info() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        let message = error.user_message();
        assert_eq!(message, "Database error occurred");
        assert!(!message.contains("sqlx"));

        let error = AppError::SessionStore(SessionError::Unavailable(
            "connection refused (os error 111)".to_string(),
        ));
        assert!(!error.user_message().contains("os error"));
        assert!(error.is_infrastructure());
    }
}
