//! 认证相关的 HTTP 处理器

use crate::{
    auth::middleware::{extract_token, AuthContext},
    error::AppError,
    middleware::AppState,
    models::auth::LoginRequest,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    req.validate()?;

    let response = state.auth_service.login(&req.username, &req.password).await?;

    Ok(Json(response))
}

/// 登出
///
/// 只要求格式正确的 Bearer 头；令牌本身是否有效不影响结果。
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = extract_token(&headers)?;

    state.auth_service.logout(&token).await?;

    Ok(Json(json!({"message": "logged out"})))
}

/// 获取当前身份
pub async fn me(auth_context: AuthContext) -> Result<impl IntoResponse, AppError> {
    Ok(Json(json!({
        "id": auth_context.user_id,
        "role": auth_context.role,
        "expires_at": auth_context.token_expires_at,
    })))
}
