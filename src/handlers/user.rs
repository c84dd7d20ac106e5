//! 用户管理的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::user::*,
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

fn user_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    path.map(|Path(id)| id)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

/// 列出用户
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let users = state.user_service.list(query).await?;

    let user_responses: Vec<UserResponse> = users.into_iter().map(|u| u.into()).collect();

    Ok(Json(json!({
        "users": user_responses,
        "count": user_responses.len()
    })))
}

/// 创建用户
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = json_body(payload)?;
    let user = state.user_service.create(req).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// 获取用户详情
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.user_service.get(user_id(path)?).await?;

    Ok(Json(UserResponse::from(user)))
}

/// 更新用户（密码和/或角色）
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = user_id(path)?;
    let req = json_body(payload)?;
    let user = state.user_service.update(id, req).await?;

    Ok(Json(UserResponse::from(user)))
}

/// 删除用户
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    path: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    state
        .user_service
        .delete(user_id(path)?, auth_context.user_id)
        .await?;

    Ok(Json(json!({"message": "user deleted"})))
}

/// 修改自己的密码
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = json_body(payload)?;
    state
        .user_service
        .change_own_password(auth_context.user_id, req)
        .await?;

    Ok(Json(json!({"message": "password changed, please log in again"})))
}
