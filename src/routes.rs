//! 路由注册
//! 创建所有 API 路由并应用中间件
//!
//! `route_layer` 后添加的先执行：认证中间件总是在角色检查之前运行。

use axum::{
    error_handling::HandleErrorLayer,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    BoxError, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;

use crate::{
    auth::middleware::{jwt_auth_middleware, require_roles, RequiredRoles},
    error::AppError,
    handlers,
    middleware::{request_tracking_middleware, AppState},
};

/// 请求体大小上限
const MAX_BODY_BYTES: usize = 64 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 认证路由（无需认证）
    let auth_routes = Router::new()
        .route("/api/login", post(handlers::auth::login))
        .route("/api/logout", post(handlers::auth::logout));

    // 需要认证的路由
    let authenticated_routes = Router::new()
        .route("/api/me", get(handlers::auth::me))
        .route("/api/users/me/password", put(handlers::user::change_password))
        .route(
            "/api/users",
            get(handlers::user::list_users)
                .post(handlers::user::create_user)
                .route_layer(from_fn_with_state(RequiredRoles::ADMIN, require_roles)),
        )
        .route(
            "/api/users/{id}",
            get(handlers::user::get_user)
                .route_layer(from_fn_with_state(RequiredRoles::ANY, require_roles))
                .merge(
                    put(handlers::user::update_user)
                        .delete(handlers::user::delete_user)
                        .route_layer(from_fn_with_state(RequiredRoles::ADMIN, require_roles)),
                ),
        )
        .route_layer(from_fn_with_state(state.gate.clone(), jwt_auth_middleware));

    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(authenticated_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(from_fn(request_tracking_middleware))
        .with_state(state)
}

/// 请求超过截止时间：按基础设施故障返回统一错误体
async fn handle_timeout_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Timeout("request deadline exceeded".to_string())
    } else {
        AppError::Internal(format!("unhandled middleware error: {}", err))
    }
}
