//! HTTP 中间件与应用状态
//! 请求追踪、服务装配

use crate::{
    auth::{jwt::JwtService, middleware::AuthGate, password::PasswordHasher},
    config::AppConfig,
    error::AppError,
    repository::CredentialStore,
    services::{AuthService, UserService},
    session::SessionStore,
};
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
///
/// 存储通过 trait 对象注入，服务只持有不可变状态。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub credentials: Arc<dyn CredentialStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub gate: Arc<AuthGate>,
}

impl AppState {
    /// 根据配置和两个存储装配全部服务
    pub fn build(
        config: AppConfig,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, AppError> {
        let jwt_service = Arc::new(JwtService::from_config(&config.security)?);
        let hasher = Arc::new(PasswordHasher::from_config(&config.security)?);
        let key_prefix = config.session.key_prefix.clone();

        let auth_service = Arc::new(AuthService::new(
            credentials.clone(),
            sessions.clone(),
            jwt_service.clone(),
            hasher.clone(),
            Duration::from_secs(config.security.token_exp_secs),
            key_prefix.clone(),
        )?);

        let user_service = Arc::new(UserService::new(
            credentials.clone(),
            hasher,
            auth_service.clone(),
            config.security.clone(),
        ));

        let gate = Arc::new(AuthGate::new(jwt_service, sessions.clone(), key_prefix));

        Ok(Self {
            config,
            credentials,
            sessions,
            auth_service,
            user_service,
            gate,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    // 生成或提取 trace_id/request_id
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let uri = req.uri().path().to_string();

    // 创建 span
    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // 指标标签只使用静态字符串
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            _ => "OTHER",
        };
        let status_code = match status {
            200 => "200",
            201 => "201",
            400 => "400",
            401 => "401",
            403 => "403",
            404 => "404",
            409 => "409",
            500 => "500",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_code)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        // 在响应头中添加 trace_id
        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_or_generate_trace_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace-id", "test-trace-123".parse().unwrap());

        let trace_id = extract_or_generate_trace_id(&headers);
        assert_eq!(trace_id, "test-trace-123");

        let headers = HeaderMap::new();
        let trace_id = extract_or_generate_trace_id(&headers);
        assert!(!trace_id.is_empty());
        assert_ne!(trace_id, "test-trace-123");
    }

    #[test]
    fn test_oversized_trace_id_is_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace-id", "x".repeat(500).parse().unwrap());

        assert_eq!(extract_or_generate_trace_id(&headers).len(), 36);
    }
}
