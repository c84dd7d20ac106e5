//! 请求鉴权中间件
//!
//! 认证（`jwt_auth_middleware`）与授权（`require_roles`）是两个独立的阶段：
//! 前者校验 Bearer 令牌并确认会话仍然存在，后者只比较已附加的角色。

use crate::{
    auth::jwt::JwtService,
    error::AppError,
    models::user::Role,
    session::{session_key, SessionStore},
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: i64,
    pub role: Role,
    pub token_expires_at: DateTime<Utc>,
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::MissingToken)
    }
}

/// 从 Authorization 头提取 Bearer 令牌
pub fn extract_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or(AppError::MissingToken)
}

/// 认证闸门：令牌签名校验 + 会话存活检查
pub struct AuthGate {
    signer: Arc<JwtService>,
    sessions: Arc<dyn SessionStore>,
    key_prefix: String,
}

impl AuthGate {
    pub fn new(signer: Arc<JwtService>, sessions: Arc<dyn SessionStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            signer,
            sessions,
            key_prefix: key_prefix.into(),
        }
    }

    /// 从请求头完成认证
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AppError> {
        let token = extract_token(headers).map_err(|e| {
            reject("missing_token");
            e
        })?;
        self.authenticate_token(&token).await
    }

    /// 校验一个已提取的令牌
    ///
    /// 签名与过期检查在会话检查之前，伪造的令牌不会触达会话存储。
    pub async fn authenticate_token(&self, token: &str) -> Result<AuthContext, AppError> {
        let verified = self.signer.verify(token).map_err(|reason| {
            reject("invalid_token");
            AppError::InvalidToken(reason)
        })?;

        let key = session_key(&self.key_prefix, token);
        if !self.sessions.exists(&key).await? {
            reject("session_absent");
            tracing::debug!(user_id = verified.subject_id, "Session absent for a signed token");
            return Err(AppError::SessionAbsent);
        }

        Ok(AuthContext {
            user_id: verified.subject_id,
            role: verified.role,
            token_expires_at: verified.expires_at,
        })
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("key_prefix", &self.key_prefix)
            .field("session_backend", &self.sessions.backend_name())
            .finish()
    }
}

fn reject(reason: &'static str) {
    metrics::counter!("auth_gate_rejections_total", "reason" => reason).increment(1);
}

/// JWT 认证中间件 - 必须认证
pub async fn jwt_auth_middleware(
    State(gate): State<Arc<AuthGate>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_context = gate.authenticate(req.headers()).await?;

    tracing::debug!(
        user_id = auth_context.user_id,
        role = %auth_context.role,
        "Request authenticated"
    );

    // 附加到请求扩展
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// 路由要求的角色集合
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredRoles(pub &'static [Role]);

impl RequiredRoles {
    pub const ADMIN: Self = Self(&[Role::Admin]);
    pub const ANY: Self = Self(&[Role::Admin, Role::User]);

    pub fn allows(&self, role: Role) -> bool {
        self.0.contains(&role)
    }
}

/// 角色授权中间件，必须挂在 `jwt_auth_middleware` 之后
pub async fn require_roles(
    State(required): State<RequiredRoles>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 缺少上下文说明路由没有挂认证中间件
    let role = req
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.role)
        .ok_or(AppError::MissingToken)?;

    if !required.allows(role) {
        reject("forbidden");
        tracing::info!(role = %role, "Role not permitted on this route");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(req).await)
}
