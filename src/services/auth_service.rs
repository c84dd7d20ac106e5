//! 认证服务：登录、登出、撤销会话

use crate::{
    auth::{jwt::JwtService, password::PasswordHasher},
    error::{AppError, CredentialFailure},
    models::auth::LoginResponse,
    repository::CredentialStore,
    session::{session_key, SessionStore},
};
use std::sync::Arc;
use std::time::Duration;

/// 用于未知用户的占位校验，使两种失败的耗时一致
const TIMING_PLACEHOLDER_PASSWORD: &str = "timing-placeholder-password";

pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    jwt_service: Arc<JwtService>,
    hasher: Arc<PasswordHasher>,
    token_ttl: Duration,
    key_prefix: String,
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        jwt_service: Arc<JwtService>,
        hasher: Arc<PasswordHasher>,
        token_ttl: Duration,
        key_prefix: impl Into<String>,
    ) -> Result<Self, AppError> {
        let dummy_hash = hasher.hash(TIMING_PLACEHOLDER_PASSWORD)?;

        Ok(Self {
            credentials,
            sessions,
            jwt_service,
            hasher,
            token_ttl,
            key_prefix: key_prefix.into(),
            dummy_hash,
        })
    }

    /// 用户登录
    ///
    /// 签发令牌后登记会话；会话登记失败时令牌不会返回给调用方。
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AppError> {
        let user = match self.credentials.find_by_username(username).await? {
            Some(user) => user,
            None => {
                // 仍然做一次完整的哈希校验
                let _ = self.hasher.verify(password, &self.dummy_hash);
                return Err(self.login_failed(username, CredentialFailure::UnknownUser));
            }
        };

        if !self.hasher.verify(password, &user.password_hash) {
            return Err(self.login_failed(username, CredentialFailure::WrongPassword));
        }

        let token = self.jwt_service.issue(user.id, user.role, self.token_ttl)?;

        let key = session_key(&self.key_prefix, &token);
        self.sessions.put(&key, user.id, self.token_ttl).await?;

        metrics::counter!("auth_login_total", "outcome" => "success").increment(1);
        tracing::info!(user_id = user.id, role = %user.role, "User logged in");

        Ok(LoginResponse {
            token,
            token_type: "Bearer",
            expires_in: self.token_ttl.as_secs(),
        })
    }

    /// 登出（删除会话）
    ///
    /// 不校验签名：未签发或已失效的令牌同样视为成功。
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        let key = session_key(&self.key_prefix, token);
        self.sessions.delete(&key).await?;

        metrics::counter!("auth_logout_total").increment(1);
        tracing::debug!("Session removed");
        Ok(())
    }

    /// 撤销某个用户的全部会话
    pub async fn revoke_subject(&self, user_id: i64) -> Result<u64, AppError> {
        let revoked = self.sessions.delete_subject(user_id).await?;

        tracing::info!(user_id, revoked, "Revoked all sessions of user");
        Ok(revoked)
    }

    fn login_failed(&self, username: &str, reason: CredentialFailure) -> AppError {
        metrics::counter!("auth_login_total", "outcome" => "failure").increment(1);
        tracing::info!(username = %username, %reason, "Login failed");
        AppError::InvalidCredentials(reason)
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("token_ttl", &self.token_ttl)
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}
