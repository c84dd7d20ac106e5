//! 用户管理服务
//!
//! 修改密码、修改角色、删除用户都会撤销该用户的全部会话，
//! 令牌中携带的旧角色因此不会继续生效。

use crate::{
    auth::password::PasswordHasher,
    config::SecurityConfig,
    error::AppError,
    models::user::{
        ChangePasswordRequest, CreateUserRequest, ListUsersQuery, NewUser, UpdateUserRequest, User,
    },
    repository::CredentialStore,
    services::AuthService,
};
use std::sync::Arc;
use validator::Validate;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

pub struct UserService {
    credentials: Arc<dyn CredentialStore>,
    hasher: Arc<PasswordHasher>,
    auth_service: Arc<AuthService>,
    security: SecurityConfig,
}

impl UserService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        hasher: Arc<PasswordHasher>,
        auth_service: Arc<AuthService>,
        security: SecurityConfig,
    ) -> Self {
        Self {
            credentials,
            hasher,
            auth_service,
            security,
        }
    }

    /// 创建用户
    pub async fn create(&self, req: CreateUserRequest) -> Result<User, AppError> {
        req.validate()?;
        PasswordHasher::validate_password_policy(&req.password, &self.security)?;

        let password_hash = self.hasher.hash(&req.password)?;
        let user = self
            .credentials
            .create(NewUser {
                username: req.username,
                password_hash,
                role: req.role,
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, role = %user.role, "User created");
        Ok(user)
    }

    /// 分页列出用户
    pub async fn list(&self, query: ListUsersQuery) -> Result<Vec<User>, AppError> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);

        self.credentials.list(limit, offset).await
    }

    pub async fn get(&self, id: i64) -> Result<User, AppError> {
        self.credentials
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", id)))
    }

    /// 更新密码和/或角色
    pub async fn update(&self, id: i64, req: UpdateUserRequest) -> Result<User, AppError> {
        if req.password.is_none() && req.role.is_none() {
            return Err(AppError::BadRequest(
                "at least one of password or role is required".to_string(),
            ));
        }

        if let Some(password) = &req.password {
            PasswordHasher::validate_password_policy(password, &self.security)?;
            let password_hash = self.hasher.hash(password)?;
            if !self.credentials.update_password(id, &password_hash).await? {
                return Err(AppError::NotFound(format!("user {}", id)));
            }
        }

        if let Some(role) = req.role {
            if !self.credentials.update_role(id, role).await? {
                return Err(AppError::NotFound(format!("user {}", id)));
            }
        }

        self.auth_service.revoke_subject(id).await?;

        tracing::info!(
            user_id = id,
            password_changed = req.password.is_some(),
            role = ?req.role,
            "User updated"
        );
        self.get(id).await
    }

    /// 删除用户（不允许删除自己）
    pub async fn delete(&self, id: i64, acting_user_id: i64) -> Result<(), AppError> {
        if id == acting_user_id {
            return Err(AppError::BadRequest("cannot delete your own account".to_string()));
        }

        if !self.credentials.delete(id).await? {
            return Err(AppError::NotFound(format!("user {}", id)));
        }

        self.auth_service.revoke_subject(id).await?;

        tracing::info!(user_id = id, deleted_by = acting_user_id, "User deleted");
        Ok(())
    }

    /// 修改自己的密码，之后所有会话（包括当前会话）失效
    pub async fn change_own_password(
        &self,
        user_id: i64,
        req: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        req.validate()?;

        let user = self.get(user_id).await?;
        if !self.hasher.verify(&req.current_password, &user.password_hash) {
            return Err(AppError::BadRequest("current password is incorrect".to_string()));
        }

        PasswordHasher::validate_password_policy(&req.new_password, &self.security)?;
        let password_hash = self.hasher.hash(&req.new_password)?;

        if !self.credentials.update_password(user_id, &password_hash).await? {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }

        self.auth_service.revoke_subject(user_id).await?;

        tracing::info!(user_id, "Password changed");
        Ok(())
    }
}
