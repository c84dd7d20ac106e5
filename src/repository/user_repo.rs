//! User repository (数据库访问层)

use super::CredentialStore;
use crate::{
    error::AppError,
    models::user::{NewUser, Role, User},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// 默认单条查询超时
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at, updated_at";

/// 数据库行（role 以文本存储）
#[derive(Debug, sqlx::FromRow)]
struct UserRecord {
    id: i64,
    username: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = AppError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        let role = record.role.parse::<Role>().map_err(|_| {
            AppError::Internal(format!(
                "user {} has unknown role '{}' in storage",
                record.id, record.role
            ))
        })?;

        Ok(User {
            id: record.id,
            username: record.username,
            password_hash: record.password_hash,
            role,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

pub struct PgUserRepository {
    db: PgPool,
    query_timeout: Duration,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// 为单条查询加上截止时间，卡住的连接按基础设施故障处理
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(AppError::Database),
            Err(_) => {
                tracing::warn!(
                    op,
                    timeout_ms = self.query_timeout.as_millis() as u64,
                    "Credential store query timed out"
                );
                Err(AppError::Timeout(format!("credential store {} timed out", op)))
            }
        }
    }
}

#[async_trait]
impl CredentialStore for PgUserRepository {
    /// 根据用户名查找用户
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let query = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(username)
            .fetch_optional(&self.db);
        let record = self.bounded("find_by_username", query).await?;

        record.map(User::try_from).transpose()
    }

    /// 根据 ID 查找用户
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let query = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.db);
        let record = self.bounded("find_by_id", query).await?;

        record.map(User::try_from).transpose()
    }

    /// 创建用户
    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            r#"
            INSERT INTO users (username, password_hash, role)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let query = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.db);
        let record = self.bounded("create", query).await.map_err(|e| match e {
            AppError::Database(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                AppError::Conflict(format!("username '{}' already exists", user.username))
            }
            other => other,
        })?;

        User::try_from(record)
    }

    /// 分页列出用户
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY id LIMIT $1 OFFSET $2",
            USER_COLUMNS
        );
        let query = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db);
        let records = self.bounded("list", query).await?;

        records.into_iter().map(User::try_from).collect()
    }

    /// 更新密码
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, AppError> {
        let query = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db);
        let result = self.bounded("update_password", query).await?;

        Ok(result.rows_affected() > 0)
    }

    /// 更新角色
    async fn update_role(&self, id: i64, role: Role) -> Result<bool, AppError> {
        let query = sqlx::query(
            r#"
            UPDATE users
            SET role = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(role.as_str())
        .execute(&self.db);
        let result = self.bounded("update_role", query).await?;

        Ok(result.rows_affected() > 0)
    }

    /// 删除用户
    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let query = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db);
        let result = self.bounded("delete", query).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.bounded("ping", sqlx::query("SELECT 1").execute(&self.db))
            .await
            .map(|_| ())
    }
}
