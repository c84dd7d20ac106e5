//! Credential store layer
//!
//! The authentication core only sees [`CredentialStore`]; Postgres and the
//! in-process map are interchangeable adapters.

pub mod memory;
pub mod user_repo;

pub use memory::InMemoryUserRepository;
pub use user_repo::PgUserRepository;

use crate::{
    error::AppError,
    models::user::{NewUser, Role, User},
};
use async_trait::async_trait;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Insert a user; a taken username is `AppError::Conflict`
    async fn create(&self, user: NewUser) -> Result<User, AppError>;

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError>;

    /// Returns `false` when no such user exists
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, AppError>;

    /// Returns `false` when no such user exists
    async fn update_role(&self, id: i64, role: Role) -> Result<bool, AppError>;

    /// Returns `false` when no such user exists
    async fn delete(&self, id: i64) -> Result<bool, AppError>;

    /// Readiness probe
    async fn ping(&self) -> Result<(), AppError>;
}
