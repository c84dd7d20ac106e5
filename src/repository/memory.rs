//! In-process credential store for tests and local runs

use super::CredentialStore;
use crate::{
    error::AppError,
    models::user::{NewUser, Role, User},
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    next_id: i64,
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    inner: RwLock<Inner>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let mut inner = self.inner.write().await;

        if inner.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(format!(
                "username '{}' already exists",
                user.username
            )));
        }

        inner.next_id += 1;
        let now = Utc::now();
        let created = User {
            id: inner.next_id,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        Ok(match inner.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn update_role(&self, id: i64, role: Role) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        Ok(match inner.users.get_mut(&id) {
            Some(user) => {
                user.role = role;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.inner.write().await.users.remove(&id).is_some())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let repo = InMemoryUserRepository::new();
        let a = repo.create(new_user("admin01", Role::Admin)).await.unwrap();
        let b = repo.create(new_user("user01", Role::User)).await.unwrap();

        assert!(b.id > a.id);
        assert_eq!(repo.find_by_username("user01").await.unwrap().unwrap().id, b.id);
        assert_eq!(repo.find_by_id(a.id).await.unwrap().unwrap().role, Role::Admin);
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let repo = InMemoryUserRepository::new();
        repo.create(new_user("user01", Role::User)).await.unwrap();

        let err = repo.create(new_user("user01", Role::Admin)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_updates_and_delete_report_missing_users() {
        let repo = InMemoryUserRepository::new();
        assert!(!repo.update_password(99, "x").await.unwrap());
        assert!(!repo.update_role(99, Role::Admin).await.unwrap());
        assert!(!repo.delete(99).await.unwrap());

        let user = repo.create(new_user("user02", Role::User)).await.unwrap();
        assert!(repo.update_role(user.id, Role::Admin).await.unwrap());
        assert_eq!(repo.find_by_id(user.id).await.unwrap().unwrap().role, Role::Admin);
        assert!(repo.delete(user.id).await.unwrap());
        assert!(repo.find_by_id(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_paginates_in_id_order() {
        let repo = InMemoryUserRepository::new();
        for name in ["a01", "b01", "c01"] {
            repo.create(new_user(name, Role::User)).await.unwrap();
        }

        let page = repo.list(2, 1).await.unwrap();
        let names: Vec<_> = page.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["b01", "c01"]);
    }
}
