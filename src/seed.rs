//! 默认账号初始化

use crate::{
    auth::password::PasswordHasher,
    error::AppError,
    models::user::{NewUser, Role},
    repository::CredentialStore,
};

/// 默认账号：(用户名, 密码, 角色)
pub const DEFAULT_USERS: &[(&str, &str, Role)] = &[
    ("admin01", "admin123", Role::Admin),
    ("user01", "user123", Role::User),
    ("user02", "user456", Role::User),
];

/// 写入默认账号，已存在的用户名跳过；返回新建数量
pub async fn seed_default_users(
    credentials: &dyn CredentialStore,
    hasher: &PasswordHasher,
) -> Result<usize, AppError> {
    let mut created = 0;

    for &(username, password, role) in DEFAULT_USERS {
        if credentials.find_by_username(username).await?.is_some() {
            tracing::debug!(username, "Seed user already exists, skipping");
            continue;
        }

        let user = NewUser {
            username: username.to_string(),
            password_hash: hasher.hash(password)?,
            role,
        };

        match credentials.create(user).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, username, role = %role, "Seed user created");
                created += 1;
            }
            // 另一个实例同时写入
            Err(AppError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::HashCost;
    use crate::repository::InMemoryUserRepository;

    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::new(HashCost {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_seed_creates_defaults_once() {
        let repo = InMemoryUserRepository::new();
        let hasher = fast_hasher();

        assert_eq!(seed_default_users(&repo, &hasher).await.unwrap(), 3);
        assert_eq!(seed_default_users(&repo, &hasher).await.unwrap(), 0);

        let admin = repo.find_by_username("admin01").await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(hasher.verify("admin123", &admin.password_hash));
    }

    #[tokio::test]
    async fn test_seed_skips_existing_usernames() {
        let repo = InMemoryUserRepository::new();
        let hasher = fast_hasher();
        repo.create(NewUser {
            username: "user01".to_string(),
            password_hash: hasher.hash("changed-password").unwrap(),
            role: Role::User,
        })
        .await
        .unwrap();

        assert_eq!(seed_default_users(&repo, &hasher).await.unwrap(), 2);

        // 已有账号的密码不会被覆盖
        let existing = repo.find_by_username("user01").await.unwrap().unwrap();
        assert!(hasher.verify("changed-password", &existing.password_hash));
    }
}
