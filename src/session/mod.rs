//! Session store: a TTL-capable liveness registry for issued tokens
//!
//! A token authenticates only while its session record exists, so deleting
//! the record revokes the token before its cryptographic expiry. Records are
//! keyed by a digest of the token, never the token itself, and carry the
//! subject id so every session of one subject can be revoked at once.

pub mod memory;
pub mod redis;

pub use memory::InMemorySessionStore;
pub use self::redis::RedisSessionStore;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;

/// Session store failures (infrastructure only; absence is not an error)
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("session store operation timed out")]
    Timeout,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Record `key` as live for `ttl`, remembering `subject_id`
    async fn put(&self, key: &str, subject_id: i64, ttl: Duration) -> Result<(), SessionError>;

    /// Whether `key` is currently live
    async fn exists(&self, key: &str) -> Result<bool, SessionError>;

    /// Remove `key`; removing an absent key succeeds
    async fn delete(&self, key: &str) -> Result<(), SessionError>;

    /// Remove every session of `subject_id`, returning how many were live
    async fn delete_subject(&self, subject_id: i64) -> Result<u64, SessionError>;

    /// Readiness probe
    async fn ping(&self) -> Result<(), SessionError>;

    fn backend_name(&self) -> &'static str;
}

/// Derive the session key for a token: `<prefix><hex sha256(token)>`
pub fn session_key(prefix: &str, token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{}{}", prefix, hex::encode(digest))
}

/// Secondary index key listing the sessions of one subject
pub(crate) fn subject_index_key(prefix: &str, subject_id: i64) -> String {
    format!("{}subject:{}", prefix, subject_id)
}
