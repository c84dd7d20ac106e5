//! In-process session store
//!
//! Suitable for single-node deployments and tests. Expired records are
//! evicted lazily on read and in bulk by [`InMemorySessionStore::purge_expired`].

use super::{SessionError, SessionStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct SessionEntry {
    subject_id: i64,
    expires_at: Instant,
}

impl SessionEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<String, SessionEntry>>,
    by_subject: Arc<DashMap<i64, HashSet<String>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, expired or not
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every expired record, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in expired {
            if let Some((key, entry)) = self.sessions.remove_if(&key, |_, e| e.is_expired(now)) {
                self.unindex(entry.subject_id, &key);
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(removed, "Purged expired sessions");
        }

        removed
    }

    fn unindex(&self, subject_id: i64, key: &str) {
        let now_empty = match self.by_subject.get_mut(&subject_id) {
            Some(mut keys) => {
                keys.remove(key);
                keys.is_empty()
            }
            None => false,
        };

        if now_empty {
            self.by_subject.remove_if(&subject_id, |_, keys| keys.is_empty());
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, key: &str, subject_id: i64, ttl: Duration) -> Result<(), SessionError> {
        let entry = SessionEntry {
            subject_id,
            expires_at: Instant::now() + ttl,
        };

        if let Some(previous) = self.sessions.insert(key.to_string(), entry) {
            if previous.subject_id != subject_id {
                self.unindex(previous.subject_id, key);
            }
        }

        self.by_subject
            .entry(subject_id)
            .or_default()
            .insert(key.to_string());

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, SessionError> {
        let now = Instant::now();

        let live = match self.sessions.get(key) {
            Some(entry) => !entry.is_expired(now),
            None => return Ok(false),
        };

        if !live {
            if let Some((key, entry)) = self.sessions.remove_if(key, |_, e| e.is_expired(now)) {
                self.unindex(entry.subject_id, &key);
            }
        }

        Ok(live)
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        if let Some((key, entry)) = self.sessions.remove(key) {
            self.unindex(entry.subject_id, &key);
        }
        Ok(())
    }

    async fn delete_subject(&self, subject_id: i64) -> Result<u64, SessionError> {
        let now = Instant::now();
        let keys = match self.by_subject.remove(&subject_id) {
            Some((_, keys)) => keys,
            None => return Ok(0),
        };

        let mut revoked = 0;
        for key in keys {
            if let Some((_, entry)) = self.sessions.remove(&key) {
                if !entry.is_expired(now) {
                    revoked += 1;
                }
            }
        }

        Ok(revoked)
    }

    async fn ping(&self) -> Result<(), SessionError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
