//! User store trait and in-memory implementation
//!
//! Registration uniqueness must hold under concurrent requests, so the
//! trait contract is a single atomic unique-insert: `insert_user` either
//! persists the record or reports `Conflict`, never a separate
//! check-then-insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{BridgeError, Result};

/// A registered user, owned exclusively by the store.
///
/// Created by registration, `last_login` touched by login; identity fields
/// and the stored token never change after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Opaque server-generated id (32 hex chars)
    pub id: String,
    /// Unique, case-sensitive
    pub username: String,
    /// Argon2id PHC string
    pub password_hash: String,
    /// Serialized identity token, issued once at registration
    pub identity_token: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Audit-log entry for an issued session credential.
///
/// Only the session id is persisted, never the signed token itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Aggregate figures for the admin stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_users: u64,
    /// Distinct calendar days with at least one signup
    pub active_days: u64,
    pub latest_signup: Option<DateTime<Utc>>,
}

/// Persistent mapping from username to user record, plus the session-id
/// audit log.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Atomically insert a new user; `Conflict` when the username is taken.
    async fn insert_user(&self, user: UserRecord) -> Result<()>;

    /// Exact, case-sensitive username lookup.
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>>;

    /// Record a successful login time.
    async fn touch_last_login(&self, id: &str, when: DateTime<Utc>) -> Result<()>;

    /// Append a session id to the audit log.
    async fn record_session(&self, session: SessionRecord) -> Result<()>;

    /// Number of sessions ever issued for a user.
    async fn session_count(&self, user_id: &str) -> Result<u64>;

    async fn stats(&self) -> Result<StoreStats>;

    /// Human-readable backend name for health reporting.
    fn backend(&self) -> &'static str;
}

/// In-memory store for dev mode and tests.
pub struct MemoryUserStore {
    /// username -> record
    users: DashMap<String, UserRecord>,
    /// user id -> username
    id_index: DashMap<String, String>,
    /// user id -> issued session records
    sessions: DashMap<String, Vec<SessionRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            id_index: DashMap::new(),
            sessions: DashMap::new(),
        }
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert_user(&self, user: UserRecord) -> Result<()> {
        // The entry guard holds the shard lock, making check + insert atomic
        // for this username.
        match self.users.entry(user.username.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(BridgeError::Conflict(
                "Username already exists".to_string(),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                self.id_index.insert(user.id.clone(), user.username.clone());
                slot.insert(user);
                Ok(())
            }
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.get(username).map(|r| r.clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let Some(username) = self.id_index.get(id).map(|r| r.clone()) else {
            return Ok(None);
        };
        Ok(self.users.get(&username).map(|r| r.clone()))
    }

    async fn touch_last_login(&self, id: &str, when: DateTime<Utc>) -> Result<()> {
        let Some(username) = self.id_index.get(id).map(|r| r.clone()) else {
            return Err(BridgeError::Database(format!("no such user: {id}")));
        };
        if let Some(mut user) = self.users.get_mut(&username) {
            user.last_login = Some(when);
        }
        Ok(())
    }

    async fn record_session(&self, session: SessionRecord) -> Result<()> {
        self.sessions
            .entry(session.user_id.clone())
            .or_default()
            .push(session);
        Ok(())
    }

    async fn session_count(&self, user_id: &str) -> Result<u64> {
        Ok(self
            .sessions
            .get(user_id)
            .map(|v| v.len() as u64)
            .unwrap_or(0))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let mut days: BTreeSet<String> = BTreeSet::new();
        let mut latest: Option<DateTime<Utc>> = None;

        for user in self.users.iter() {
            days.insert(user.created_at.format("%Y-%m-%d").to_string());
            if latest.map(|l| user.created_at > l).unwrap_or(true) {
                latest = Some(user.created_at);
            }
        }

        Ok(StoreStats {
            total_users: self.users.len() as u64,
            active_days: days.len() as u64,
            latest_signup: latest,
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(id: &str, username: &str) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            username: username.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            identity_token: "{}".to_string(),
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[tokio::test]
    async fn insert_then_lookup_by_both_keys() {
        let store = MemoryUserStore::new();
        store.insert_user(sample_user("id-1", "alice")).await.unwrap();

        let by_name = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, "id-1");

        let by_id = store.find_by_id("id-1").await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");
    }

    #[tokio::test]
    async fn username_lookup_is_case_sensitive() {
        let store = MemoryUserStore::new();
        store.insert_user(sample_user("id-1", "alice")).await.unwrap();

        assert!(store.find_by_username("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts_and_leaves_first_intact() {
        let store = MemoryUserStore::new();
        store.insert_user(sample_user("id-1", "alice")).await.unwrap();

        let err = store
            .insert_user(sample_user("id-2", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Conflict(_)));

        // First registration unaffected
        let kept = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(kept.id, "id-1");
        assert!(store.find_by_id("id-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn touch_last_login_updates_record() {
        let store = MemoryUserStore::new();
        store.insert_user(sample_user("id-1", "alice")).await.unwrap();

        let when = Utc::now();
        store.touch_last_login("id-1", when).await.unwrap();

        let user = store.find_by_id("id-1").await.unwrap().unwrap();
        assert_eq!(user.last_login, Some(when));
    }

    #[tokio::test]
    async fn session_audit_log_counts_per_user() {
        let store = MemoryUserStore::new();
        store.insert_user(sample_user("id-1", "alice")).await.unwrap();

        for n in 0..3 {
            store
                .record_session(SessionRecord {
                    id: format!("sess-{n}"),
                    user_id: "id-1".to_string(),
                    created_at: Utc::now(),
                    expires_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.session_count("id-1").await.unwrap(), 3);
        assert_eq!(store.session_count("id-2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stats_reflect_signups() {
        let store = MemoryUserStore::new();
        assert_eq!(store.stats().await.unwrap().total_users, 0);

        store.insert_user(sample_user("id-1", "alice")).await.unwrap();
        store.insert_user(sample_user("id-2", "bob")).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.active_days, 1);
        assert!(stats.latest_signup.is_some());
    }
}
