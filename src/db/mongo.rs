//! MongoDB client and user store
//!
//! Uniqueness is enforced by a unique index on `username`; a duplicate-key
//! error on insert is reported as `Conflict`, closing the check-then-insert
//! race at the store layer.

use async_trait::async_trait;
use bson::{doc, DateTime as BsonDateTime};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use mongodb::{options::IndexOptions, Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{error, info};

use crate::db::store::{SessionRecord, StoreStats, UserRecord, UserStore};
use crate::types::{BridgeError, Result};

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Collection name for the session-id audit log
pub const SESSION_COLLECTION: &str = "sessions";

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify with a ping.
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // serverSelectionTimeoutMS avoids hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{uri}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        } else {
            format!("{uri}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| BridgeError::Database(format!("Failed to connect to MongoDB: {e}")))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| BridgeError::Database(format!("MongoDB ping failed: {e}")))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }
}

/// User document as stored in MongoDB
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDoc {
    id: String,
    username: String,
    password_hash: String,
    identity_token: String,
    created_at: BsonDateTime,
    last_login: Option<BsonDateTime>,
}

impl From<UserRecord> for UserDoc {
    fn from(user: UserRecord) -> Self {
        UserDoc {
            id: user.id,
            username: user.username,
            password_hash: user.password_hash,
            identity_token: user.identity_token,
            created_at: BsonDateTime::from_chrono(user.created_at),
            last_login: user.last_login.map(BsonDateTime::from_chrono),
        }
    }
}

impl From<UserDoc> for UserRecord {
    fn from(doc: UserDoc) -> Self {
        UserRecord {
            id: doc.id,
            username: doc.username,
            password_hash: doc.password_hash,
            identity_token: doc.identity_token,
            created_at: doc.created_at.to_chrono(),
            last_login: doc.last_login.map(|d| d.to_chrono()),
        }
    }
}

/// Session audit document
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionDoc {
    id: String,
    user_id: String,
    created_at: BsonDateTime,
    expires_at: BsonDateTime,
}

/// MongoDB-backed user store
pub struct MongoUserStore {
    users: Collection<UserDoc>,
    sessions: Collection<SessionDoc>,
}

impl MongoUserStore {
    /// Open the collections and apply indexes.
    pub async fn new(client: &MongoClient) -> Result<Self> {
        let db = client.client.database(&client.db_name);
        let users = db.collection::<UserDoc>(USER_COLLECTION);
        let sessions = db.collection::<SessionDoc>(SESSION_COLLECTION);

        let user_indexes = vec![
            IndexModel::builder()
                .keys(doc! { "username": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name("username_unique".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "id": 1 })
                .options(IndexOptions::builder().name("id_index".to_string()).build())
                .build(),
        ];
        users
            .create_indexes(user_indexes)
            .await
            .map_err(|e| BridgeError::Database(format!("Failed to create indexes: {e}")))?;

        let session_indexes = vec![IndexModel::builder()
            .keys(doc! { "user_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("session_user_index".to_string())
                    .build(),
            )
            .build()];
        sessions
            .create_indexes(session_indexes)
            .await
            .map_err(|e| BridgeError::Database(format!("Failed to create indexes: {e}")))?;

        Ok(Self { users, sessions })
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn insert_user(&self, user: UserRecord) -> Result<()> {
        if let Err(e) = self.users.insert_one(UserDoc::from(user)).await {
            // E11000: unique-index violation, i.e. the username is taken
            let error_str = e.to_string();
            if error_str.contains("duplicate key") || error_str.contains("E11000") {
                return Err(BridgeError::Conflict(
                    "Username already exists".to_string(),
                ));
            }
            return Err(BridgeError::Database(format!("Insert failed: {e}")));
        }
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let doc = self
            .users
            .find_one(doc! { "username": username })
            .await
            .map_err(|e| BridgeError::Database(format!("Find failed: {e}")))?;
        Ok(doc.map(UserRecord::from))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let doc = self
            .users
            .find_one(doc! { "id": id })
            .await
            .map_err(|e| BridgeError::Database(format!("Find failed: {e}")))?;
        Ok(doc.map(UserRecord::from))
    }

    async fn touch_last_login(&self, id: &str, when: DateTime<Utc>) -> Result<()> {
        self.users
            .update_one(
                doc! { "id": id },
                doc! { "$set": { "last_login": BsonDateTime::from_chrono(when) } },
            )
            .await
            .map_err(|e| BridgeError::Database(format!("Update failed: {e}")))?;
        Ok(())
    }

    async fn record_session(&self, session: SessionRecord) -> Result<()> {
        let doc = SessionDoc {
            id: session.id,
            user_id: session.user_id,
            created_at: BsonDateTime::from_chrono(session.created_at),
            expires_at: BsonDateTime::from_chrono(session.expires_at),
        };
        self.sessions
            .insert_one(doc)
            .await
            .map_err(|e| BridgeError::Database(format!("Insert failed: {e}")))?;
        Ok(())
    }

    async fn session_count(&self, user_id: &str) -> Result<u64> {
        self.sessions
            .count_documents(doc! { "user_id": user_id })
            .await
            .map_err(|e| BridgeError::Database(format!("Count failed: {e}")))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let total_users = self
            .users
            .count_documents(doc! {})
            .await
            .map_err(|e| BridgeError::Database(format!("Count failed: {e}")))?;

        // Small collections; a cursor walk keeps the day-bucketing logic in
        // one place instead of an aggregation pipeline.
        let mut cursor = self
            .users
            .find(doc! {})
            .await
            .map_err(|e| BridgeError::Database(format!("Find failed: {e}")))?;

        let mut days: BTreeSet<String> = BTreeSet::new();
        let mut latest: Option<DateTime<Utc>> = None;

        while let Some(next) = cursor.next().await {
            match next {
                Ok(doc) => {
                    let created = doc.created_at.to_chrono();
                    days.insert(created.format("%Y-%m-%d").to_string());
                    if latest.map(|l| created > l).unwrap_or(true) {
                        latest = Some(created);
                    }
                }
                Err(e) => {
                    error!("Error reading user document: {}", e);
                }
            }
        }

        Ok(StoreStats {
            total_users,
            active_days: days.len() as u64,
            latest_signup: latest,
        })
    }

    fn backend(&self) -> &'static str {
        "mongodb"
    }
}

#[cfg(test)]
mod tests {
    // Integration tests require a running MongoDB instance; the trait
    // contract is exercised against MemoryUserStore in db::store.
}
