//! User persistence
//!
//! The store owns user records and the session-id audit log. Production
//! deployments use MongoDB; dev mode and tests use the in-memory store.

pub mod mongo;
pub mod store;

pub use mongo::{MongoClient, MongoUserStore};
pub use store::{MemoryUserStore, SessionRecord, StoreStats, UserRecord, UserStore};
