//! # Durable Key-Value Storage
//!
//! String-keyed, string-valued storage that survives process restarts.
//! Structured values are JSON-encoded by the caller at this boundary.
//!
//! ## Backends
//!
//! - `memory.rs`: `MemoryStore`, shared in-process map (tests, ephemeral runs)
//! - `sqlite.rs`: `SqliteStore`, a single `kv_store` table via sqlx
//! - `schema.rs`: schema versioning for the SQLite backend
//!
//! Both the pending action queue and the cache live in one store; the cache
//! namespaces its keys with a prefix so the two never collide.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::shared::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Asynchronous durable key-value storage
///
/// Every failure is reported as `SyncError::DurabilityFailure`.
#[async_trait]
pub trait KeyValueStore: Debug + Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`; deleting an absent key succeeds
    async fn remove(&self, key: &str) -> Result<()>;

    /// Every key currently stored
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Delete several keys at once
    async fn remove_many(&self, keys: &[String]) -> Result<()>;
}
