//! # SQLite Key-Value Store
//!
//! Durable storage backed by a local SQLite database. All keys live in one
//! `kv_store` table; the queue and the cache share it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dashsync::storage::{KeyValueStore, SqliteStore};
//!
//! # async fn example() -> dashsync::shared::Result<()> {
//! let store = SqliteStore::open("/tmp/dashsync/local.db").await?;
//! store.set("cache_feed", "{}").await?;
//! # Ok(())
//! # }
//! ```

use crate::shared::{Result, SyncError};
use crate::storage::schema;
use crate::storage::KeyValueStore;
use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;

/// Local SQLite database connection manager
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create a database file
    ///
    /// Creates parent directories as needed and initializes the schema.
    /// Uses WAL mode so readers do not block the writer.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SyncError::durability(format!(
                    "cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::debug!(path = %path.display(), "opened sqlite store");
        Self::with_pool(pool).await
    }

    /// Private in-memory database, gone when the store is dropped
    pub async fn in_memory() -> Result<Self> {
        let options = "sqlite::memory:"
            .parse::<SqliteConnectOptions>()
            .map_err(SyncError::from)?;

        // Every connection would otherwise see its own empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(schema::CREATE_MIGRATIONS_TABLE)
            .execute(&self.pool)
            .await?;

        let applied = self.schema_version().await?;
        for migration in schema::pending(applied) {
            let mut tx = self.pool.begin().await?;
            sqlx::query(migration.sql).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(migration.version)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::debug!(
                version = migration.version,
                description = migration.description,
                "applied schema migration"
            );
        }

        Ok(())
    }

    /// Current schema version recorded in the database
    pub async fn schema_version(&self) -> Result<i32> {
        let version: (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;
        Ok(version.0)
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let keys = sqlx::query_scalar::<_, String>("SELECT key FROM kv_store ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }

    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for key in keys {
            sqlx::query("DELETE FROM kv_store WHERE key = ?")
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_creation() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert_eq!(store.schema_version().await.unwrap(), schema::latest_version());
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_value() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v2".to_string()));
        assert_eq!(store.list_keys().await.unwrap(), vec!["k"]);
    }

    #[tokio::test]
    async fn test_remove_many_in_one_transaction() {
        let store = SqliteStore::in_memory().await.unwrap();
        for key in ["cache_a", "cache_b", "pendingActions"] {
            store.set(key, "x").await.unwrap();
        }
        store
            .remove_many(&["cache_a".to_string(), "cache_b".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(store.list_keys().await.unwrap(), vec!["pendingActions"]);
    }

    #[tokio::test]
    async fn test_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("local.db");

        let store = SqliteStore::open(&path).await.unwrap();
        store.set("pendingActions", "[]").await.unwrap();
        store.close().await;

        let reopened = SqliteStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("pendingActions").await.unwrap(),
            Some("[]".to_string())
        );
        assert_eq!(reopened.schema_version().await.unwrap(), schema::latest_version());

        let rows: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&reopened.pool)
            .await
            .unwrap();
        assert_eq!(rows.0, schema::MIGRATIONS.len() as i64);
    }
}
