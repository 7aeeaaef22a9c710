//! # Expiring Cache
//!
//! Read-through cache with lazy time-based invalidation. Entries live in an
//! in-memory index and are mirrored into durable storage under a key prefix,
//! so a restarted process can still serve them.
//!
//! The in-memory index is authoritative for the running process. Durable
//! storage is only consulted when the index lacks a key, and a hit there is
//! promoted into memory. Durable I/O problems never fail a cache call; they
//! are logged and the cache degrades to memory only.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use dashsync::cache::ExpiringCache;
//! use dashsync::shared::SystemClock;
//! use dashsync::storage::MemoryStore;
//!
//! # async fn example() {
//! let cache: ExpiringCache<Vec<String>> = ExpiringCache::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(SystemClock),
//!     "cache_",
//!     Duration::from_secs(300),
//! );
//!
//! cache.set("trending", vec!["rust".into()], Duration::from_secs(60)).await;
//! assert!(cache.get("trending").await.is_some());
//! # }
//! ```

use crate::shared::{Clock, PipelineConfig, Result, SystemClock};
use crate::storage::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// A cached value with its age bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    #[serde(rename = "data")]
    pub value: V,
    /// Milliseconds since the Unix epoch
    #[serde(rename = "timestamp")]
    pub stored_at: i64,
    #[serde(rename = "expiresIn")]
    pub ttl_ms: u64,
}

impl<V> CacheEntry<V> {
    /// Stale once strictly more than `ttl_ms` has passed
    pub fn is_expired(&self, now_millis: i64) -> bool {
        let age = now_millis.saturating_sub(self.stored_at);
        age > 0 && age as u64 > self.ttl_ms
    }
}

fn duration_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// Generic cache over one value type
#[derive(Debug)]
pub struct ExpiringCache<V> {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    prefix: String,
    default_ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V> ExpiringCache<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        prefix: impl Into<String>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            prefix: prefix.into(),
            default_ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cache on `store` using the configured prefix and TTL and wall time
    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &PipelineConfig) -> Self {
        Self::new(
            store,
            Arc::new(SystemClock),
            config.cache_prefix.clone(),
            config.default_cache_ttl,
        )
    }

    fn durable_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Store `value`, replacing any entry for `key` and resetting its age
    pub async fn set(&self, key: &str, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now_millis(),
            ttl_ms: duration_millis(ttl),
        };
        let encoded = serde_json::to_string(&entry);

        // Held across the durable write so both layers agree on the winner
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), entry);

        let result = match encoded {
            Ok(encoded) => self.store.set(&self.durable_key(key), &encoded).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "failed to persist cache entry");
        }
    }

    /// Store `value` with the default TTL
    pub async fn set_default(&self, key: &str, value: V) {
        self.set(key, value, self.default_ttl).await;
    }

    /// Fresh value for `key`, if any
    ///
    /// Falls back to durable storage when memory has no entry. A stale entry
    /// is evicted from both layers. Misses and evictions are settled under
    /// the index write lock, so a concurrent `set` is never overwritten by
    /// an older durable copy nor evicted after it refreshed the key.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_millis();

        if let Some(entry) = self.entries.read().await.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }

        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            // Refreshed while we waited for the lock
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
            tracing::debug!(key, "cache entry expired");
            entries.remove(key);
            self.remove_durable(key).await;
            return None;
        }

        let entry = self.load_durable(key).await?;
        if entry.is_expired(now) {
            tracing::debug!(key, "durable cache entry expired");
            self.remove_durable(key).await;
            return None;
        }

        let value = entry.value.clone();
        entries.insert(key.to_string(), entry);
        Some(value)
    }

    async fn remove_durable(&self, key: &str) {
        if let Err(e) = self.store.remove(&self.durable_key(key)).await {
            tracing::warn!(key, error = %e, "failed to remove cache entry");
        }
    }

    async fn load_durable(&self, key: &str) -> Option<CacheEntry<V>> {
        let durable_key = self.durable_key(key);
        let raw = match self.store.get(&durable_key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read cache entry");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(key, error = %e, "evicting undecodable cache entry");
                if let Err(e) = self.store.remove(&durable_key).await {
                    tracing::warn!(key, error = %e, "failed to evict cache entry");
                }
                None
            }
        }
    }

    /// Cached value, or the result of `fetch` cached for `ttl`
    ///
    /// # Errors
    ///
    /// Whatever `fetch` returns; nothing is cached in that case.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let value = fetch().await?;
        self.set(key, value.clone(), ttl).await;
        Ok(value)
    }

    /// Invalidate one key
    pub async fn remove(&self, key: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        self.remove_durable(key).await;
    }

    /// Invalidate everything under the cache prefix
    ///
    /// Other keys in the shared store are left alone. Durable failures are
    /// logged; use [`ExpiringCache::try_clear`] to observe them.
    pub async fn clear(&self) {
        if let Err(e) = self.try_clear().await {
            tracing::warn!(error = %e, "failed to clear cache");
        }
    }

    /// Like `clear`, but reports durable failures
    ///
    /// Memory is emptied either way. Returns the number of durable keys
    /// removed.
    pub async fn try_clear(&self) -> Result<usize> {
        let mut entries = self.entries.write().await;
        entries.clear();

        let cache_keys: Vec<String> = self
            .store
            .list_keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(&self.prefix))
            .collect();
        self.store.remove_many(&cache_keys).await?;

        tracing::debug!(removed = cache_keys.len(), "cleared cache");
        Ok(cache_keys.len())
    }

    /// In-memory entries only; durable entries not yet promoted are not counted
    pub async fn size(&self) -> usize {
        self.entries.read().await.len()
    }
}
