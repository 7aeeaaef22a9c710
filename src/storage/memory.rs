//! In-memory key-value store
//!
//! Clones share the same underlying map, so a test can drop every component
//! built on a store and rebuild them from a clone to simulate a restart.

use crate::shared::Result;
use crate::storage::KeyValueStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no keys
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        store.set("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("1".to_string()));

        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);

        // Removing twice is fine
        store.remove("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_clones_share_contents() {
        let store = MemoryStore::new();
        let restarted = store.clone();
        store.set("pendingActions", "[]").await.unwrap();
        assert_eq!(
            restarted.get("pendingActions").await.unwrap(),
            Some("[]".to_string())
        );
    }

    #[tokio::test]
    async fn test_list_and_remove_many() {
        let store = MemoryStore::new();
        store.set("cache_a", "1").await.unwrap();
        store.set("cache_b", "2").await.unwrap();
        store.set("other", "3").await.unwrap();

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys, vec!["cache_a", "cache_b", "other"]);

        store
            .remove_many(&["cache_a".to_string(), "cache_b".to_string()])
            .await
            .unwrap();
        assert_eq!(store.list_keys().await.unwrap(), vec!["other"]);
        assert_eq!(store.len().await, 1);
    }
}
