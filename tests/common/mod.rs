//! Common test utilities and helpers
//!
//! - `FlakyStore`: memory store whose writes can be switched off
//! - `CountingHandler`: action handler that records calls and can fail
//! - `assert_ok!`: unwrap with a descriptive panic

#![allow(dead_code)]

use async_trait::async_trait;
use dashsync::offline::{ActionHandler, PendingAction};
use dashsync::shared::{Result, SyncError};
use dashsync::storage::{KeyValueStore, MemoryStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Assert that a result is ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Memory store whose writes fail while `fail_writes` is set
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_writes: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(SyncError::durability("storage quota exceeded"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check()?;
        self.inner.remove(key).await
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.inner.list_keys().await
    }

    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        self.check()?;
        self.inner.remove_many(keys).await
    }
}

/// Handler recording every action it executes
#[derive(Debug, Default)]
pub struct CountingHandler {
    calls: Mutex<Vec<Uuid>>,
    failing: Mutex<Vec<Uuid>>,
    fail_all: AtomicBool,
}

impl CountingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail every call until cleared
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Fail calls for one action id
    pub fn fail_for(&self, id: Uuid) {
        self.failing.lock().unwrap().push(id);
    }

    /// Ids executed so far, in call order
    pub fn calls(&self) -> Vec<Uuid> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionHandler for CountingHandler {
    async fn execute(&self, action: &PendingAction) -> Result<()> {
        self.calls.lock().unwrap().push(action.id);
        if self.fail_all.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&action.id)
        {
            return Err(SyncError::remote(format!("503 for {}", action.kind)));
        }
        Ok(())
    }
}
