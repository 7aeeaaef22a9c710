//! # Pending Action Queue
//!
//! Durable, ordered holding area for actions the remote side has not yet
//! confirmed. The whole queue is serialized as one JSON array under a single
//! storage key and rewritten on every change, so a restart restores exactly
//! the unresolved entries in their original order.
//!
//! ## Features
//!
//! - **Persistent Queue**: `enqueue` returns only after the write completed
//! - **Snapshot Drains**: `replay_all` visits a copy of the queue, one entry
//!   at a time, and a failing entry never blocks the ones after it
//! - **Diagnostics**: attempt counts and the last error survive restarts
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dashsync::offline::queue::PendingActionQueue;
//! use dashsync::storage::MemoryStore;
//!
//! # async fn example() -> dashsync::shared::Result<()> {
//! let queue = PendingActionQueue::load(Arc::new(MemoryStore::new()), "pendingActions").await?;
//!
//! let id = queue
//!     .enqueue("create_post", serde_json::json!({ "title": "Hello offline!" }))
//!     .await?;
//!
//! let report = queue
//!     .replay_all(|action| async move {
//!         // Execute action against the remote API...
//!         Ok(())
//!     })
//!     .await;
//! assert_eq!(report.succeeded, 1);
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

use crate::shared::{Result, SyncError};
use crate::storage::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// An action awaiting remote confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    /// Assigned at enqueue time
    pub id: Uuid,
    /// Which remote operation this represents
    pub kind: String,
    /// Data needed to replay the remote call
    pub payload: serde_json::Value,
    /// When the action was queued
    pub enqueued_at: DateTime<Utc>,
    /// Failed replay attempts so far
    #[serde(default)]
    pub attempts: u32,
    /// Error message from the last failed attempt
    #[serde(default)]
    pub last_error: Option<String>,
}

impl PendingAction {
    pub(crate) fn new(kind: String, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payload,
            enqueued_at: Utc::now(),
            attempts: 0,
            last_error: None,
        }
    }
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Entries handed to the executor
    pub attempted: usize,
    /// Entries whose executor call succeeded
    pub succeeded: usize,
    /// Entries left in the queue after failing, in queue order
    pub failed: Vec<Uuid>,
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Entries in the queue
    pub pending: usize,
    /// Entries that failed at least once
    pub retried: usize,
    /// Queue time of the oldest entry
    pub oldest_enqueued_at: Option<DateTime<Utc>>,
}

/// Durable ordered queue of pending actions
#[derive(Debug)]
pub struct PendingActionQueue {
    store: Arc<dyn KeyValueStore>,
    key: String,
    /// Held across the storage write so persisted snapshots never go stale
    entries: Mutex<Vec<PendingAction>>,
    /// Serializes drains
    replay_lock: Mutex<()>,
}

impl PendingActionQueue {
    /// Restore the queue persisted under `key`
    ///
    /// A missing key yields an empty queue. An unreadable queue is a
    /// `DurabilityFailure` rather than being discarded.
    pub async fn load(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let entries = match store.get(&key).await? {
            Some(raw) => Self::decode(&key, &raw)?,
            None => Vec::new(),
        };

        tracing::debug!(key = %key, entries = entries.len(), "loaded pending action queue");

        Ok(Self {
            store,
            key,
            entries: Mutex::new(entries),
            replay_lock: Mutex::new(()),
        })
    }

    fn decode(key: &str, raw: &str) -> Result<Vec<PendingAction>> {
        let decoded: Vec<PendingAction> = serde_json::from_str(raw).map_err(|e| {
            SyncError::durability(format!("queue '{}' is unreadable: {}", key, e))
        })?;

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(decoded.len());
        for action in decoded {
            if seen.insert(action.id) {
                entries.push(action);
            } else {
                tracing::warn!(id = %action.id, "dropping duplicate pending action");
            }
        }
        Ok(entries)
    }

    async fn persist(&self, entries: &[PendingAction]) -> Result<()> {
        let encoded = serde_json::to_string(entries)?;
        self.store.set(&self.key, &encoded).await
    }

    /// Storage key of the queue
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append an action and persist the queue
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty kind. `DurabilityFailure` if the write
    /// failed; the action is then not in the queue and the caller should
    /// roll back any optimistic change it made.
    pub async fn enqueue(
        &self,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<Uuid> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(SyncError::invalid_input("kind", "action kind cannot be empty"));
        }

        let action = PendingAction::new(kind, payload);
        let id = action.id;

        let mut entries = self.entries.lock().await;
        entries.push(action);
        if let Err(e) = self.persist(&entries).await {
            entries.pop();
            tracing::warn!(error = %e, "could not persist queued action");
            return Err(e);
        }

        tracing::debug!(%id, pending = entries.len(), "queued pending action");
        Ok(id)
    }

    /// Delete an entry; absent ids are a no-op
    ///
    /// # Errors
    ///
    /// `DurabilityFailure` if the write failed; the entry stays queued.
    pub async fn remove(&self, id: &Uuid) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let Some(position) = entries.iter().position(|a| a.id == *id) else {
            return Ok(());
        };

        let removed = entries.remove(position);
        if let Err(e) = self.persist(&entries).await {
            entries.insert(position, removed);
            return Err(e);
        }
        Ok(())
    }

    /// Snapshot of the queue in insertion order
    pub async fn list(&self) -> Vec<PendingAction> {
        self.entries.lock().await.clone()
    }

    /// Whether an entry with this id is queued
    pub async fn contains(&self, id: &Uuid) -> bool {
        self.entries.lock().await.iter().any(|a| a.id == *id)
    }

    /// Number of queued entries
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the queue is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Get queue statistics
    pub async fn stats(&self) -> QueueStats {
        let entries = self.entries.lock().await;
        QueueStats {
            pending: entries.len(),
            retried: entries.iter().filter(|a| a.attempts > 0).count(),
            oldest_enqueued_at: entries.iter().map(|a| a.enqueued_at).min(),
        }
    }

    /// Drop every entry
    pub async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let previous = std::mem::take(&mut *entries);
        if let Err(e) = self.persist(&entries).await {
            *entries = previous;
            return Err(e);
        }
        Ok(())
    }

    async fn record_failure(&self, id: &Uuid, error: &SyncError) {
        let mut entries = self.entries.lock().await;
        if let Some(action) = entries.iter_mut().find(|a| a.id == *id) {
            action.attempts = action.attempts.saturating_add(1);
            action.last_error = Some(error.to_string());
        }
        if let Err(e) = self.persist(&entries).await {
            tracing::warn!(%id, error = %e, "could not persist attempt count");
        }
    }

    /// Give every queued entry one attempt, in order
    ///
    /// Works from a snapshot: entries queued during the pass wait for the
    /// next one, and entries removed during the pass are skipped. Successes
    /// are removed; failures stay queued for the next drain.
    pub async fn replay_all<F, Fut>(&self, mut executor: F) -> ReplayReport
    where
        F: FnMut(PendingAction) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let _drain = self.replay_lock.lock().await;
        let snapshot = self.list().await;
        let mut report = ReplayReport::default();

        for action in snapshot {
            if !self.contains(&action.id).await {
                continue;
            }

            let id = action.id;
            let kind = action.kind.clone();
            report.attempted += 1;

            match executor(action).await {
                Ok(()) => {
                    report.succeeded += 1;
                    if let Err(e) = self.remove(&id).await {
                        // Replayed again next time
                        tracing::warn!(%id, error = %e, "replayed action could not be removed");
                    }
                }
                Err(e) => {
                    tracing::warn!(%id, kind = %kind, error = %e, "replay failed; keeping action");
                    self.record_failure(&id, &e).await;
                    report.failed.push(id);
                }
            }
        }

        if report.attempted > 0 {
            tracing::info!(
                attempted = report.attempted,
                succeeded = report.succeeded,
                failed = report.failed.len(),
                "drained pending action queue"
            );
        }
        report
    }
}
