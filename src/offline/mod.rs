//! # Offline Reconciliation
//!
//! Offline-first command handling with optimistic updates, durable queuing,
//! and automatic drains when connectivity returns.
//!
//! ## Architecture
//!
//! - **Optimistic Updates**: local state changes before the remote answers
//! - **Pending Action Queue**: durable record of unconfirmed actions
//! - **Coordinator**: routes commands online or into the queue, and drains
//!   the queue on every offline→online edge
//!
//! ## Key Components
//!
//! - `optimistic.rs`: `OptimisticDispatcher` and `OptimisticUpdate`
//! - `queue.rs`: `PendingActionQueue`
//! - this module: `SyncCoordinator` and the `ActionHandler` seam
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use dashsync::offline::{ActionHandler, PendingAction, SyncCoordinator};
//! use dashsync::shared::Result;
//! use dashsync::state::Store;
//! use dashsync::storage::MemoryStore;
//! use dashsync::sync::ConnectivityMonitor;
//!
//! struct CreatePost;
//!
//! #[async_trait]
//! impl ActionHandler for CreatePost {
//!     async fn execute(&self, action: &PendingAction) -> Result<()> {
//!         // POST action.payload to the remote API...
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let monitor = Arc::new(ConnectivityMonitor::new());
//! let coordinator = SyncCoordinator::load(
//!     Arc::new(MemoryStore::new()),
//!     "pendingActions",
//!     monitor.clone(),
//!     Store::new(Vec::<String>::new()),
//! )
//! .await?;
//! coordinator.register_handler("create_post", Arc::new(CreatePost)).await;
//! let _task = coordinator.start();
//!
//! // Platform reports connectivity; queued posts drain on reconnect
//! monitor.report(Some(false));
//! monitor.report(Some(true));
//! # Ok(())
//! # }
//! ```

pub mod optimistic;
pub mod queue;

pub use optimistic::{InFlight, OptimisticDispatcher, OptimisticUpdate, Reconciliation};
pub use queue::{PendingAction, PendingActionQueue, QueueStats, ReplayReport};

use crate::shared::{Result, SyncError};
use crate::state::Store;
use crate::storage::KeyValueStore;
use crate::sync::{ConnectivityMonitor, DrainMetrics};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Performs the remote call for one kind of action
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Execute the action against the remote service
    async fn execute(&self, action: &PendingAction) -> Result<()>;
}

/// How a submitted command was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The remote call succeeded
    Confirmed,
    /// Offline; the action was queued durably and the change stays applied
    Queued(Uuid),
}

type HandlerMap = RwLock<HashMap<String, Arc<dyn ActionHandler>>>;

/// State shared with the background drain task
struct Drainer {
    queue: Arc<PendingActionQueue>,
    monitor: Arc<ConnectivityMonitor>,
    handlers: HandlerMap,
    metrics: RwLock<DrainMetrics>,
}

impl Drainer {
    async fn handler(&self, kind: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.read().await.get(kind).cloned()
    }

    async fn drain(&self) -> ReplayReport {
        if !self.monitor.current() {
            tracing::debug!("offline; skipping drain");
            return ReplayReport::default();
        }

        let started = Instant::now();
        let report = self
            .queue
            .replay_all(move |action| async move {
                match self.handler(&action.kind).await {
                    Some(handler) => handler.execute(&action).await,
                    None => Err(SyncError::invalid_input(
                        "kind",
                        format!("no handler registered for '{}'", action.kind),
                    )),
                }
            })
            .await;

        let mut metrics = self.metrics.write().await;
        metrics.record_drain(&report, started.elapsed());
        tracing::debug!(
            drains = metrics.total_drains,
            success_rate = metrics.success_rate(),
            "drain recorded"
        );
        report
    }

    /// Drain now if online, then again every time connectivity comes back
    async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let mut status = self.monitor.watch();

        if *status.borrow_and_update() {
            self.drain().await;
        }

        loop {
            if *stop.borrow_and_update() {
                break;
            }
            tokio::select! {
                changed = stop.changed() => {
                    // Sender gone: the coordinator was dropped
                    if changed.is_err() {
                        break;
                    }
                }
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *status.borrow_and_update() {
                        self.drain().await;
                    }
                }
            }
        }
        tracing::debug!("drain task stopped");
    }
}

/// Wires the monitor, queue and dispatcher together
pub struct SyncCoordinator<S> {
    drainer: Arc<Drainer>,
    dispatcher: OptimisticDispatcher<S>,
    /// Stop flag of the running drain task, if any
    running: Mutex<Option<watch::Sender<bool>>>,
}

impl<S> std::fmt::Debug for SyncCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("queue_key", &self.drainer.queue.key())
            .field("online", &self.drainer.monitor.current())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl<S: Clone + Send + Sync + 'static> SyncCoordinator<S> {
    /// Build a coordinator around existing components
    pub fn new(
        queue: Arc<PendingActionQueue>,
        monitor: Arc<ConnectivityMonitor>,
        state: Store<S>,
    ) -> Self {
        Self {
            drainer: Arc::new(Drainer {
                queue,
                monitor,
                handlers: RwLock::new(HashMap::new()),
                metrics: RwLock::new(DrainMetrics::new()),
            }),
            dispatcher: OptimisticDispatcher::new(state),
            running: Mutex::new(None),
        }
    }

    /// Restore the queue from `store` and build a coordinator
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        queue_key: &str,
        monitor: Arc<ConnectivityMonitor>,
        state: Store<S>,
    ) -> Result<Self> {
        let queue = PendingActionQueue::load(store, queue_key).await?;
        Ok(Self::new(Arc::new(queue), monitor, state))
    }

    /// Register the handler executing actions of `kind`
    pub async fn register_handler(&self, kind: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.drainer
            .handlers
            .write()
            .await
            .insert(kind.into(), handler);
    }

    /// The pending action queue
    pub fn queue(&self) -> &Arc<PendingActionQueue> {
        &self.drainer.queue
    }

    /// The connectivity monitor
    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.drainer.monitor
    }

    /// The optimistic dispatcher
    pub fn dispatcher(&self) -> &OptimisticDispatcher<S> {
        &self.dispatcher
    }

    /// Drain counters so far
    pub async fn metrics(&self) -> DrainMetrics {
        self.drainer.metrics.read().await.clone()
    }

    /// Apply a command optimistically and confirm it remotely or queue it
    ///
    /// Online, the registered handler is the remote call: success confirms,
    /// failure rolls back and returns the error. Offline, the forward change
    /// stays applied and the action is queued for the next drain.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty kind or, online, a kind with no handler.
    /// A refused forward change. The remote error after rollback. A
    /// `DurabilityFailure` from the queue after rollback.
    pub async fn submit(
        &self,
        kind: &str,
        payload: serde_json::Value,
        update: OptimisticUpdate<S, ()>,
    ) -> Result<Submission> {
        if kind.trim().is_empty() {
            return Err(SyncError::invalid_input("kind", "action kind cannot be empty"));
        }

        if self.drainer.monitor.current() {
            let handler = self.drainer.handler(kind).await.ok_or_else(|| {
                SyncError::invalid_input("kind", format!("no handler registered for '{}'", kind))
            })?;
            let action = PendingAction::new(kind.to_string(), payload);

            self.dispatcher
                .perform(update, async move { handler.execute(&action).await })
                .await?;
            return Ok(Submission::Confirmed);
        }

        let reconciliation = self.dispatcher.begin(update)?;
        match self.drainer.queue.enqueue(kind, payload).await {
            Ok(id) => {
                reconciliation.keep();
                tracing::info!(%id, kind, "offline; action queued");
                Ok(Submission::Queued(id))
            }
            Err(e) => {
                reconciliation.rollback();
                Err(e)
            }
        }
    }

    /// Give every queued action one attempt now
    ///
    /// No-op while offline.
    pub async fn drain(&self) -> ReplayReport {
        self.drainer.drain().await
    }

    /// Drain in the background whenever connectivity comes back
    ///
    /// Reacts to every change of `monitor().current()` to online, including
    /// a first platform signal that overturns an offline assumption. Also
    /// drains once at start if already online, so actions restored from a
    /// previous run are not left waiting. Starting again stops the previous
    /// task first; at most one drain task runs per coordinator.
    pub fn start(&self) -> JoinHandle<()> {
        let (stop, stopped) = watch::channel(false);
        if let Some(previous) = self.lock_running().replace(stop) {
            tracing::debug!("restarting drain task");
            previous.send_replace(true);
        }

        tokio::spawn(self.drainer.clone().run(stopped))
    }

    /// Stop the background drain task
    ///
    /// A drain already in progress finishes first. No-op when nothing runs;
    /// a later `start` is unaffected.
    pub fn shutdown(&self) {
        if let Some(stop) = self.lock_running().take() {
            stop.send_replace(true);
        }
    }

    /// Whether a drain task was started and not shut down
    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<watch::Sender<bool>>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct RecordingHandler {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ActionHandler for RecordingHandler {
        async fn execute(&self, _action: &PendingAction) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                Err(SyncError::remote("unavailable"))
            } else {
                Ok(())
            }
        }
    }

    fn add_post(title: &'static str) -> OptimisticUpdate<Vec<String>, ()> {
        OptimisticUpdate::new("create_post", move |posts: &mut Vec<String>| {
            posts.push(title.to_string());
            Ok(())
        })
        .rollback(|posts: &mut Vec<String>| {
            posts.pop();
        })
    }

    async fn coordinator(
        online: bool,
    ) -> (SyncCoordinator<Vec<String>>, Arc<RecordingHandler>) {
        let monitor = Arc::new(ConnectivityMonitor::with_initial(online));
        let coordinator = SyncCoordinator::load(
            Arc::new(MemoryStore::new()),
            "pendingActions",
            monitor,
            Store::new(Vec::new()),
        )
        .await
        .unwrap();
        let handler = Arc::new(RecordingHandler::default());
        coordinator
            .register_handler("create_post", handler.clone())
            .await;
        (coordinator, handler)
    }

    #[tokio::test]
    async fn test_online_submit_confirms() {
        let (coordinator, handler) = coordinator(true).await;

        let outcome = coordinator
            .submit("create_post", json!({ "title": "hi" }), add_post("hi"))
            .await
            .unwrap();

        assert_eq!(outcome, Submission::Confirmed);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.dispatcher().store().get(), vec!["hi"]);
        assert!(coordinator.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_online_failure_rolls_back() {
        let (coordinator, handler) = coordinator(true).await;
        handler.fail.store(true, Ordering::SeqCst);

        let result = coordinator
            .submit("create_post", json!({}), add_post("hi"))
            .await;

        assert!(matches!(result, Err(SyncError::RemoteFailure { .. })));
        assert!(coordinator.dispatcher().store().get().is_empty());
        assert!(coordinator.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_offline_submit_queues() {
        let (coordinator, handler) = coordinator(false).await;

        let outcome = coordinator
            .submit("create_post", json!({ "title": "later" }), add_post("later"))
            .await
            .unwrap();

        let Submission::Queued(id) = outcome else {
            panic!("Expected Queued, got {:?}", outcome);
        };
        assert!(coordinator.queue().contains(&id).await);
        assert_eq!(coordinator.dispatcher().store().get(), vec!["later"]);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.dispatcher().in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_kind_online() {
        let (coordinator, _handler) = coordinator(true).await;
        let result = coordinator
            .submit("delete_account", json!({}), add_post("x"))
            .await;
        assert!(matches!(result, Err(SyncError::InvalidInput { .. })));
        assert!(coordinator.dispatcher().store().get().is_empty());
    }

    #[tokio::test]
    async fn test_drain_skipped_while_offline() {
        let (coordinator, handler) = coordinator(false).await;
        coordinator
            .submit("create_post", json!({}), add_post("a"))
            .await
            .unwrap();

        let report = coordinator.drain().await;

        assert_eq!(report, ReplayReport::default());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.queue().len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_kind_stays_queued() {
        let (coordinator, _handler) = coordinator(false).await;
        coordinator
            .queue()
            .enqueue("legacy_action", json!({}))
            .await
            .unwrap();

        coordinator.monitor().report(Some(false));
        coordinator.monitor().report(Some(true));
        let report = coordinator.drain().await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(coordinator.queue().len().await, 1);
    }

    #[tokio::test]
    async fn test_reconnect_triggers_background_drain() {
        let (coordinator, handler) = coordinator(false).await;
        coordinator.monitor().report(Some(false));
        coordinator
            .submit("create_post", json!({}), add_post("a"))
            .await
            .unwrap();
        coordinator
            .submit("create_post", json!({}), add_post("b"))
            .await
            .unwrap();

        let task = coordinator.start();
        coordinator.monitor().report(Some(true));

        tokio::time::timeout(Duration::from_secs(5), async {
            while !coordinator.queue().is_empty().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        let metrics = coordinator.metrics().await;
        assert_eq!(metrics.succeeded, 2);

        coordinator.shutdown();
        task.await.unwrap();
        assert!(!coordinator.is_running());
    }

    async fn wait_until_drained(coordinator: &SyncCoordinator<Vec<String>>) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !coordinator.queue().is_empty().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue should drain");
    }

    #[tokio::test]
    async fn test_first_online_signal_drains() {
        let (coordinator, handler) = coordinator(false).await;
        coordinator
            .submit("create_post", json!({}), add_post("a"))
            .await
            .unwrap();

        let task = coordinator.start();
        coordinator.monitor().report(Some(true));
        wait_until_drained(&coordinator).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        coordinator.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_start_while_online_drains_restored_actions() {
        let (coordinator, handler) = coordinator(true).await;
        coordinator.queue().enqueue("create_post", json!({})).await.unwrap();

        let task = coordinator.start();
        wait_until_drained(&coordinator).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        coordinator.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_second_start_stops_first_task() {
        let (coordinator, _handler) = coordinator(false).await;

        let first = coordinator.start();
        let second = coordinator.start();
        tokio::time::timeout(Duration::from_secs(5), first)
            .await
            .expect("first task should stop")
            .unwrap();
        assert!(coordinator.is_running());

        coordinator.shutdown();
        tokio::time::timeout(Duration::from_secs(5), second)
            .await
            .expect("second task should stop")
            .unwrap();
        assert!(!coordinator.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_before_start_is_harmless() {
        let (coordinator, handler) = coordinator(false).await;
        coordinator.shutdown();

        let task = coordinator.start();
        coordinator
            .submit("create_post", json!({}), add_post("a"))
            .await
            .unwrap();
        coordinator.monitor().report(Some(true));
        wait_until_drained(&coordinator).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert!(!task.is_finished());
        coordinator.shutdown();
        task.await.unwrap();
    }
}
