//! # Network Monitor
//!
//! Tracks online/offline status and notifies observers on value changes.
//!
//! ## Features
//!
//! - **Edge Triggering**: Callbacks fire only when the value changes
//! - **Fail Closed To Online**: An unknown platform signal counts as online
//! - **Explicit Lifecycle**: `Subscription::unsubscribe` is idempotent and
//!   safe after the monitor is gone
//!
//! The monitor knows nothing about queues. It is the trigger for a drain,
//! never the mechanism.
//!
//! ## Baseline
//!
//! Before the first platform signal the monitor assumes a fixed default
//! (online unless constructed otherwise). That assumption is not an
//! observation: the first signal sets the baseline silently, and only later
//! signals that differ from the last known value reach subscribers.
//!
//! Consumers that must act on every change of `current()`, including a first
//! signal that contradicts the assumption, use [`ConnectivityMonitor::watch`].

use crate::shared::PipelineConfig;
use futures_util::{pin_mut, Stream, StreamExt};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::watch;

type Callback = Arc<dyn Fn(bool) + Send + Sync>;

struct Inner {
    online: bool,
    observed: bool,
    next_id: u64,
    subscribers: BTreeMap<u64, Callback>,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("online", &self.online)
            .field("observed", &self.observed)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Connectivity monitor wrapping a platform reachability signal
#[derive(Debug)]
pub struct ConnectivityMonitor {
    inner: Arc<Mutex<Inner>>,
    /// Mirrors `current()`; published on every change, baseline included
    status: watch::Sender<bool>,
}

/// Handle returned by [`ConnectivityMonitor::subscribe`]
///
/// Dropping the handle keeps the callback registered.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    inner: Weak<Mutex<Inner>>,
}

impl ConnectivityMonitor {
    /// Create a monitor that assumes it is online
    pub fn new() -> Self {
        Self::with_initial(true)
    }

    /// Create a monitor with an explicit assumption
    pub fn with_initial(online: bool) -> Self {
        let (status, _) = watch::channel(online);
        Self {
            status,
            inner: Arc::new(Mutex::new(Inner {
                online,
                observed: false,
                next_id: 0,
                subscribers: BTreeMap::new(),
            })),
        }
    }

    /// Monitor starting from the configured assumption
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::with_initial(config.assume_online)
    }

    /// Last known connectivity
    pub fn current(&self) -> bool {
        self.lock().online
    }

    /// Register a callback for connectivity changes
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id = inner.next_id.wrapping_add(1);
        inner.subscribers.insert(id, Arc::new(callback));

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Receiver woken whenever `current()` changes
    ///
    /// Unlike `subscribe`, this also fires when the first platform signal
    /// overturns the initial assumption.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    /// Number of registered callbacks
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Feed one platform signal
    ///
    /// `None` means the platform could not tell and is treated as online.
    /// Returns true if subscribers were notified.
    pub fn report(&self, signal: Option<bool>) -> bool {
        let online = signal.unwrap_or(true);

        let callbacks: Vec<Callback> = {
            let mut inner = self.lock();
            let first = !inner.observed;
            inner.observed = true;

            let changed = inner.online != online;
            inner.online = online;
            if changed {
                self.status.send_replace(online);
            }

            if first || !changed {
                if first && changed {
                    tracing::debug!(online, "first signal overturned assumed connectivity");
                }
                return false;
            }

            inner.subscribers.values().cloned().collect()
        };

        tracing::debug!(online, subscribers = callbacks.len(), "connectivity changed");
        for callback in callbacks {
            callback(online);
        }
        true
    }

    /// Consume a platform signal stream until it ends
    pub async fn run<St>(&self, signal: St)
    where
        St: Stream<Item = Option<bool>>,
    {
        pin_mut!(signal);
        while let Some(event) = signal.next().await {
            self.report(event);
        }
        tracing::debug!("connectivity signal ended");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscription {
    /// Remove the callback; calling again or after teardown is a no-op
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .subscribers
                .remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(monitor: &ConnectivityMonitor) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let sub = monitor.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn test_defaults_to_online() {
        assert!(ConnectivityMonitor::new().current());
        assert!(!ConnectivityMonitor::with_initial(false).current());
    }

    #[test]
    fn test_edge_triggered_callbacks() {
        let monitor = ConnectivityMonitor::new();
        let (count, _sub) = counting(&monitor);

        for signal in [false, false, true, true, false, true] {
            monitor.report(Some(signal));
        }

        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(monitor.current());
    }

    #[test]
    fn test_unknown_signal_fails_closed_to_online() {
        let monitor = ConnectivityMonitor::new();
        monitor.report(Some(false));
        assert!(!monitor.current());

        let (count, _sub) = counting(&monitor);
        assert!(monitor.report(None));
        assert!(monitor.current());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_receives_new_value() {
        let monitor = ConnectivityMonitor::new();
        let values = Arc::new(Mutex::new(Vec::new()));
        let sink = values.clone();
        let _sub = monitor.subscribe(move |online| sink.lock().unwrap().push(online));

        monitor.report(Some(true));
        monitor.report(Some(false));
        monitor.report(Some(true));

        assert_eq!(*values.lock().unwrap(), vec![false, true]);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let monitor = ConnectivityMonitor::new();
        let (count, sub) = counting(&monitor);
        assert_eq!(monitor.subscriber_count(), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(monitor.subscriber_count(), 0);

        monitor.report(Some(true));
        monitor.report(Some(false));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_after_teardown() {
        let monitor = ConnectivityMonitor::new();
        let (_count, sub) = counting(&monitor);
        drop(monitor);
        sub.unsubscribe();
    }

    #[test]
    fn test_watch_sees_overturned_assumption() {
        let monitor = ConnectivityMonitor::with_initial(false);
        let (count, _sub) = counting(&monitor);
        let mut status = monitor.watch();
        assert!(!*status.borrow_and_update());

        assert!(!monitor.report(Some(true)));

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(status.has_changed().unwrap());
        assert!(*status.borrow_and_update());

        monitor.report(Some(true));
        assert!(!status.has_changed().unwrap());
    }

    #[test]
    fn test_from_config() {
        let config = PipelineConfig::builder()
            .assume_online(false)
            .build()
            .unwrap();
        assert!(!ConnectivityMonitor::from_config(&config).current());
        assert!(ConnectivityMonitor::from_config(&PipelineConfig::default()).current());
    }

    #[tokio::test]
    async fn test_run_consumes_stream() {
        let monitor = ConnectivityMonitor::new();
        let (count, _sub) = counting(&monitor);

        let signal = futures_util::stream::iter(vec![Some(true), Some(false), None]);
        monitor.run(signal).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(monitor.current());
    }
}
