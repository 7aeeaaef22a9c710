//! # Optimistic Updates
//!
//! Applies a local change immediately, awaits the authoritative remote
//! call, then commits or rolls back.
//!
//! ## Features
//!
//! - **Immediate Updates**: the forward change is published before the
//!   remote call is first polled
//! - **Rollback Support**: the compensating change runs on remote failure
//! - **Confirmation**: server-authoritative data can replace the optimistic
//!   value on success
//! - **State Tracking**: in-flight operations are listed until they settle
//!
//! ## Usage
//!
//! ```rust
//! use dashsync::offline::{OptimisticDispatcher, OptimisticUpdate};
//! use dashsync::shared::SyncError;
//! use dashsync::state::Store;
//!
//! # async fn example() {
//! let dispatcher = OptimisticDispatcher::new(Store::new(10u32));
//!
//! let update = OptimisticUpdate::new("like_post", |likes: &mut u32| {
//!     *likes += 1;
//!     Ok(())
//! })
//! .rollback(|likes: &mut u32| *likes -= 1);
//!
//! let result: Result<(), _> = dispatcher
//!     .perform(update, async { Err(SyncError::remote("503")) })
//!     .await;
//! assert!(result.is_err());
//! assert_eq!(dispatcher.store().get(), 10);
//! # }
//! ```
//!
//! ## Limitations
//!
//! There is no timeout: a remote call that never settles keeps its forward
//! change applied and unconfirmed. Dropping a `perform` future before it
//! settles stops tracking the operation without rolling it back; callers
//! wanting cancellation should make the remote call itself cancellable and
//! report cancellation as an error.

use crate::shared::Result;
use crate::state::Store;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

type Forward<S> = Box<dyn FnOnce(&mut S) -> Result<()> + Send>;
type Compensate<S> = Box<dyn FnOnce(&mut S) + Send>;
type Confirm<S, T> = Box<dyn FnOnce(&mut S, &T) + Send>;

/// A forward change with its optional compensating and confirming changes
pub struct OptimisticUpdate<S, T> {
    label: String,
    forward: Forward<S>,
    compensate: Option<Compensate<S>>,
    confirm: Option<Confirm<S, T>>,
}

impl<S, T> OptimisticUpdate<S, T> {
    /// Create an update; an `Err` from `forward` aborts the operation
    pub fn new<F>(label: impl Into<String>, forward: F) -> Self
    where
        F: FnOnce(&mut S) -> Result<()> + Send + 'static,
    {
        Self {
            label: label.into(),
            forward: Box::new(forward),
            compensate: None,
            confirm: None,
        }
    }

    /// Change restoring the prior state on remote failure
    pub fn rollback<F>(mut self, compensate: F) -> Self
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.compensate = Some(Box::new(compensate));
        self
    }

    /// Change applying the remote result on success
    pub fn on_success<F>(mut self, confirm: F) -> Self
    where
        F: FnOnce(&mut S, &T) + Send + 'static,
    {
        self.confirm = Some(Box::new(confirm));
        self
    }

    /// Label used in logs and in-flight listings
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<S, T> std::fmt::Debug for OptimisticUpdate<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticUpdate")
            .field("label", &self.label)
            .field("has_rollback", &self.compensate.is_some())
            .field("has_confirm", &self.confirm.is_some())
            .finish()
    }
}

/// An operation whose forward change is applied but not yet settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    /// Generated operation id
    pub id: Uuid,
    /// Update label
    pub label: String,
    /// When the forward change was applied
    pub started_at: DateTime<Utc>,
}

type InFlightMap = Arc<Mutex<HashMap<Uuid, InFlight>>>;

fn lock_map(map: &InFlightMap) -> std::sync::MutexGuard<'_, HashMap<Uuid, InFlight>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes the in-flight record however the operation ends
#[derive(Debug)]
struct Tracking {
    id: Uuid,
    in_flight: InFlightMap,
}

impl Drop for Tracking {
    fn drop(&mut self) {
        lock_map(&self.in_flight).remove(&self.id);
    }
}

/// Settlement handle for an applied forward change
pub struct Reconciliation<S: Clone + Send + Sync + 'static, T> {
    store: Store<S>,
    label: String,
    compensate: Option<Compensate<S>>,
    confirm: Option<Confirm<S, T>>,
    tracking: Tracking,
}

impl<S: Clone + Send + Sync + 'static, T> Reconciliation<S, T> {
    /// Generated operation id
    pub fn id(&self) -> Uuid {
        self.tracking.id
    }

    /// Remote side confirmed; apply the confirming change if any
    pub fn commit(self, result: &T) {
        if let Some(confirm) = self.confirm {
            self.store.update(|state| confirm(state, result));
        }
        tracing::debug!(id = %self.tracking.id, label = %self.label, "optimistic update committed");
    }

    /// Remote side refused; apply the compensating change if any
    pub fn rollback(self) {
        if let Some(compensate) = self.compensate {
            self.store.update(compensate);
        }
        tracing::debug!(id = %self.tracking.id, label = %self.label, "optimistic update rolled back");
    }

    /// Keep the forward change without confirming it
    ///
    /// Used when the authoritative attempt was handed to the pending queue.
    pub fn keep(self) {
        tracing::debug!(id = %self.tracking.id, label = %self.label, "optimistic update left pending");
    }
}

impl<S: Clone + Send + Sync + 'static, T> std::fmt::Debug for Reconciliation<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciliation")
            .field("id", &self.tracking.id)
            .field("label", &self.label)
            .finish()
    }
}

/// Coordinates "apply now, confirm later" for commands against one store
///
/// Unrelated `perform` calls run independently; callers serialize calls
/// that touch overlapping state.
pub struct OptimisticDispatcher<S> {
    store: Store<S>,
    in_flight: InFlightMap,
}

impl<S> Clone for OptimisticDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<S> std::fmt::Debug for OptimisticDispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticDispatcher")
            .field("in_flight", &lock_map(&self.in_flight).len())
            .finish()
    }
}

impl<S: Clone + Send + Sync + 'static> OptimisticDispatcher<S> {
    /// Create a dispatcher publishing into `store`
    pub fn new(store: Store<S>) -> Self {
        Self {
            store,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The observable state this dispatcher mutates
    pub fn store(&self) -> &Store<S> {
        &self.store
    }

    /// Apply the forward change and start tracking the operation
    ///
    /// # Errors
    ///
    /// Whatever `forward` returned; state is then untouched and nothing is
    /// tracked.
    pub fn begin<T>(&self, update: OptimisticUpdate<S, T>) -> Result<Reconciliation<S, T>> {
        let OptimisticUpdate {
            label,
            forward,
            compensate,
            confirm,
        } = update;

        if let Err(e) = self.store.try_update(forward) {
            tracing::debug!(label = %label, error = %e, "forward change refused");
            return Err(e);
        }

        let id = Uuid::new_v4();
        lock_map(&self.in_flight).insert(
            id,
            InFlight {
                id,
                label: label.clone(),
                started_at: Utc::now(),
            },
        );

        Ok(Reconciliation {
            store: self.store.clone(),
            label,
            compensate,
            confirm,
            tracking: Tracking {
                id,
                in_flight: self.in_flight.clone(),
            },
        })
    }

    /// Apply `update`, await `remote`, then commit or roll back
    ///
    /// `remote` is not polled until the forward change has been published,
    /// and not at all if the forward change fails. Nothing happens until the
    /// returned future is first polled; use [`OptimisticDispatcher::begin`]
    /// to apply the forward change synchronously.
    ///
    /// # Errors
    ///
    /// The forward change's error, or the remote error after rollback.
    pub async fn perform<T, Fut>(&self, update: OptimisticUpdate<S, T>, remote: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let reconciliation = self.begin(update)?;

        match remote.await {
            Ok(value) => {
                reconciliation.commit(&value);
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(id = %reconciliation.id(), error = %e, "remote call failed; rolling back");
                reconciliation.rollback();
                Err(e)
            }
        }
    }

    /// Operations applied but not yet settled, oldest first
    pub fn in_flight(&self) -> Vec<InFlight> {
        let mut ops: Vec<InFlight> = lock_map(&self.in_flight).values().cloned().collect();
        ops.sort_by_key(|op| op.started_at);
        ops
    }

    /// Number of unsettled operations
    pub fn in_flight_count(&self) -> usize {
        lock_map(&self.in_flight).len()
    }
}
