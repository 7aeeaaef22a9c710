//! # Observable State
//!
//! `Store<S>` holds the state the rendering layer draws from. Optimistic
//! forward and compensating changes are applied through it, and every
//! subscriber is woken after each published change.
//!
//! ## Usage
//!
//! ```rust
//! use dashsync::state::Store;
//!
//! let store = Store::new(vec!["first post".to_string()]);
//! let mut rx = store.subscribe();
//!
//! store.update(|posts| posts.push("second post".to_string()));
//! assert!(rx.has_changed().unwrap());
//! assert_eq!(store.get().len(), 2);
//! ```

use crate::shared::Result;
use tokio::sync::watch;

/// Observable state container
///
/// Clones share the same state.
#[derive(Debug)]
pub struct Store<S> {
    tx: watch::Sender<S>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: Clone + Send + Sync + 'static> Store<S> {
    /// Create a store holding `initial`
    pub fn new(initial: S) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Snapshot of the current state
    pub fn get(&self) -> S {
        self.tx.borrow().clone()
    }

    /// Receiver woken on every published change
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }

    /// Apply an infallible change and notify subscribers
    pub fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut S),
    {
        self.tx.send_modify(change);
    }

    /// Apply a fallible change atomically
    ///
    /// The change runs against a copy; nothing is published and subscribers
    /// are not woken when it returns an error.
    pub fn try_update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut S) -> Result<()>,
    {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|state| {
            let mut next = state.clone();
            match change(&mut next) {
                Ok(()) => {
                    *state = next;
                    true
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            }
        });
        outcome
    }
}
