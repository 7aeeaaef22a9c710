//! dashsync - Local State Reconciliation
//!
//! dashsync is the offline-first core of a social dashboard client. It keeps
//! local state responsive while the remote API is slow or unreachable, and
//! reconciles that state once the remote side answers.
//!
//! # Overview
//!
//! The library provides:
//! - A durable, ordered queue of pending remote actions that survives restarts
//! - A connectivity monitor that reports offline/online edges
//! - An optimistic dispatcher with commit/rollback reconciliation
//! - An expiring read-through cache mirrored into durable storage
//! - A coordinator that drains the queue whenever connectivity returns
//!
//! # Module Structure
//!
//! - **`shared`** - Error taxonomy, configuration, clocks and tracing setup
//! - **`storage`** - Durable key-value storage (`MemoryStore`, `SqliteStore`)
//! - **`state`** - Observable state store the UI layer subscribes to
//! - **`sync`** - Connectivity monitoring and drain metrics
//! - **`offline`** - Pending action queue, optimistic dispatcher, coordinator
//! - **`cache`** - Expiring cache with lazy eviction
//! - **`pagination`** - Page-counter loader for infinite lists
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dashsync::offline::{OptimisticUpdate, SyncCoordinator};
//! use dashsync::state::Store;
//! use dashsync::storage::MemoryStore;
//! use dashsync::sync::ConnectivityMonitor;
//!
//! # async fn example() -> dashsync::shared::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let monitor = Arc::new(ConnectivityMonitor::new());
//! let likes = Store::new(0u32);
//!
//! let coordinator =
//!     SyncCoordinator::load(store, "pendingActions", monitor, likes.clone()).await?;
//! let _task = coordinator.start();
//!
//! let update = OptimisticUpdate::new("like_post", |n: &mut u32| {
//!     *n += 1;
//!     Ok(())
//! })
//! .rollback(|n: &mut u32| *n -= 1);
//! coordinator
//!     .submit("like_post", serde_json::json!({ "post_id": 7 }), update)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! Every component can be shared across tokio tasks behind an `Arc`. Mutable
//! indexes are guarded by locks and no lock is held across a remote call.
//!
//! # Error Handling
//!
//! All fallible operations return [`shared::Result`], whose error type
//! [`shared::SyncError`] distinguishes transient remote failures, durability
//! failures and invalid caller input.

/// Shared types: errors, configuration, clocks, tracing
pub mod shared;

/// Durable key-value storage backends
pub mod storage;

/// Observable application state
pub mod state;

/// Connectivity monitoring and metrics
pub mod sync;

/// Offline queue and optimistic reconciliation
pub mod offline;

/// Expiring read-through cache
pub mod cache;

/// Infinite-list pagination
pub mod pagination;
