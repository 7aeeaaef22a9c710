//! # Connectivity
//!
//! - `network_monitor.rs`: edge-triggered online/offline monitor
//! - `metrics.rs`: counters for queue drains

pub mod metrics;
pub mod network_monitor;

pub use metrics::DrainMetrics;
pub use network_monitor::{ConnectivityMonitor, Subscription};
