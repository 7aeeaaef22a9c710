//! # Drain Metrics
//!
//! Counters describing queue drains, reported by the coordinator.

use crate::offline::queue::ReplayReport;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainMetrics {
    pub total_drains: u64,
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub last_drain_duration: Option<Duration>,
}

impl DrainMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_drain(&mut self, report: &ReplayReport, duration: Duration) {
        self.total_drains = self.total_drains.saturating_add(1);
        self.attempted = self.attempted.saturating_add(report.attempted as u64);
        self.succeeded = self.succeeded.saturating_add(report.succeeded as u64);
        self.failed = self.failed.saturating_add(report.failed.len() as u64);
        self.last_drain_duration = Some(duration);
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.attempted as f64
        }
    }
}
