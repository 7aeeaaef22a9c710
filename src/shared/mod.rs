//! Shared Module
//!
//! Types used by every component of the pipeline: the error taxonomy,
//! configuration, time sources and tracing setup.

/// Shared error types
pub mod error;

/// Pipeline configuration
pub mod config;

/// Millisecond clocks
pub mod clock;

/// Tracing subscriber setup
pub mod telemetry;

/// Re-export commonly used types for convenience
pub use error::{Result, SyncError};
pub use config::{ConfigError, PipelineConfig, PipelineConfigBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
