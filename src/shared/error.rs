//! Shared Error Types
//!
//! This module defines the error taxonomy of the reconciliation pipeline.
//!
//! # Error Categories
//!
//! - `RemoteFailure` - the remote call rejected; recovered locally by rollback
//!   or by keeping the action queued
//! - `DurabilityFailure` - a durable storage read or write failed
//! - `InvalidInput` - caller-supplied data was invalid; never retried
//! - `SerializationError` - JSON encoding or decoding failed
//!
//! # Usage
//!
//! ```rust
//! use dashsync::shared::error::SyncError;
//!
//! let error = SyncError::invalid_input("kind", "action kind cannot be empty");
//! assert!(!error.is_transient());
//! ```
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync + Clone` so a single failure can be
//! reported to several observers.
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors produced by the reconciliation pipeline
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The remote call settled with a failure
    #[error("Remote call failed: {message}")]
    RemoteFailure {
        /// Human-readable error message
        message: String,
    },

    /// Durable storage could not be read or written
    #[error("Durable storage error: {message}")]
    DurabilityFailure {
        /// Human-readable error message
        message: String,
    },

    /// Caller-supplied data was invalid
    #[error("Invalid input in field '{field}': {message}")]
    InvalidInput {
        /// The offending field
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },
}

impl SyncError {
    /// Create a new remote failure
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteFailure {
            message: message.into(),
        }
    }

    /// Create a new durability failure
    pub fn durability(message: impl Into<String>) -> Self {
        Self::DurabilityFailure {
            message: message.into(),
        }
    }

    /// Create a new invalid input error
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Whether a later attempt may succeed without caller intervention
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RemoteFailure { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        Self::durability(format!("SQLite error: {}", err))
    }
}
