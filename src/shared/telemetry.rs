//! Tracing setup
//!
//! Installs the process-wide `tracing` subscriber. `RUST_LOG` wins over the
//! default filter passed by the caller.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber; returns false if one was already installed
pub fn init_tracing(default_filter: &str) -> bool {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&env_filter))
        .with_target(false)
        .try_init()
        .is_ok()
}
