//! Veilnet logging setup
//!
//! `RUST_LOG` wins over the default directive when set.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default directive for binaries embedding the lease set crates
pub const DEFAULT_DIRECTIVE: &str = "info,veilnet_leaseset=debug";

/// Install the global subscriber. Returns false if one was already set.
pub fn init(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .is_ok()
}

/// Subscriber for tests: writes through the test harness capture and
/// tolerates repeated calls
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_for_tests();
        init_for_tests();
        assert!(!init(DEFAULT_DIRECTIVE));
        tracing::info!("logging initialized");
    }
}
