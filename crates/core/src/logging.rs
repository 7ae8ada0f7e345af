//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::LiveConfig;

/// Filter from `RUST_LOG`, falling back to the config's directive
pub fn env_filter(config: &LiveConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter()))
}

/// Install a global fmt subscriber
///
/// Returns `false` if a subscriber was already installed, which is not an
/// error for a library embedded in a host that sets up its own.
pub fn init(config: &LiveConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_target(true)
        .try_init()
        .is_ok()
}
