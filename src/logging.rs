//! Tracing subscriber setup.

use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "READTHROUGH_LOG";

/// Installs a `fmt` subscriber as the global default.
///
/// The filter comes from `READTHROUGH_LOG` when set and valid, otherwise from
/// `fallback` (e.g. `"info"` or `"readthrough=debug"`).
///
/// # Errors
///
/// Returns [`TryInitError`] if a global subscriber is already installed.
pub fn init(fallback: &str) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
}
