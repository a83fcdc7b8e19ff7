//! Diagnostic logging setup
//!
//! Diagnostics go to stderr so that stdout stays clean for JSON and log
//! output. The filter comes from `KERFUFFLE_LOG`, then `RUST_LOG`, then
//! [`DEFAULT_FILTER`].

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directives
pub const LOG_ENV_VAR: &str = "KERFUFFLE_LOG";

pub const DEFAULT_FILTER: &str = "warn";

/// Build the filter from the environment.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. `verbose` raises the default to `debug`.
///
/// A second call is a no-op.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        env_filter()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
