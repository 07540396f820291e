//! JSON subscriber filtered through `RUST_LOG`.
//!
//! Denied decisions log at `debug`, committed store mutations at `info` and
//! refused mutations at `warn`. `info` therefore shows every change to roles
//! and assignments without per-request noise.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Install the process-wide subscriber.
///
/// Returns `false` when one was already installed, so tests can call this
/// from every case.
pub fn init() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(false)
        .with_target(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(default_filter = DEFAULT_FILTER, "json subscriber installed");
    }
    installed
}
