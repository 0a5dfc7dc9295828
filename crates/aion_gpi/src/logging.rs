//! `tracing` subscriber setup.
//!
//! The adapter only emits `tracing` events; installing a subscriber is left to
//! the process that embeds it. [`init_logging`] installs the usual one: fmt
//! output to stderr, filtered by a directive such as `info` or
//! `aion_gpi=debug,warn`.

use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber filtered by `filter`.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes. An unparsable directive falls back to `info`.
pub fn init_logging(filter: &str) -> bool {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}
