//! Development-time tracing for debugging engine runs.
//!
//! Diagnostics only: controlled via `RUST_LOG`, written to stderr, never part
//! of the command output contract.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber for development logging.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset. Output: stderr, compact.
///
/// # Example
/// ```bash
/// RUST_LOG=taskloop=debug cargo run -- run --catalog catalog.json
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
