//! Structured logging setup.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

/// Maps a configured level name to a filter directive.
///
/// Unknown names fall back to `info`.
#[must_use]
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Calling this more than once is
/// harmless; later calls leave the first subscriber in place.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(level)));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        tracing::debug!("logging already initialised");
    }
}
