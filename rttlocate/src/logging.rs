//! Logging infrastructure for rttlocate.
//!
//! All diagnostics go to standard error as atomic single-line records, so
//! that interleaved output from concurrent workers stays readable. The
//! filter honors `RUST_LOG` and defaults to `info`.

use std::io::{self, IsTerminal};

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Writes compact single-line events to stderr. ANSI colors are enabled
/// only when stderr is a terminal. Safe to call once per process; a second
/// call reports the error rather than panicking so tests can race on it.
///
/// # Errors
///
/// Returns a message if a global subscriber is already installed.
pub fn init_logging() -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .compact()
        .try_init()
        .map_err(|e| e.to_string())
}
