//! Logging setup
//!
//! Events go to stderr so stdout stays clean for `--format json|yaml|id`.
//!
//! # Environment
//! - `RUST_LOG`: filter directive, overrides `-v` (e.g. `RUST_LOG=ferp=debug`)

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter for a `-v` count
fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize the global subscriber
///
/// Safe to call more than once; later calls are ignored.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .with_line_number(verbosity > 1)
        .try_init();
}

/// Initialize logging for tests
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
