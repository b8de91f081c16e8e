//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber for the given crate log level.
///
/// `RUST_LOG` takes precedence over `default_level` when set. Calling this
/// more than once is harmless; only the first subscriber is installed.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("futsal_tracker={0},futsal_track={0}", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// `init_tracing` with `debug` when verbose, `info` otherwise.
pub fn init_with_verbosity(verbose: bool) {
    init_tracing(if verbose { "debug" } else { "info" });
}
