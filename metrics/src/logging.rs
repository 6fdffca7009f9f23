//! Log output for the command-line clients.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, defaulting to `info`
/// (`debug` when `verbose`). Does nothing if a subscriber is already set.
pub fn init_tracing(verbose: bool) {
    let level = if verbose {
        "wpt_results=debug,wpt_metrics=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
