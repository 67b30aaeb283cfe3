//! Log output for the CLI.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--debug`.
/// Logs go to stderr so `list --json` output stays parseable.
pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,migrata={default_level}")));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(debug)
        .compact();

    // Ignore a second installation, e.g. from tests.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}
