//! Ambient logging setup. `options.debug` raises the default filter
//! from `info` to `debug`; otherwise this reads `RUST_LOG` like any other
//! `tracing-subscriber` program.

use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global tracing subscriber. Call once, at process start.
pub fn init(debug: bool) {
    let _ = LogTracer::init();

    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
