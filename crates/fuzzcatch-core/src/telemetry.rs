//! Global tracing initialisation for the fuzzcatch binary.
//!
//! Fatal pipeline conditions surface as single-line errors at the default
//! level; full GraphQL request and response bodies are only emitted at
//! debug level (`--verbose` or `RUST_LOG=debug`).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// * `json` — emit newline-delimited JSON log lines for log aggregation.
/// * `verbose` — default to `debug` instead of `info` when `RUST_LOG` is
///   not set.
///
/// Safe to call more than once; only the first call takes effect.
pub fn init_tracing(json: bool, verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}
