//! Tracing initialization.
//!
//! Follows the `tracing_subscriber::fmt().with_env_filter(...)` convention
//! used by the fleet hub binary this was cross-referenced against: `RUST_LOG`
//! wins when set, otherwise the verbosity count from `-v`/`-vv`/`-vvv`
//! selects a default filter. `--json-logs` switches the formatter to
//! newline-delimited JSON for shipping to a log aggregator.
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `verbosity` follows clap's `ArgAction::Count` convention: 0 = info,
/// 1 = debug, 2+ = trace, scoped to this crate; `RUST_LOG` always overrides.
pub fn init(verbosity: u8, json: bool) {
    let default_filter = match verbosity {
        0 => "info",
        1 => "info,tarka_agent=debug",
        _ => "debug,tarka_agent=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
