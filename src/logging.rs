//! Logging initialization.
//!
//! The library only emits `tracing` events; the binary installs a
//! subscriber here. Output goes to stderr so stdout stays free for
//! `identify` results, and `RUST_LOG` overrides the configured level.

use crate::config::{Config, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber at `level`, as JSON lines or human-readable.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Level and format from `[logging]`, with `--verbose` forcing at least
/// `debug` and `--json-logs` forcing JSON.
pub fn init_from_config(config: &Config, verbose: bool, json_logs: bool) {
    let (level, json) = resolve(config, verbose, json_logs);
    init(&level, json);
}

fn resolve(config: &Config, verbose: bool, json_logs: bool) -> (String, bool) {
    let configured = config.logging.level.to_ascii_lowercase();
    let level = if verbose && configured != "trace" {
        "debug".to_string()
    } else {
        configured
    };
    (level, json_logs || config.logging.format == LogFormat::Json)
}
