//! Logging bootstrap
//!
//! Rolling file output (JSON or text) plus an ANSI stdout layer in text
//! mode. `RUST_LOG` overrides the configured filter.

use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Target of the per-poll trace events emitted by the trackers
pub const POLL_TRACE_TARGET: &str = "finality::poll";

/// Filter directives for `config`
///
/// Per-poll tracing is off unless `enable_tracing` is set.
pub fn filter_directives(config: &AppConfig) -> String {
    if config.enable_tracing {
        config.log_level.clone()
    } else {
        format!("{},{}=off", config.log_level, POLL_TRACE_TARGET)
    }
}

fn file_appender(config: &AppConfig) -> RollingFileAppender {
    match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    }
}

/// Install the global subscriber; keep the guard alive for the process
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    // Writes go through a background thread; dropping the guard flushes it
    let (writer, guard) = tracing_appender::non_blocking(file_appender(config));

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        // Targets stay in JSON so poll traces can be queried
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer)
            .with_ansi(false);
        registry.with(file_layer).init();
    } else {
        // Plain file for the log shippers, colored copy on stdout for the
        // operator; the module target adds nothing to either
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(writer)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    guard
}
