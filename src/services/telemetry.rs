//! Tracing setup.
//!
//! env-filter driven, json or pretty output, optional file appender.
//! `RUST_LOG` overrides the configured level.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use super::config::LoggingConfig;

/// Initialize the global subscriber. Returns the appender guard when
/// logging to a file; hold it for the process lifetime.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fortuna={}", config.level)));

    match &config.file {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file = path.file_name().context("log file path has no file name")?;
            let appender = tracing_appender::rolling::daily(dir, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            if config.format == "json" {
                fmt().with_env_filter(filter).with_writer(writer).json().init();
            } else {
                fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
            }
            Ok(Some(guard))
        }
        None => {
            if config.format == "json" {
                fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
            } else {
                fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
            }
            Ok(None)
        }
    }
}
