//! Telemetry and logging initialization.
//!
//! Sets up structured logging with tracing, as pretty or JSON output on
//! stdout or as a non-blocking file writer.

use crate::config::LoggingConfig;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// The file writer flushes on drop, so the guard lives for the whole process
static LOG_GUARD: Mutex<Option<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(None);

/// Initialize logging from the node's logging section.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    match &config.log_file {
        Some(path) => init_telemetry_with_file(&config.level, path, config.format == "json"),
        None => init_telemetry(&config.level, config.format == "json"),
    }
}

/// Build the filter. `RUST_LOG` wins over the configured level.
fn filter(log_level: &str) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(log_level)?),
    }
}

/// Initialize telemetry on stdout.
pub fn init_telemetry(log_level: &str, json_format: bool) -> anyhow::Result<()> {
    let filter = filter(log_level)?;

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .try_init()?;
    }

    Ok(())
}

/// Initialize telemetry with file output.
pub fn init_telemetry_with_file(
    log_level: &str,
    log_file: &std::path::Path,
    json_format: bool,
) -> anyhow::Result<()> {
    let filter = filter(log_level)?;

    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(non_blocking))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .try_init()?;
    }

    if let Ok(mut g) = LOG_GUARD.lock() {
        *g = Some(guard);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails_cleanly() {
        // Only one subscriber can be global; later calls return an error
        let _ = init_telemetry("info", false);
        assert!(init_telemetry("info", true).is_err());
    }
}
