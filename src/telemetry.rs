//! Logging setup
//!
//! Console output goes to stderr so `sync --json` can own stdout. An optional
//! log file gets the same events without ANSI colors through a non-blocking
//! writer.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter, Layer};

use crate::config::LoggingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => bail!("Unknown log format '{}' (expected compact, pretty or json)", other),
        }
    }
}

/// Keeps the file writer alive and reports the run duration on drop
pub struct TelemetryGuard {
    started: Instant,
    _file_writer: Option<WorkerGuard>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        info!(
            elapsed_secs = self.started.elapsed().as_secs_f64(),
            "repomirror finished"
        );
    }
}

fn env_filter(env_directives: Option<String>, level: &str, verbose: bool) -> Result<EnvFilter> {
    let filter = match env_directives.filter(|d| !d.trim().is_empty()) {
        Some(directives) => EnvFilter::try_new(&directives)
            .with_context(|| format!("Invalid {}: {}", EnvFilter::DEFAULT_ENV, directives))?,
        None => EnvFilter::try_new(level).with_context(|| format!("Invalid log level: {}", level))?,
    };
    Ok(if verbose {
        filter.add_directive(LevelFilter::DEBUG.into())
    } else {
        filter
    })
}

/// Install the global subscriber described by `logging`
///
/// `RUST_LOG` overrides the configured level; `verbose` raises the default
/// level to debug on top of either.
pub fn init(logging: &LoggingConfig, verbose: bool) -> Result<TelemetryGuard> {
    let format = LogFormat::from_str(&logging.format)?;
    let filter = env_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok(), &logging.level, verbose)?;

    let console = match format {
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(logging.color)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(logging.color)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let (file_layer, file_writer) = match logging.file.as_deref() {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_log_file(Path::new(path))?);
            let layer = match format {
                LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
                _ => fmt::layer().with_ansi(false).with_writer(writer).boxed(),
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(TelemetryGuard {
        started: Instant::now(),
        _file_writer: file_writer,
    })
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {:?}", path))
}
