//! Tracing subscriber setup.
//!
//! Logs go to stderr (pretty or JSON) so command output on stdout stays
//! clean. When enabled, a daily rolling JSON file is also written under
//! `.phasegate/logs/`.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::phasegate_config::{LogFormat, LoggingSection};

/// Keeps the file writer flushing until dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Build the filter: `--verbose` wins, then RUST_LOG, then the config level.
pub fn build_filter(settings: &LoggingSection, verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&settings.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber.
///
/// `log_dir` enables the rolling file layer when `settings.file` is set;
/// the directory is created if missing.
pub fn init(settings: &LoggingSection, verbose: bool, log_dir: Option<&Path>) -> Result<LogGuard> {
    let filter = build_filter(settings, verbose);

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(match settings.format {
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    });

    let mut guard = None;
    if settings.file
        && let Some(dir) = log_dir
    {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
        let appender = tracing_appender::rolling::daily(dir, "phasegate.log");
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(LogGuard { _file: guard })
}
