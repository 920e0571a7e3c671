use crate::constants::{DETAILS_LOG_FILE, RUN_DIR_PREFIX};
use crate::error::Result;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// Create the per-run directory `log@YYYYMMDD.HHMMSS` under `base`.
pub fn create_run_dir(base: &Path) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%d.%H%M%S");
    let dir = base.join(format!("{}{}", RUN_DIR_PREFIX, stamp));
    fs::create_dir_all(base)?;
    fs::create_dir(&dir)?;
    Ok(dir)
}

/// Initializes the execution log: JSON lines to `details.log` in `run_dir`
/// plus warnings and errors on stderr.
///
/// Keep the returned guard alive until exit so buffered lines get flushed.
pub fn init_logging(run_dir: &Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::never(run_dir, DETAILS_LOG_FILE);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .json()
        .with_file(true)
        .with_line_number(true)
        .with_writer(non_blocking_writer);

    // stdout carries the progress line and the summary
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::WARN);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("eprocessor=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}
