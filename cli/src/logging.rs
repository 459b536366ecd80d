//! Tracing setup for the terminal client
//!
//! Logs go to reverie.log in the platform log directory. `--tracing` mirrors
//! them to stderr as well.

use config::PathManager;
use std::fs::{File, OpenOptions};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info,reverie_core=debug,reverie_audio=debug,cli=debug";

fn open_log_file() -> Option<File> {
    let path = PathManager::log_file_path()?;
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("[reverie] Failed to create log directory {:?}: {}", parent, e);
            return None;
        }
    }

    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("[reverie] Failed to open log file {:?}: {}", path, e);
            None
        }
    }
}

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered lines reach the file.
pub fn init_logging(mirror_to_stderr: bool) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (file_layer, guard) = match open_log_file() {
        Some(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = mirror_to_stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
    });

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
    {
        eprintln!("[reverie] Failed to set tracing subscriber: {}", e);
    }

    guard
}
