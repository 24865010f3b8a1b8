//! Subscriber setup.
//!
//! Console output goes to stderr because stdout carries the JSON-lines sink.
//! Every run also writes to a daily-rolled file in the app log directory.

use crate::config::{AnalyticsConfig, LogLevel, LoggingConfig};
use crate::paths::AppDirs;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "reelmark.log";

/// Replaces the configured filter when set, e.g. `REELMARK_LOG=reelmark_tracker=trace`.
pub const LOG_FILTER_ENV: &str = "REELMARK_LOG";

/// Crates whose per-event logs `verbose_logging` turns on.
const VERBOSE_TARGETS: [&str; 2] = ["reelmark_tracker", "reelmark_plugin"];

/// Keeps the file writer flushing; drop it last.
pub struct LoggingGuard {
    _file: WorkerGuard,
    log_dir: PathBuf,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

pub fn init_logging(
    logging: &LoggingConfig,
    analytics: &AnalyticsConfig,
    dirs: &AppDirs,
) -> Result<LoggingGuard, LoggingError> {
    let log_dir = dirs.log_dir().to_path_buf();
    fs::create_dir_all(&log_dir).map_err(|source| LoggingError::CreateDirectory {
        path: log_dir.clone(),
        source,
    })?;

    let directives = match std::env::var(LOG_FILTER_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => filter_directives(logging.level, analytics.verbose_logging),
    };
    let filter = EnvFilter::try_new(&directives)
        .map_err(|source| LoggingError::ParseFilter { directives, source })?;

    let file_stem = logging.file_name.as_deref().unwrap_or(DEFAULT_LOG_FILE);
    prune_rotated_logs(&log_dir, file_stem, logging.max_log_files.max(1))?;
    let (file, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, file_stem));

    let writer = if logging.stdout {
        BoxMakeWriter::new(std::io::stderr.and(file))
    } else {
        BoxMakeWriter::new(file)
    };

    fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .try_init()
        .map_err(LoggingError::SubscriberInstall)?;

    Ok(LoggingGuard {
        _file: guard,
        log_dir,
    })
}

/// Filter string for the configured level. Verbose mode lets classifier and
/// plugin debug logs through even when the global level is quieter.
pub fn filter_directives(level: LogLevel, verbose: bool) -> String {
    let mut directives = level.as_filter_directive().to_string();
    if verbose && matches!(level, LogLevel::Info | LogLevel::Warn | LogLevel::Error) {
        for target in VERBOSE_TARGETS {
            directives.push_str(&format!(",{target}=debug"));
        }
    }
    directives
}

/// Delete rotated files (`<stem>.<date>`) beyond the newest `keep`.
/// Returns how many were removed.
fn prune_rotated_logs(dir: &Path, file_stem: &str, keep: usize) -> Result<usize, LoggingError> {
    let prefix = format!("{file_stem}.");
    let entries = fs::read_dir(dir).map_err(|source| LoggingError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut rotated: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&prefix))
        })
        .map(|entry| entry.path())
        .collect();

    // Date suffixes sort chronologically.
    rotated.sort_unstable_by(|a, b| b.cmp(a));
    let stale = rotated.split_off(keep.min(rotated.len()));

    for path in &stale {
        fs::remove_file(path).map_err(|source| LoggingError::Prune {
            path: path.clone(),
            source,
        })?;
    }
    Ok(stale.len())
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid log filter {directives:?}: {source}")]
    ParseFilter {
        directives: String,
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to install tracing subscriber: {0}")]
    SubscriberInstall(Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to list log directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to remove rotated log {path}: {source}")]
    Prune {
        path: PathBuf,
        source: std::io::Error,
    },
}
