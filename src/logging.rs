//! File logging. The terminal belongs to the UI, so events go to a daily
//! rolling file under the user data directory.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::{fmt, prelude::*};

pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::INFO;

/// `<data_dir>/dtree/logs`, or `./logs` when there is no data directory.
pub fn log_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("dtree"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("logs")
}

/// Parse a `--log-level` value, falling back to the default.
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    level
        .and_then(|l| l.parse::<LevelFilter>().ok())
        .unwrap_or(DEFAULT_LOG_LEVEL)
}

/// Install the global subscriber. The returned guard must outlive the app or
/// buffered lines are lost. Returns `None` if the log directory is unusable.
pub fn init(level: LevelFilter) -> Option<WorkerGuard> {
    let dir = log_dir();
    if std::fs::create_dir_all(&dir).is_err() {
        let _ = tracing_subscriber::registry().try_init();
        return None;
    }

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(14)
        .filename_prefix("dtree")
        .filename_suffix("log")
        .build(&dir)
        .ok()?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = Targets::new()
        .with_default(level)
        .with_target("mio", LevelFilter::WARN);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(filter);

    let _ = tracing_subscriber::registry().with(layer).try_init();
    Some(guard)
}
