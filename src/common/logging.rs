//! Logging and tracing configuration
//!
//! Compact stderr output for the CLI, plus a non-blocking file copy of
//! every run under the platform data directory. The file rotates daily and
//! only the most recent `MAX_LOG_FILES` days are kept.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths;

const LOG_PREFIX: &str = "sandbox";
const LOG_SUFFIX: &str = "log";
const MAX_LOG_FILES: usize = 7;

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sandbox=info,warn"))
}

fn daily_appender(log_dir: &Path) -> Option<RollingFileAppender> {
    std::fs::create_dir_all(log_dir).ok()?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix(LOG_SUFFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)
        .ok()
}

/// Initialize tracing for the CLI
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the duration of `main`.
pub fn init_cli() -> Option<WorkerGuard> {
    let Some(appender) = paths::log_dir().as_deref().and_then(daily_appender) else {
        tracing_subscriber::registry()
            .with(default_filter())
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .init();
        return None;
    };

    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    // Also log to stderr so warnings show up next to command output
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    tracing_subscriber::registry()
        .with(default_filter())
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Some(guard)
}

/// File name the daily appender uses for `date`
fn log_file_name(date: chrono::NaiveDate) -> String {
    format!("{LOG_PREFIX}.{}.{LOG_SUFFIX}", date.format("%Y-%m-%d"))
}

/// Get the path to today's log file
pub fn log_path() -> Option<PathBuf> {
    paths::log_dir().map(|d| d.join(log_file_name(chrono::Utc::now().date_naive())))
}
