//! Structured logging
//!
//! `RemoteLogger` ships each entry to the log collector and mirrors it to
//! the local `tracing` subscriber installed by the binary. The local
//! subscriber writes to stdout and to a rolling file under the log
//! directory, so history survives while the collector is unreachable.

mod remote;

pub use remote::{LogLevel, RemoteLogger};

use crate::error::{AppError, Result};
use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Log files are named `kite_app.<date>.log`
pub const LOG_FILE_PREFIX: &str = "kite_app";

/// Rotated files kept on disk
const MAX_LOG_FILES: usize = 5;

/// Open the daily rolling log file in `dir`, creating the directory
pub fn file_appender(dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(dir)?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .map_err(|e| AppError::Config(format!("Cannot open log directory {:?}: {}", dir, e)))
}

/// Plain-text layer for the log file
fn file_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
}

/// Install the process-wide local subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    let (writer, guard) = tracing_appender::non_blocking(file_appender(log_dir)?);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kite_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer(writer))
        .init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn log_files(dir: &Path) -> Vec<std::path::PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[test]
    fn test_file_layer_writes_to_log_dir() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        let appender = file_appender(&log_dir).unwrap();
        let subscriber = tracing_subscriber::registry().with(file_layer(appender));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Order status job completed");
            tracing::warn!("No active session found");
        });

        let files = log_files(&log_dir);
        assert_eq!(files.len(), 1);

        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(LOG_FILE_PREFIX));
        assert!(name.ends_with(".log"));

        let contents = fs::read_to_string(&files[0]).unwrap();
        assert!(contents.contains("Order status job completed"));
        assert!(contents.contains("WARN"));
        assert!(!contents.contains('\u{1b}'));
    }

    #[test]
    fn test_unusable_log_dir() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        assert!(file_appender(&blocker).is_err());
    }
}
