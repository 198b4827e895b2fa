//! Tracing setup: stdout always, plus an operator log file when configured

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Open `path` for appending, creating missing parent directories
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Background writer for the log file; lines are flushed when the guard drops
pub fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let file = open_log_file(path)?;
    Ok(tracing_appender::non_blocking(file))
}

/// Install the global subscriber
///
/// Keep the returned guard alive for as long as the process logs, or the
/// tail of the file is lost.
pub fn init(file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .try_init()
        .context("Failed to initialize logging")?;

    if let Some(path) = file {
        tracing::info!("[LOG] Writing operator log to {}", path.display());
    }
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::io::Write;

    #[test]
    fn test_file_writer_creates_directories_and_appends() {
        Jail::expect_with(|_| {
            let path = Path::new("logs/nested/board.log");

            let (mut writer, guard) = file_writer(path).map_err(|e| e.to_string())?;
            writer.write_all(b"first line\n").map_err(|e| e.to_string())?;
            drop(guard);

            let (mut writer, guard) = file_writer(path).map_err(|e| e.to_string())?;
            writer.write_all(b"second line\n").map_err(|e| e.to_string())?;
            drop(guard);

            let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
            assert_eq!(content, "first line\nsecond line\n");
            Ok(())
        });
    }

    #[test]
    fn test_file_writer_reports_unusable_path() {
        Jail::expect_with(|_| {
            fs::write("taken", "not a directory").map_err(|e| e.to_string())?;
            let err = file_writer(Path::new("taken/board.log")).unwrap_err();
            assert!(err.to_string().contains("taken"));
            Ok(())
        });
    }
}
