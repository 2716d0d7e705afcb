//! Structured logging for recdeck using the tracing crate.
//!
//! Logs go to a daily-rotated file under the XDG state directory so they
//! never interfere with the interactive terminal. Only the 7 most recent
//! log files are kept.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;

pub(crate) const LOG_FILE_PREFIX: &str = "recdeck.log";
const MAX_LOG_FILES: usize = 7;

/// Keeps the non-blocking writer alive for the program lifetime.
static APPENDER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initializes file-based logging.
///
/// Log level is controlled by `RUST_LOG` (defaults to "info").
///
/// # Errors
/// - If the log directory cannot be determined or created
/// - If logging was already initialized
pub fn init_logging() -> Result<(), anyhow::Error> {
    let log_dir = get_log_dir()?;

    if let Err(e) = cleanup_old_logs(&log_dir) {
        eprintln!("Warning: Failed to clean up old logs: {e}");
    }

    let file_appender = rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    APPENDER_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Logging already initialized"))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_level(true)
                .with_ansi(false),
        )
        .init();

    tracing::debug!("Logging initialized. Log directory: {}", log_dir.display());
    Ok(())
}

/// Log directory: `$XDG_STATE_HOME/recdeck`, else `~/.local/state/recdeck`.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the log directory cannot be created
pub fn get_log_dir() -> Result<PathBuf, anyhow::Error> {
    let log_dir = match std::env::var("XDG_STATE_HOME") {
        Ok(xdg_state) if !xdg_state.is_empty() => PathBuf::from(xdg_state).join("recdeck"),
        _ => dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
            .join(".local/state/recdeck"),
    };

    fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}

/// Removes rotated log files beyond the newest [`MAX_LOG_FILES`].
fn cleanup_old_logs(log_dir: &Path) -> Result<(), anyhow::Error> {
    let mut log_files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let file_name = path.file_name()?.to_string_lossy().to_string();
            if !is_rotated_log(&file_name) {
                return None;
            }
            let modified = fs::metadata(&path).ok()?.modified().ok()?;
            Some((path, modified))
        })
        .collect();

    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to delete old log file {}: {}", path.display(), e);
        }
    }
    Ok(())
}

/// Matches `recdeck.log.YYYY-MM-DD`.
fn is_rotated_log(file_name: &str) -> bool {
    file_name
        .strip_prefix(LOG_FILE_PREFIX)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|date| date.len() == 10 && date.matches('-').count() == 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn only_dated_logs_count_as_rotated() {
        assert!(is_rotated_log("recdeck.log.2024-05-01"));
        assert!(!is_rotated_log("recdeck.log"));
        assert!(!is_rotated_log("recdeck.db"));
        assert!(!is_rotated_log("other.log.2024-05-01"));
    }

    #[test]
    fn cleanup_keeps_newest_files() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        for day in 1..=9 {
            let path = dir.path().join(format!("recdeck.log.2024-05-0{day}"));
            let file = fs::File::create(&path).unwrap();
            file.set_modified(now - Duration::from_secs(86_400 * (10 - day)))
                .unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        cleanup_old_logs(dir.path()).unwrap();

        assert!(!dir.path().join("recdeck.log.2024-05-01").exists());
        assert!(!dir.path().join("recdeck.log.2024-05-02").exists());
        assert!(dir.path().join("recdeck.log.2024-05-03").exists());
        assert!(dir.path().join("recdeck.log.2024-05-09").exists());
        assert!(dir.path().join("notes.txt").exists());
    }
}
