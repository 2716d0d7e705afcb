//! Display recent log entries from the application.

use anyhow::anyhow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::{get_log_dir, LOG_FILE_PREFIX};

const DEFAULT_LINES: usize = 50;

/// Shows the last lines of the most recent log file.
///
/// # Errors
/// - If the log directory cannot be determined
/// - If log files cannot be read
pub fn handle_logs() -> anyhow::Result<()> {
    let log_dir = get_log_dir()?;

    let Some(log_file) = find_latest_log(&log_dir)? else {
        println!("No log files found in: {}", log_dir.display());
        println!("Run 'recdeck record' or other commands to generate logs.");
        return Ok(());
    };

    let content =
        fs::read_to_string(&log_file).map_err(|e| anyhow!("Failed to read log file: {e}"))?;

    if content.is_empty() {
        println!("Log file is empty: {}", log_file.display());
        return Ok(());
    }

    let lines: Vec<&str> = content.lines().collect();
    let tail = last_lines(&lines, DEFAULT_LINES);

    if tail.len() < lines.len() {
        println!("Showing last {} of {} lines:", tail.len(), lines.len());
    } else {
        println!("Showing all {} lines:", lines.len());
    }
    println!("Full log file at: {}", log_file.display());
    println!();

    for line in tail {
        println!("{line}");
    }
    Ok(())
}

fn last_lines<'a>(lines: &'a [&'a str], count: usize) -> &'a [&'a str] {
    &lines[lines.len().saturating_sub(count)..]
}

/// Most recently modified recdeck log file in `log_dir`, if any.
fn find_latest_log(log_dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    let entries =
        fs::read_dir(log_dir).map_err(|e| anyhow!("Failed to read log directory: {e}"))?;

    let mut latest: Option<(PathBuf, std::time::SystemTime)> = None;
    for entry in entries {
        let path = entry
            .map_err(|e| anyhow!("Failed to read directory entry: {e}"))?
            .path();

        if !path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX))
        {
            continue;
        }

        let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) else {
            continue;
        };
        if latest.as_ref().map_or(true, |(_, newest)| modified > *newest) {
            latest = Some((path, modified));
        }
    }

    Ok(latest.map(|(path, _)| path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn keeps_only_the_tail() {
        let lines = ["a", "b", "c"];
        assert_eq!(last_lines(&lines, 2), &["b", "c"]);
        assert_eq!(last_lines(&lines, 10), &["a", "b", "c"]);
    }

    #[test]
    fn picks_newest_log_and_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("recdeck.log.2024-01-01");
        let new = dir.path().join("recdeck.log.2024-01-02");
        fs::write(&old, "old").unwrap();
        fs::write(&new, "new").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let past = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(past)
            .unwrap();

        assert_eq!(find_latest_log(dir.path()).unwrap(), Some(new));
    }

    #[test]
    fn empty_directory_has_no_log() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_latest_log(dir.path()).unwrap(), None);
    }
}
