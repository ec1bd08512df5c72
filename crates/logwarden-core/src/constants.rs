//! Constants and default values for logwarden

use std::path::PathBuf;

/// Lock id returned when no lock was acquired
pub const NO_ID: i64 = -1;

/// Marks call paths that never wait for a lock to free up
pub const NO_WAIT_LIMIT: i64 = -1;

/// Character appended to a log path to name its rotated-out previous version
pub const BACKUP_SUFFIX: &str = "~";

/// Extension used for process log files
pub const LOG_EXT: &str = ".log";

/// Default logwarden home directory name
pub const LOGWARDEN_DIR: &str = ".logwarden";

/// Delay after a delete or rename before checking that the filesystem caught up
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

/// Default interval between polls of a growing log
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Default config file names to search for (in priority order)
pub const CONFIG_FILES: &[&str] = &[
    "logwarden.toml",
    "logwarden.yaml",
    "logwarden.yml",
    "logwarden.json",
];

/// Get the logwarden home directory
pub fn logwarden_home() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(LOGWARDEN_DIR))
        .unwrap_or_else(|| PathBuf::from(LOGWARDEN_DIR))
}

/// Get the backup path for a log file
pub fn backup_path(path: &std::path::Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

/// Get the log file name for a process, e.g. `tilt` + `a` -> `tilta.log`
pub fn log_file_name(process: &str, axis: &str) -> String {
    format!("{}{}{}", process, axis, LOG_EXT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_logwarden_home() {
        let home = logwarden_home();
        assert!(home.to_string_lossy().contains(".logwarden"));
    }

    #[test]
    fn test_backup_path() {
        let path = backup_path(Path::new("/data/run/tilta.log"), BACKUP_SUFFIX);
        assert_eq!(path, PathBuf::from("/data/run/tilta.log~"));
    }

    #[test]
    fn test_log_file_name() {
        assert_eq!(log_file_name("tilt", "a"), "tilta.log");
        assert_eq!(log_file_name("processchunks", ""), "processchunks.log");
    }
}
