//! Configuration file parsing for logwarden
//!
//! Supports multiple configuration file formats:
//! - TOML (.toml)
//! - YAML (.yaml, .yml)
//! - JSON (.json)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Detect format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

fn default_backup_suffix() -> String {
    BACKUP_SUFFIX.to_string()
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Settings shared by every log file handed out by a registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFileConfig {
    /// Appended to a log path to name its backup
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,
    /// Pause after delete/rename before verifying the result.
    /// Best effort only: a slow filesystem may still lag behind.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Interval used by monitors polling a growing log
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for LogFileConfig {
    fn default() -> Self {
        Self {
            backup_suffix: default_backup_suffix(),
            settle_delay_ms: default_settle_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl LogFileConfig {
    /// Config without the settle delay, for tests and fast local disks
    pub fn without_settle_delay() -> Self {
        Self {
            settle_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Load config from file, automatically detecting format from extension
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            Error::ConfigError(format!(
                "Unsupported config file extension: {}. Expected .toml, .yaml, .yml, or .json",
                path.display()
            ))
        })?;

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Parse config content with specified format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let config: LogFileConfig = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Find and load a config file from a directory
    pub fn find_and_load(dir: &Path) -> Result<(Self, PathBuf)> {
        for name in CONFIG_FILES {
            let path = dir.join(name);
            if path.exists() {
                let config = Self::load(&path)?;
                return Ok((config, path));
            }
        }
        Err(Error::ConfigError(format!(
            "No config file found in {}. Expected one of: {:?}",
            dir.display(),
            CONFIG_FILES
        )))
    }

    fn validate(&self) -> Result<()> {
        if self.backup_suffix.is_empty() {
            return Err(Error::config("backup_suffix must not be empty"));
        }
        if self.backup_suffix.contains(['/', '\\']) {
            return Err(Error::config(format!(
                "backup_suffix must not contain a path separator: {:?}",
                self.backup_suffix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_config_format_detection() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("YAML"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("yml"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("txt"), None);
    }

    #[test]
    fn test_defaults() {
        let config = LogFileConfig::default();
        assert_eq!(config.backup_suffix, "~");
        assert_eq!(config.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(LogFileConfig::without_settle_delay().settle_delay_ms, 0);
    }

    #[test]
    fn test_config_parse_toml() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(b"settle_delay_ms = 50\nbackup_suffix = \".bak\"\n")
            .unwrap();

        let config = LogFileConfig::load(file.path()).unwrap();
        assert_eq!(config.settle_delay_ms, 50);
        assert_eq!(config.backup_suffix, ".bak");
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_config_parse_yaml() {
        let config = LogFileConfig::parse("poll_interval_ms: 250\n", ConfigFormat::Yaml).unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.backup_suffix, BACKUP_SUFFIX);
    }

    #[test]
    fn test_config_parse_json() {
        let config =
            LogFileConfig::parse(r#"{"settle_delay_ms": 0}"#, ConfigFormat::Json).unwrap();
        assert_eq!(config.settle_delay_ms, 0);
    }

    #[test]
    fn test_config_rejects_bad_suffix() {
        let err = LogFileConfig::parse("backup_suffix = \"\"", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));

        let err = LogFileConfig::parse("backup_suffix = \"/x\"", ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("path separator"));
    }

    #[test]
    fn test_config_not_found() {
        let err = LogFileConfig::load(Path::new("/nonexistent/logwarden.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(_)));
    }

    #[test]
    fn test_config_unsupported_extension() {
        let file = NamedTempFile::with_suffix(".ini").unwrap();
        let err = LogFileConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported config file extension"));
    }

    #[test]
    fn test_find_and_load() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("logwarden.yaml"), "settle_delay_ms: 10\n").unwrap();

        let (config, path) = LogFileConfig::find_and_load(dir.path()).unwrap();
        assert_eq!(config.settle_delay_ms, 10);
        assert!(path.ends_with("logwarden.yaml"));

        let empty = TempDir::new().unwrap();
        assert!(LogFileConfig::find_and_load(empty.path()).is_err());
    }
}
