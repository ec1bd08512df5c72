//! One `LogFile` per canonical path
//!
//! Every caller asking for the same file gets the same instance, which is
//! what makes the in-process lock meaningful. Instances live until the
//! registry is reset.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use logwarden_core::{constants, LogFileConfig, Result};

use crate::log_file::LogFile;
use crate::reader_pool::ReaderPool;

static GLOBAL: Lazy<Registry> = Lazy::new(|| Registry::new(LogFileConfig::default()));

struct Inner {
    files: HashMap<PathBuf, Arc<LogFile>>,
    readers: Arc<ReaderPool>,
}

impl Inner {
    fn new() -> Self {
        Self {
            files: HashMap::new(),
            readers: Arc::new(ReaderPool::new()),
        }
    }
}

/// Keyed instance registry for log files
pub struct Registry {
    config: LogFileConfig,
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new(config: LogFileConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner::new()),
        }
    }

    /// Process-wide registry using the default configuration
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    pub fn config(&self) -> &LogFileConfig {
        &self.config
    }

    /// The instance for `path`, created on first use
    pub fn get(&self, path: impl AsRef<Path>) -> Result<Arc<LogFile>> {
        let key = canonical_path(path.as_ref())?;

        if let Some(log) = self.inner.read().files.get(&key) {
            return Ok(Arc::clone(log));
        }

        let mut inner = self.inner.write();
        let readers = Arc::clone(&inner.readers);
        let log = inner.files.entry(key).or_insert_with_key(|key| {
            debug!("Registering log file {}", key.display());
            Arc::new(LogFile::new(key.clone(), &self.config, readers))
        });
        Ok(Arc::clone(log))
    }

    /// The instance for `file_name` inside `dir`
    pub fn get_in(&self, dir: impl AsRef<Path>, file_name: &str) -> Result<Arc<LogFile>> {
        self.get(dir.as_ref().join(file_name))
    }

    /// The log written by `process` for `axis` inside `dir`, e.g. `tilta.log`.
    /// Pass an empty axis for single-axis processes.
    pub fn get_process_log(
        &self,
        dir: impl AsRef<Path>,
        process: &str,
        axis: &str,
    ) -> Result<Arc<LogFile>> {
        self.get_in(dir, &constants::log_file_name(process, axis))
    }

    /// Forget every instance and start a fresh reader pool.
    ///
    /// Handles already given out keep working but are no longer shared with
    /// later lookups.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        debug!("Resetting registry with {} log files", inner.files.len());
        *inner = Inner::new();
    }

    pub fn len(&self) -> usize {
        self.inner.read().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reader_pool(&self) -> Arc<ReaderPool> {
        Arc::clone(&self.inner.read().readers)
    }
}

/// Absolute form of `path` with `.` and `..` resolved lexically.
///
/// Symlinks are not followed and the file need not exist.
pub fn canonical_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
