//! Pool of reusable line readers keyed by (path, read lock id)
//!
//! Closed handles are never dropped from the pool. The next open reuses the
//! first closed handle before allocating a new one, so the pool grows to the
//! largest number of readers ever open at the same time and stays there.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::lock::LockId;

/// Identifies the reader opened for one read lock on one file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReaderKey {
    path: PathBuf,
    id: LockId,
}

impl ReaderKey {
    pub fn new(path: &Path, id: LockId) -> Self {
        Self {
            path: path.to_path_buf(),
            id,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn id(&self) -> LockId {
        self.id
    }
}

impl fmt::Display for ReaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.path.display(), self.id)
    }
}

/// A buffered line reader that can be closed and reopened on another file
#[derive(Debug)]
pub struct ReaderHandle {
    id: usize,
    key: Option<ReaderKey>,
    reader: Option<BufReader<File>>,
}

impl ReaderHandle {
    fn new(id: usize) -> Self {
        Self {
            id,
            key: None,
            reader: None,
        }
    }

    fn open(&mut self, path: &Path) -> io::Result<()> {
        let file = File::open(path)?;
        self.reader = Some(BufReader::new(file));
        Ok(())
    }

    /// Position of this handle in its pool; stable for the handle's life
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn key(&self) -> Option<&ReaderKey> {
        self.key.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Read the next line without its line terminator.
    ///
    /// Returns `None` at the current end of file. A file that keeps growing
    /// can be read again later from where this call stopped. The last piece
    /// before end of file is returned even without a terminator.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.read_line_with_end()?.map(|(line, _)| line))
    }

    /// Like [`read_line`](Self::read_line), also reporting whether the line
    /// ended with a terminator. An unterminated piece may still be growing.
    pub fn read_line_with_end(&mut self) -> io::Result<Option<(String, bool)>> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "reader is closed"))?;

        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let terminated = line.ends_with('\n');
        if terminated {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some((line, terminated)))
    }

    pub fn close(&mut self) {
        self.reader = None;
    }
}

#[derive(Default)]
struct PoolInner {
    handles: Vec<Arc<Mutex<ReaderHandle>>>,
    by_key: HashMap<ReaderKey, Arc<Mutex<ReaderHandle>>>,
}

/// Reader handles shared by every log file of one registry
#[derive(Default)]
pub struct ReaderPool {
    inner: Mutex<PoolInner>,
}

impl ReaderPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path` under `key`, recycling a closed handle when one exists
    pub fn open_reader(&self, key: ReaderKey, path: &Path) -> io::Result<Arc<Mutex<ReaderHandle>>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        // A handle that is locked right now is being read, so it is open.
        let reusable = inner
            .handles
            .iter()
            .find(|handle| handle.try_lock().map_or(false, |h| !h.is_open()))
            .cloned();

        if let Some(handle) = reusable {
            let old_key = {
                let mut reader = handle.lock();
                reader.open(path)?;
                debug!("Reusing reader {} for {}", reader.id, key);
                reader.key.replace(key.clone())
            };
            if let Some(old_key) = old_key {
                inner.by_key.remove(&old_key);
            }
            inner.by_key.insert(key, Arc::clone(&handle));
            return Ok(handle);
        }

        let mut reader = ReaderHandle::new(inner.handles.len());
        reader.open(path)?;
        debug!("Opening new reader {} for {}", reader.id, key);
        reader.key = Some(key.clone());

        let handle = Arc::new(Mutex::new(reader));
        inner.handles.push(Arc::clone(&handle));
        inner.by_key.insert(key, Arc::clone(&handle));
        Ok(handle)
    }

    pub fn get(&self, key: &ReaderKey) -> Option<Arc<Mutex<ReaderHandle>>> {
        self.inner.lock().by_key.get(key).cloned()
    }

    /// Number of handles ever created
    pub fn len(&self) -> usize {
        self.inner.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn open_count(&self) -> usize {
        self.inner
            .lock()
            .handles
            .iter()
            .filter(|handle| handle.lock().is_open())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_lines_strip_terminators() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.log", "one\r\ntwo\nthree");

        let pool = ReaderPool::new();
        let handle = pool.open_reader(ReaderKey::new(&path, 0), &path).unwrap();
        let mut reader = handle.lock();

        assert_eq!(reader.read_line().unwrap().as_deref(), Some("one"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("two"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("three"));
        assert_eq!(reader.read_line().unwrap(), None);
    }

    #[test]
    fn test_reader_sees_appended_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "grow.log", "first\n");

        let pool = ReaderPool::new();
        let handle = pool.open_reader(ReaderKey::new(&path, 0), &path).unwrap();
        assert_eq!(handle.lock().read_line().unwrap().as_deref(), Some("first"));
        assert_eq!(handle.lock().read_line().unwrap(), None);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"second\n").unwrap();

        assert_eq!(handle.lock().read_line().unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_closed_handle_is_reused_and_rekeyed() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.log", "a\n");
        let b = write_file(&dir, "b.log", "b\n");

        let pool = ReaderPool::new();
        let first_key = ReaderKey::new(&a, 0);
        let first = pool.open_reader(first_key.clone(), &a).unwrap();
        let first_id = first.lock().id();
        first.lock().close();

        let second_key = ReaderKey::new(&b, 1);
        let second = pool.open_reader(second_key.clone(), &b).unwrap();

        assert_eq!(second.lock().id(), first_id);
        assert_eq!(pool.len(), 1);
        assert!(pool.get(&first_key).is_none());
        assert_eq!(second.lock().key(), Some(&second_key));
        assert_eq!(second.lock().read_line().unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_open_handles_are_not_reused() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.log", "a\n");

        let pool = ReaderPool::new();
        let first = pool.open_reader(ReaderKey::new(&path, 0), &path).unwrap();
        let second = pool.open_reader(ReaderKey::new(&path, 1), &path).unwrap();

        assert_ne!(first.lock().id(), second.lock().id());
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.open_count(), 2);

        // The pool never shrinks
        first.lock().close();
        second.lock().close();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.open_count(), 0);
    }

    #[test]
    fn test_open_missing_file_fails_without_registering() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.log");

        let pool = ReaderPool::new();
        let key = ReaderKey::new(&path, 0);
        assert!(pool.open_reader(key.clone(), &path).is_err());
        assert!(pool.is_empty());
        assert!(pool.get(&key).is_none());
    }

    #[test]
    fn test_unterminated_piece_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.log", "done\nFinished reas");

        let pool = ReaderPool::new();
        let handle = pool.open_reader(ReaderKey::new(&path, 0), &path).unwrap();
        let mut reader = handle.lock();

        assert_eq!(
            reader.read_line_with_end().unwrap(),
            Some(("done".to_string(), true))
        );
        assert_eq!(
            reader.read_line_with_end().unwrap(),
            Some(("Finished reas".to_string(), false))
        );
        assert_eq!(reader.read_line_with_end().unwrap(), None);
    }

    #[test]
    fn test_read_from_closed_handle_fails() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.log", "a\n");

        let pool = ReaderPool::new();
        let handle = pool.open_reader(ReaderKey::new(&path, 0), &path).unwrap();
        handle.lock().close();
        assert!(handle.lock().read_line().is_err());
    }
}
