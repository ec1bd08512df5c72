//! Guarded access to one log file
//!
//! A `LogFile` is handed out by a [`Registry`](crate::Registry), one per
//! absolute path. Every public method runs under the instance's monitor, and
//! the finer grained [`Lock`] coordinates long-lived sessions:
//!
//! - readers hold a read lock between `open_reader` and `close_reader`
//! - the writer, the input stream, the output stream and `open_for_writing`
//!   each hold the single write lock
//! - backup, create, delete and move take the file lock for their duration
//!
//! Conflicting requests fail immediately instead of waiting.

use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, warn};

use logwarden_core::{constants, LogFileConfig, NO_ID};

use crate::error::{LogFileError, Result};
use crate::lock::{Lock, LockId, LockKind};
use crate::properties::Properties;
use crate::reader_pool::{ReaderKey, ReaderPool};

#[cfg(windows)]
const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
const LINE_SEPARATOR: &str = "\n";

/// The handle held by the write lock owner, if any
#[derive(Default)]
enum WriteHandle {
    #[default]
    Closed,
    Writer(BufWriter<File>),
    InputStream(BufReader<File>),
    OutputStream(BufWriter<File>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Writer,
    InputStream,
    OutputStream,
}

impl WriteHandle {
    fn stream(&self) -> Option<Stream> {
        match self {
            WriteHandle::Closed => None,
            WriteHandle::Writer(_) => Some(Stream::Writer),
            WriteHandle::InputStream(_) => Some(Stream::InputStream),
            WriteHandle::OutputStream(_) => Some(Stream::OutputStream),
        }
    }

    fn close(self) -> io::Result<()> {
        match self {
            WriteHandle::Writer(mut writer) | WriteHandle::OutputStream(mut writer) => {
                writer.flush()
            }
            WriteHandle::InputStream(_) | WriteHandle::Closed => Ok(()),
        }
    }
}

/// Message for closing a handle with the wrong method
fn close_usage(open: Option<Stream>) -> &'static str {
    match open {
        Some(Stream::Writer) => "Must use close_writer() when opened with open_writer()",
        Some(Stream::InputStream) => {
            "Must use close_input_stream() when opened with open_input_stream()"
        }
        Some(Stream::OutputStream) => {
            "Must use close_output_stream() when opened with open_output_stream()"
        }
        None => "Must use close_for_writing() when opened with open_for_writing()",
    }
}

struct State {
    lock: Lock,
    handle: WriteHandle,
    backed_up: bool,
}

/// A log file shared by the threads of this process
pub struct LogFile {
    path: PathBuf,
    backup_path: PathBuf,
    settle_delay: Duration,
    readers: Arc<ReaderPool>,
    state: Mutex<State>,
}

impl LogFile {
    pub(crate) fn new(path: PathBuf, config: &LogFileConfig, readers: Arc<ReaderPool>) -> Self {
        let backup_path = constants::backup_path(&path, &config.backup_suffix);
        Self {
            path,
            backup_path,
            settle_delay: config.settle_delay(),
            readers,
            state: Mutex::new(State {
                lock: Lock::new(),
                handle: WriteHandle::Closed,
                backed_up: false,
            }),
        }
    }

    // ---- structural operations -------------------------------------------

    /// Back up the file the first time this is called on this instance.
    ///
    /// Later calls do nothing and return `false`, so a session never rotates
    /// away the log it started. A failed backup may be retried.
    pub fn backup_once(&self) -> Result<bool> {
        let mut state = self.state.lock();
        if state.backed_up {
            return Ok(false);
        }
        let backed_up = self.backup_locked(&mut state)?;
        state.backed_up = true;
        Ok(backed_up)
    }

    /// Replace the backup file with the current file.
    ///
    /// Returns `false` when there is nothing to back up, or when
    /// [`backup_once`](Self::backup_once) already ran on this instance so the
    /// previous session's backup is kept. The old backup is only removed when
    /// the current file exists.
    pub fn backup(&self) -> Result<bool> {
        let mut state = self.state.lock();
        if state.backed_up {
            return Ok(false);
        }
        self.backup_locked(&mut state)
    }

    fn backup_locked(&self, state: &mut State) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        let file_id = match state.lock.acquire(LockKind::File) {
            Ok(id) => id,
            Err(e) => return Err(self.file_error(state, NO_ID, e.to_string())),
        };
        let result = self.rename_to_backup(state, file_id);
        self.release_quietly(state, LockKind::File, file_id);
        result
    }

    fn rename_to_backup(&self, state: &State, file_id: LockId) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }

        if self.backup_path.exists() {
            debug!("{} exists, deleting", self.backup_path.display());
            if let Err(e) = fs::remove_file(&self.backup_path) {
                warn!(
                    "Unable to delete backup log file {}: {}",
                    self.backup_path.display(),
                    e
                );
                if self.backup_path.exists() {
                    return Err(self.file_error(
                        state,
                        file_id,
                        format!(
                            "Unable to delete backup log file {}: {}",
                            self.backup_path.display(),
                            e
                        ),
                    ));
                }
            }
        }

        let renamed = fs::rename(&self.path, &self.backup_path);
        if renamed.is_err() || self.path.exists() || !self.backup_path.exists() {
            let mut message = format!(
                "Unable to rename {} to {}",
                self.path.display(),
                self.backup_path.display()
            );
            if let Err(e) = renamed {
                message.push_str(&format!(": {}", e));
            }
            if cfg!(windows) {
                message.push_str(
                    "\nIf either of these files is open in another program, close that program.",
                );
            }
            warn!("{}", message);
            return Err(self.file_error(state, file_id, message));
        }

        debug!(
            "Backed up {} to {}",
            self.path.display(),
            self.backup_path.display()
        );
        Ok(true)
    }

    /// Create an empty file. Returns `false` if it already exists.
    pub fn create(&self) -> Result<bool> {
        let mut state = self.state.lock();
        if self.path.exists() {
            return Ok(false);
        }
        let file_id = match state.lock.acquire(LockKind::File) {
            Ok(id) => id,
            Err(e) => return Err(self.file_error(&state, NO_ID, e.to_string())),
        };

        let result = if self.path.exists() {
            Ok(false)
        } else {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
            {
                Ok(_) if self.path.exists() => {
                    debug!("Created {}", self.path.display());
                    Ok(true)
                }
                Ok(_) => Err(self.file_error(
                    &state,
                    file_id,
                    format!("Unable to create {}", self.path.display()),
                )),
                Err(e) => Err(self.file_error(
                    &state,
                    file_id,
                    format!("Unable to create {}: {}", self.path.display(), e),
                )),
            }
        };

        self.release_quietly(&mut state, LockKind::File, file_id);
        result
    }

    /// Delete the file and wait for the deletion to show. Returns `false` if
    /// there was no file.
    pub fn delete(&self) -> Result<bool> {
        let mut state = self.state.lock();
        if !self.path.exists() {
            return Ok(false);
        }
        let file_id = match state.lock.acquire(LockKind::File) {
            Ok(id) => id,
            Err(e) => return Err(self.file_error(&state, NO_ID, e.to_string())),
        };
        if !self.path.exists() {
            self.release_quietly(&mut state, LockKind::File, file_id);
            return Ok(false);
        }

        let removed = fs::remove_file(&self.path);
        self.settle();
        let result = if self.path.exists() {
            let mut message = format!("Unable to delete {}", self.path.display());
            if let Err(e) = removed {
                message.push_str(&format!(": {}", e));
            }
            Err(self.file_error(&state, file_id, message))
        } else {
            debug!("Deleted {}", self.path.display());
            Ok(true)
        };

        self.release_quietly(&mut state, LockKind::File, file_id);
        result
    }

    /// Rename this file onto `target`, backing up the target first.
    ///
    /// The source is locked before the target. Two threads moving two files
    /// onto each other at the same time will deadlock.
    pub fn move_to(&self, target: &LogFile) -> Result<bool> {
        let mut state = self.state.lock();
        if std::ptr::eq(self, target) || self.path == target.path {
            return Err(self.file_error(
                &state,
                NO_ID,
                format!("Cannot move {} onto itself", self.path.display()),
            ));
        }
        if !self.path.exists() {
            return Ok(false);
        }
        let file_id = match state.lock.acquire(LockKind::File) {
            Ok(id) => id,
            Err(e) => return Err(self.file_error(&state, NO_ID, e.to_string())),
        };
        if !self.path.exists() {
            self.release_quietly(&mut state, LockKind::File, file_id);
            return Ok(false);
        }

        if let Err(e) = target.backup() {
            self.release_quietly(&mut state, LockKind::File, file_id);
            return Err(e);
        }

        let mut target_state = target.state.lock();
        let target_id = match target_state.lock.acquire(LockKind::File) {
            Ok(id) => id,
            Err(e) => {
                self.release_quietly(&mut state, LockKind::File, file_id);
                return Err(self.file_error(
                    &state,
                    NO_ID,
                    format!("{}: {}", target.path.display(), e),
                ));
            }
        };

        let renamed = fs::rename(&self.path, &target.path);
        self.settle();
        let result = if renamed.is_ok() && !self.path.exists() {
            debug!("Moved {} to {}", self.path.display(), target.path.display());
            Ok(true)
        } else {
            let mut message = format!(
                "Unable to move {} to {}",
                self.path.display(),
                target.path.display()
            );
            if let Err(e) = renamed {
                message.push_str(&format!(": {}", e));
            }
            Err(self.file_error(&state, file_id, message))
        };

        self.release_quietly(&mut state, LockKind::File, file_id);
        target.release_quietly(&mut target_state, LockKind::File, target_id);
        result
    }

    // ---- writing ---------------------------------------------------------

    /// Open a buffered text writer appending to the file
    pub fn open_writer(&self) -> Result<LockId> {
        self.open_for(Some(Stream::Writer))
    }

    /// Open the whole file for reading under the write lock, so that no
    /// writer changes it while it is loaded
    pub fn open_input_stream(&self) -> Result<LockId> {
        self.open_for(Some(Stream::InputStream))
    }

    /// Open the file for replacing its contents
    pub fn open_output_stream(&self) -> Result<LockId> {
        self.open_for(Some(Stream::OutputStream))
    }

    /// Take the write lock without opening anything.
    ///
    /// Fails at once if the write lock is taken. A caller that loops on this
    /// until it succeeds waits forever if the holder never closes.
    pub fn open_for_writing(&self) -> Result<LockId> {
        self.open_for(None)
    }

    fn open_for(&self, stream: Option<Stream>) -> Result<LockId> {
        let mut state = self.state.lock();
        let write_id = match state.lock.acquire(LockKind::Write) {
            Ok(id) => id,
            Err(e) => return Err(self.write_error(&state, NO_ID, e.to_string())),
        };

        let opened = match stream {
            None => Ok(WriteHandle::Closed),
            Some(Stream::Writer) => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map(|file| WriteHandle::Writer(BufWriter::new(file))),
            Some(Stream::InputStream) => File::open(&self.path)
                .map(|file| WriteHandle::InputStream(BufReader::new(file))),
            Some(Stream::OutputStream) => File::create(&self.path)
                .map(|file| WriteHandle::OutputStream(BufWriter::new(file))),
        };

        match opened {
            Ok(handle) => {
                state.handle = handle;
                Ok(write_id)
            }
            Err(e) => {
                self.release_quietly(&mut state, LockKind::Write, write_id);
                Err(self.write_error(
                    &state,
                    NO_ID,
                    format!("{}: {}", self.path.display(), e),
                ))
            }
        }
    }

    pub fn close_writer(&self, write_id: LockId) -> bool {
        self.close_for(write_id, Some(Stream::Writer))
    }

    pub fn close_input_stream(&self, write_id: LockId) -> bool {
        self.close_for(write_id, Some(Stream::InputStream))
    }

    pub fn close_output_stream(&self, write_id: LockId) -> bool {
        self.close_for(write_id, Some(Stream::OutputStream))
    }

    pub fn close_for_writing(&self, write_id: LockId) -> bool {
        self.close_for(write_id, None)
    }

    /// Close the open handle and release the write lock.
    ///
    /// Failures are logged rather than returned: the caller's work is done by
    /// now. A handle that fails to flush still gives up its lock.
    fn close_for(&self, write_id: LockId, expected: Option<Stream>) -> bool {
        let mut state = self.state.lock();
        let open = state.handle.stream();
        if open != expected {
            error!("{}", self.write_error(&state, write_id, close_usage(open)));
            return false;
        }
        if let Err(e) = state.lock.assert_releasable(LockKind::Write, write_id) {
            error!("{}", self.write_error(&state, write_id, e.to_string()));
            return false;
        }

        let handle = std::mem::take(&mut state.handle);
        let closed = handle.close();
        self.release_quietly(&mut state, LockKind::Write, write_id);
        match closed {
            Ok(()) => true,
            Err(e) => {
                error!("{}", self.write_error(&state, write_id, e.to_string()));
                false
            }
        }
    }

    pub fn write(&self, text: &str, write_id: LockId) -> Result<()> {
        self.with_handle(write_id, "write", "open_writer", |handle| match handle {
            WriteHandle::Writer(writer) => Some(writer.write_all(text.as_bytes())),
            _ => None,
        })
    }

    pub fn new_line(&self, write_id: LockId) -> Result<()> {
        self.with_handle(write_id, "new_line", "open_writer", |handle| match handle {
            WriteHandle::Writer(writer) => Some(writer.write_all(LINE_SEPARATOR.as_bytes())),
            _ => None,
        })
    }

    pub fn flush(&self, write_id: LockId) -> Result<()> {
        self.with_handle(write_id, "flush", "open_writer() or open_output_stream", |handle| match handle {
            WriteHandle::Writer(writer) | WriteHandle::OutputStream(writer) => {
                Some(writer.flush())
            }
            _ => None,
        })
    }

    /// Load properties through the open input stream
    pub fn load(&self, write_id: LockId) -> Result<Properties> {
        self.with_handle(write_id, "load", "open_input_stream", |handle| match handle {
            WriteHandle::InputStream(reader) => Some(Properties::read_from(reader)),
            _ => None,
        })
    }

    /// Store properties through the open output stream
    pub fn store(&self, properties: &Properties, write_id: LockId) -> Result<()> {
        self.with_handle(write_id, "store", "open_output_stream", |handle| match handle {
            WriteHandle::OutputStream(writer) => Some(properties.write_to(writer, None)),
            _ => None,
        })
    }

    /// Run `op` on the write handle if `write_id` holds the write lock.
    /// `op` returns `None` when the handle is the wrong kind for `name`.
    fn with_handle<T>(
        &self,
        write_id: LockId,
        name: &str,
        opener: &str,
        op: impl FnOnce(&mut WriteHandle) -> Option<io::Result<T>>,
    ) -> Result<T> {
        let mut state = self.state.lock();
        if !state.lock.is_held(LockKind::Write, write_id) {
            return Err(self.write_error(&state, write_id, "write lock is not held"));
        }
        let outcome = op(&mut state.handle);
        match outcome {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(self.write_error(&state, write_id, e.to_string())),
            None => Err(self.write_error(
                &state,
                write_id,
                format!("Must open with {}() to be able to call {}()", opener, name),
            )),
        }
    }

    // ---- reading ---------------------------------------------------------

    /// Take a read lock and open a pooled reader at the start of the file
    pub fn open_reader(&self) -> Result<LockId> {
        let mut state = self.state.lock();
        let read_id = match state.lock.acquire(LockKind::Read) {
            Ok(id) => id,
            Err(e) => return Err(self.read_error(&state, NO_ID, e.to_string())),
        };

        let key = ReaderKey::new(&self.path, read_id);
        if let Err(e) = self.readers.open_reader(key, &self.path) {
            self.release_quietly(&mut state, LockKind::Read, read_id);
            return Err(self.read_error(
                &state,
                read_id,
                format!("{}: {}", self.path.display(), e),
            ));
        }
        Ok(read_id)
    }

    /// Next line for this reader, or `None` at the current end of file
    pub fn read_line(&self, read_id: LockId) -> Result<Option<String>> {
        Ok(self.read_line_with_end(read_id)?.map(|(line, _)| line))
    }

    /// Next line and whether it was terminated. An unterminated line is the
    /// part of a line the writer has produced so far.
    pub fn read_line_with_end(&self, read_id: LockId) -> Result<Option<(String, bool)>> {
        let state = self.state.lock();
        if !state.lock.is_held(LockKind::Read, read_id) {
            return Err(self.read_error(&state, read_id, "read lock is not held"));
        }
        let Some(handle) = self.readers.get(&ReaderKey::new(&self.path, read_id)) else {
            return Err(self.read_error(&state, read_id, "no reader is open for this id"));
        };
        let line = handle.lock().read_line_with_end();
        line.map_err(|e| self.read_error(&state, read_id, e.to_string()))
    }

    /// Close the pooled reader and release the read lock.
    ///
    /// Returns `false`, after logging, if `read_id` was not held.
    pub fn close_reader(&self, read_id: LockId) -> bool {
        let mut state = self.state.lock();
        if let Err(e) = state.lock.assert_releasable(LockKind::Read, read_id) {
            error!("{}", self.read_error(&state, read_id, e.to_string()));
            return false;
        }
        let key = ReaderKey::new(&self.path, read_id);
        match self.readers.get(&key) {
            Some(handle) => handle.lock().close(),
            None => warn!("No pooled reader for {}", key),
        }
        self.release_quietly(&mut state, LockKind::Read, read_id);
        true
    }

    // ---- introspection ---------------------------------------------------

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }

    pub fn absolute_path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// File name without its directory
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_open(&self, kind: LockKind, id: LockId) -> bool {
        self.state.lock().lock.is_held(kind, id)
    }

    /// Diagnostic: true if no lock of any kind is held; logs the state otherwise
    pub fn no_locks(&self) -> bool {
        let state = self.state.lock();
        match state.lock.assert_no_locks_held() {
            Ok(()) => true,
            Err(e) => {
                error!("{}: {}", self.path.display(), e);
                false
            }
        }
    }

    // ---- helpers ---------------------------------------------------------

    fn settle(&self) {
        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }
    }

    fn release_quietly(&self, state: &mut State, kind: LockKind, id: LockId) {
        if let Err(e) = state.lock.release(kind, id) {
            error!(
                "Failed to release {} lock on {}: {}",
                kind,
                self.path.display(),
                e
            );
        }
    }

    fn describe(&self, state: &State) -> String {
        format!("[path={},lock={}]", self.path.display(), state.lock)
    }

    fn read_error<S: Into<String>>(&self, state: &State, id: LockId, message: S) -> LogFileError {
        LogFileError::read(self.describe(state), id, message)
    }

    fn write_error<S: Into<String>>(&self, state: &State, id: LockId, message: S) -> LogFileError {
        LogFileError::write(self.describe(state), id, message)
    }

    fn file_error<S: Into<String>>(&self, state: &State, id: LockId, message: S) -> LogFileError {
        LogFileError::file(self.describe(state), id, message)
    }
}

impl fmt::Display for LogFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.write_str(&self.describe(&state))
    }
}

impl fmt::Debug for LogFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogFile")
            .field("path", &self.path)
            .field("backup_path", &self.backup_path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn log_file(dir: &TempDir, name: &str) -> LogFile {
        LogFile::new(
            dir.path().join(name),
            &LogFileConfig::without_settle_delay(),
            Arc::new(ReaderPool::new()),
        )
    }

    #[test]
    fn test_writer_round_trip() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "tilta.log");

        let write_id = log.open_writer().unwrap();
        log.write("X", write_id).unwrap();
        log.new_line(write_id).unwrap();
        log.flush(write_id).unwrap();
        assert!(log.close_writer(write_id));

        let read_id = log.open_reader().unwrap();
        assert_eq!(log.read_line(read_id).unwrap().as_deref(), Some("X"));
        assert_eq!(log.read_line(read_id).unwrap(), None);
        assert!(log.close_reader(read_id));
        assert!(log.no_locks());
    }

    #[test]
    fn test_writer_appends() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "append.log");
        std::fs::write(log.absolute_path(), "existing\n").unwrap();

        let write_id = log.open_writer().unwrap();
        log.write("more", write_id).unwrap();
        log.new_line(write_id).unwrap();
        assert!(log.close_writer(write_id));

        let content = std::fs::read_to_string(log.absolute_path()).unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), vec!["existing", "more"]);
    }

    #[test]
    fn test_write_requires_held_id() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "a.log");

        let write_id = log.open_writer().unwrap();
        let err = log.write("x", write_id + 1).unwrap_err();
        assert!(err.is_write());
        assert_eq!(err.id(), write_id + 1);
        assert!(err.to_string().ends_with("Please inform the software developer."));
        assert!(log.close_writer(write_id));

        assert!(log.flush(write_id).is_err());
    }

    #[test]
    fn test_single_write_lock() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "a.log");

        let write_id = log.open_writer().unwrap();
        assert!(log.open_output_stream().unwrap_err().is_write());
        assert!(log.open_for_writing().is_err());
        assert!(log.close_writer(write_id));
        assert!(log.open_for_writing().is_ok());
    }

    #[test]
    fn test_wrong_close_method_keeps_lock() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "a.log");

        let write_id = log.open_writer().unwrap();
        assert!(!log.close_output_stream(write_id));
        assert!(!log.close_input_stream(write_id));
        assert!(!log.close_for_writing(write_id));
        assert!(log.is_open(LockKind::Write, write_id));
        assert!(log.close_writer(write_id));
        assert!(!log.is_open(LockKind::Write, write_id));

        let lock_only = log.open_for_writing().unwrap();
        assert!(!log.close_writer(lock_only));
        assert!(log.close_for_writing(lock_only));
        assert!(log.no_locks());
    }

    #[test]
    fn test_write_on_wrong_handle() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "a.log");

        let write_id = log.open_for_writing().unwrap();
        let err = log.write("x", write_id).unwrap_err();
        assert!(err.message().contains("write()"));
        assert!(log.flush(write_id).is_err());
        assert!(log.close_for_writing(write_id));
    }

    #[test]
    fn test_properties_store_and_load() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "state.edf");

        let mut props = Properties::new();
        props.set("Setup.DatasetName", "BB");
        props.set("Setup.Axis", "dual");

        let out_id = log.open_output_stream().unwrap();
        log.store(&props, out_id).unwrap();
        assert!(log.close_output_stream(out_id));

        let in_id = log.open_input_stream().unwrap();
        assert_eq!(log.load(in_id).unwrap(), props);
        assert!(log.write("x", in_id).is_err());
        assert!(log.close_input_stream(in_id));
    }

    #[test]
    fn test_input_stream_on_missing_file_releases_lock() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "missing.edf");

        assert!(log.open_input_stream().unwrap_err().is_write());
        assert!(log.no_locks());
    }

    #[test]
    fn test_open_reader_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "missing.log");

        let err = log.open_reader().unwrap_err();
        assert!(err.is_read());
        assert!(log.no_locks());
    }

    #[test]
    fn test_read_line_with_end_reports_partial_line() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "a.log");
        std::fs::write(log.absolute_path(), "Finished reas").unwrap();

        let read_id = log.open_reader().unwrap();
        assert_eq!(
            log.read_line_with_end(read_id).unwrap(),
            Some(("Finished reas".to_string(), false))
        );
        assert!(log.close_reader(read_id));
    }

    #[test]
    fn test_read_line_requires_held_id() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "a.log");
        log.create().unwrap();

        let err = log.read_line(42).unwrap_err();
        assert!(err.is_read());
        assert_eq!(err.id(), 42);
        assert!(!log.close_reader(42));
    }

    #[test]
    fn test_readers_coexist_with_writer() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "a.log");
        log.create().unwrap();

        let r1 = log.open_reader().unwrap();
        let w = log.open_writer().unwrap();
        let r2 = log.open_reader().unwrap();
        assert_ne!(r1, r2);

        log.write("line", w).unwrap();
        log.new_line(w).unwrap();
        log.flush(w).unwrap();
        assert_eq!(log.read_line(r1).unwrap().as_deref(), Some("line"));
        assert_eq!(log.read_line(r2).unwrap().as_deref(), Some("line"));

        assert!(log.delete().unwrap_err().is_file());
        assert!(log.close_reader(r1));
        assert!(log.close_reader(r2));
        assert!(log.close_writer(w));
        assert!(log.delete().unwrap());
    }

    #[test]
    fn test_create() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "new.log");

        assert!(log.create().unwrap());
        assert!(log.exists());
        assert_eq!(std::fs::metadata(log.absolute_path()).unwrap().len(), 0);
        assert!(!log.create().unwrap());
        assert!(log.no_locks());
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "gone.log");

        assert!(!log.delete().unwrap());
        log.create().unwrap();
        assert!(log.delete().unwrap());
        assert!(!log.exists());
        assert!(log.no_locks());
    }

    #[test]
    fn test_backup_replaces_previous_backup() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "tilta.log");

        assert!(!log.backup().unwrap());

        std::fs::write(log.absolute_path(), "first\n").unwrap();
        assert!(log.backup().unwrap());
        assert!(!log.exists());

        std::fs::write(log.absolute_path(), "second\n").unwrap();
        assert!(log.backup().unwrap());
        assert_eq!(std::fs::read_to_string(log.backup_path()).unwrap(), "second\n");
        assert!(log.backup_path().to_string_lossy().ends_with("tilta.log~"));
    }

    #[test]
    fn test_backup_once_renames_once() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "tilta.log");
        std::fs::write(log.absolute_path(), "session one\n").unwrap();

        assert!(log.backup_once().unwrap());
        std::fs::write(log.absolute_path(), "session two\n").unwrap();
        assert!(!log.backup_once().unwrap());

        assert!(log.exists());
        assert_eq!(
            std::fs::read_to_string(log.backup_path()).unwrap(),
            "session one\n"
        );
    }

    #[test]
    fn test_backup_after_backup_once_keeps_previous_session() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "tilta.log");
        std::fs::write(log.absolute_path(), "previous session\n").unwrap();

        assert!(log.backup_once().unwrap());
        std::fs::write(log.absolute_path(), "this session\n").unwrap();
        assert!(!log.backup().unwrap());

        assert_eq!(
            std::fs::read_to_string(log.backup_path()).unwrap(),
            "previous session\n"
        );
        assert_eq!(
            std::fs::read_to_string(log.absolute_path()).unwrap(),
            "this session\n"
        );
    }

    #[test]
    fn test_move_onto_backed_up_target_keeps_its_backup() {
        let dir = TempDir::new().unwrap();
        let source = log_file(&dir, "source.log");
        let target = log_file(&dir, "target.log");
        std::fs::write(target.absolute_path(), "previous session\n").unwrap();
        assert!(target.backup_once().unwrap());

        std::fs::write(source.absolute_path(), "new\n").unwrap();
        assert!(source.move_to(&target).unwrap());
        assert_eq!(
            std::fs::read_to_string(target.backup_path()).unwrap(),
            "previous session\n"
        );
        assert_eq!(std::fs::read_to_string(target.absolute_path()).unwrap(), "new\n");
    }

    #[test]
    fn test_backup_once_with_nothing_to_back_up() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "tilta.log");

        assert!(!log.backup_once().unwrap());
        std::fs::write(log.absolute_path(), "late\n").unwrap();
        assert!(!log.backup_once().unwrap());
        assert!(!log.backup_path().exists());
    }

    #[test]
    fn test_backup_blocked_by_reader() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "a.log");
        log.create().unwrap();

        let read_id = log.open_reader().unwrap();
        let err = log.backup().unwrap_err();
        assert!(err.is_file());
        assert!(err.to_string().contains(&format!("readIds=[{}]", read_id)));
        assert!(log.close_reader(read_id));
        assert!(log.backup().unwrap());
    }

    #[test]
    fn test_move_backs_up_target() {
        let dir = TempDir::new().unwrap();
        let source = log_file(&dir, "source.log");
        let target = log_file(&dir, "target.log");
        std::fs::write(source.absolute_path(), "new\n").unwrap();
        std::fs::write(target.absolute_path(), "old\n").unwrap();

        assert!(source.move_to(&target).unwrap());
        assert!(!source.exists());
        assert_eq!(std::fs::read_to_string(target.absolute_path()).unwrap(), "new\n");
        assert_eq!(std::fs::read_to_string(target.backup_path()).unwrap(), "old\n");
        assert!(source.no_locks());
        assert!(target.no_locks());
    }

    #[test]
    fn test_move_missing_source() {
        let dir = TempDir::new().unwrap();
        let source = log_file(&dir, "source.log");
        let target = log_file(&dir, "target.log");
        std::fs::write(target.absolute_path(), "keep\n").unwrap();

        assert!(!source.move_to(&target).unwrap());
        assert!(!target.backup_path().exists());
    }

    #[test]
    fn test_move_blocked_by_target_reader() {
        let dir = TempDir::new().unwrap();
        let source = log_file(&dir, "source.log");
        let target = log_file(&dir, "target.log");
        source.create().unwrap();
        target.create().unwrap();

        let read_id = target.open_reader().unwrap();
        assert!(source.move_to(&target).unwrap_err().is_file());
        assert!(source.exists());
        assert!(source.no_locks());
        assert!(target.close_reader(read_id));
    }

    #[test]
    fn test_move_onto_itself() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "a.log");
        log.create().unwrap();

        assert!(log.move_to(&log).unwrap_err().is_file());
        assert!(log.exists());
    }

    #[test]
    fn test_introspection() {
        let dir = TempDir::new().unwrap();
        let log = log_file(&dir, "tilta.log");

        assert_eq!(log.name(), "tilta.log");
        assert!(log.absolute_path().is_absolute());
        assert!(log.last_modified().is_none());
        log.create().unwrap();
        assert!(log.last_modified().is_some());
        assert!(log.to_string().contains("tilta.log"));
    }
}
