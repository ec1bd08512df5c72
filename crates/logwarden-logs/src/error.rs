//! Errors surfaced by `LogFile`
//!
//! The rendered text is meant to be shown as-is in a user dialog, so every
//! variant carries the failing lock id, the log file's path and lock state,
//! and a closing line asking the user to report the problem.

use crate::lock::LockId;

/// Log file error type
#[derive(Debug, thiserror::Error)]
pub enum LogFileError {
    /// Reader open/read failed, or the read lock id is not held
    #[error("{message}\nid={id},logFile={log_file}\nPlease inform the software developer.")]
    Read {
        id: LockId,
        message: String,
        log_file: String,
    },

    /// Writer or stream open/close/flush failed, the write lock id is not
    /// held, or the wrong method was used for the open handle
    #[error("{message}\nid={id},logFile={log_file}\nPlease inform the software developer.")]
    Write {
        id: LockId,
        message: String,
        log_file: String,
    },

    /// Backup, create, delete or move failed
    #[error("{message}\nid={id},logFile={log_file}\nPlease inform the software developer.")]
    File {
        id: LockId,
        message: String,
        log_file: String,
    },
}

/// Result type alias for log file operations
pub type Result<T> = std::result::Result<T, LogFileError>;

impl LogFileError {
    pub fn read<S: Into<String>>(log_file: String, id: LockId, message: S) -> Self {
        LogFileError::Read {
            id,
            message: message.into(),
            log_file,
        }
    }

    pub fn write<S: Into<String>>(log_file: String, id: LockId, message: S) -> Self {
        LogFileError::Write {
            id,
            message: message.into(),
            log_file,
        }
    }

    pub fn file<S: Into<String>>(log_file: String, id: LockId, message: S) -> Self {
        LogFileError::File {
            id,
            message: message.into(),
            log_file,
        }
    }

    /// Lock id involved in the failure, or `NO_ID`
    pub fn id(&self) -> LockId {
        match self {
            LogFileError::Read { id, .. }
            | LogFileError::Write { id, .. }
            | LogFileError::File { id, .. } => *id,
        }
    }

    /// The failure description without the diagnostic trailer
    pub fn message(&self) -> &str {
        match self {
            LogFileError::Read { message, .. }
            | LogFileError::Write { message, .. }
            | LogFileError::File { message, .. } => message,
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, LogFileError::Read { .. })
    }

    pub fn is_write(&self) -> bool {
        matches!(self, LogFileError::Write { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self, LogFileError::File { .. })
    }
}
