//! logwarden Logs - Shared access to log files written and read concurrently
//!
//! Obtain a [`LogFile`] from a [`Registry`] and use its lock ids to open
//! readers, writers and streams, or to back up, create, delete and move the
//! file while nothing else has it open.

mod error;
mod lock;
mod log_file;
mod monitor;
mod properties;
mod reader_pool;
mod registry;

pub use error::{LogFileError, Result};
pub use lock::{Held, Lock, LockError, LockId, LockKind};
pub use log_file::LogFile;
pub use monitor::{EndState, LogTail, MonitorHandle, MonitorState, OutputEvent, ProcessMonitor};
pub use properties::Properties;
pub use reader_pool::{ReaderHandle, ReaderKey, ReaderPool};
pub use registry::{canonical_path, Registry};

pub use logwarden_core::{NO_ID, NO_WAIT_LIMIT};
