//! In-process advisory lock with read, write and file kinds
//!
//! Compatibility:
//! - any number of read locks may be held together
//! - one write lock may be held, alongside any number of read locks
//! - a file lock excludes every other lock, including another file lock
//!
//! The lock never waits. A conflicting acquire fails immediately and the
//! caller decides whether to retry. It only coordinates callers inside this
//! process; other processes writing the same path are not seen.

use std::collections::BTreeSet;
use std::fmt;

use logwarden_core::NO_ID;
use tracing::warn;

/// Opaque handle returned by a successful acquire
pub type LockId = i64;

/// Kind of lock requested from a [`Lock`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    Read,
    Write,
    File,
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockKind::Read => "read",
            LockKind::Write => "write",
            LockKind::File => "file",
        };
        f.write_str(name)
    }
}

/// Lock compatibility violation or release without a matching acquire.
///
/// Never crosses the `LogFile` API: it is wrapped into a read, write or file
/// error first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("lockType={kind},lock={held}")]
    Conflict { kind: LockKind, held: Held },

    #[error("lockType={kind},id={id},lock={held}")]
    NotHeld { kind: LockKind, id: LockId, held: Held },

    #[error("lock={held}")]
    StillHeld { held: Held },
}

/// The set of locks currently outstanding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Held {
    #[default]
    Unlocked,
    /// Read locks and at most one write lock. Never empty.
    Shared {
        reads: BTreeSet<LockId>,
        write: Option<LockId>,
    },
    Exclusive(LockId),
}

impl Held {
    /// Whether a lock of `kind` may be added to this set
    pub fn admits(&self, kind: LockKind) -> bool {
        match (self, kind) {
            (Held::Unlocked, _) => true,
            (Held::Exclusive(_), _) => false,
            (Held::Shared { .. }, LockKind::File) => false,
            (Held::Shared { write: Some(_), .. }, LockKind::Write) => false,
            (Held::Shared { .. }, _) => true,
        }
    }

    pub fn contains(&self, kind: LockKind, id: LockId) -> bool {
        if id == NO_ID {
            return false;
        }
        match (self, kind) {
            (Held::Shared { reads, .. }, LockKind::Read) => reads.contains(&id),
            (Held::Shared { write, .. }, LockKind::Write) => *write == Some(id),
            (Held::Exclusive(file_id), LockKind::File) => *file_id == id,
            _ => false,
        }
    }

    pub fn contains_kind(&self, kind: LockKind) -> bool {
        match (self, kind) {
            (Held::Shared { reads, .. }, LockKind::Read) => !reads.is_empty(),
            (Held::Shared { write, .. }, LockKind::Write) => write.is_some(),
            (Held::Exclusive(_), LockKind::File) => true,
            _ => false,
        }
    }

    /// Add `id` as a lock of `kind`. The caller checks [`Held::admits`] first.
    fn insert(&mut self, kind: LockKind, id: LockId) {
        match (std::mem::take(self), kind) {
            (Held::Unlocked, LockKind::File) => *self = Held::Exclusive(id),
            (Held::Unlocked, LockKind::Read) => {
                *self = Held::Shared {
                    reads: BTreeSet::from([id]),
                    write: None,
                }
            }
            (Held::Unlocked, LockKind::Write) => {
                *self = Held::Shared {
                    reads: BTreeSet::new(),
                    write: Some(id),
                }
            }
            (Held::Shared { mut reads, write }, LockKind::Read) => {
                reads.insert(id);
                *self = Held::Shared { reads, write };
            }
            (Held::Shared { reads, write: None }, LockKind::Write) => {
                *self = Held::Shared {
                    reads,
                    write: Some(id),
                }
            }
            (held, _) => unreachable!("insert {kind} into incompatible lock set {held}"),
        }
    }

    /// Remove `id` as a lock of `kind`, collapsing to `Unlocked` when empty
    fn remove(&mut self, kind: LockKind, id: LockId) -> bool {
        if !self.contains(kind, id) {
            return false;
        }
        *self = match (std::mem::take(self), kind) {
            (Held::Shared { mut reads, write }, LockKind::Read) => {
                reads.remove(&id);
                Held::shared(reads, write)
            }
            (Held::Shared { reads, .. }, LockKind::Write) => Held::shared(reads, None),
            _ => Held::Unlocked,
        };
        true
    }

    fn shared(reads: BTreeSet<LockId>, write: Option<LockId>) -> Held {
        if reads.is_empty() && write.is_none() {
            Held::Unlocked
        } else {
            Held::Shared { reads, write }
        }
    }
}

impl fmt::Display for Held {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (reads, write, file) = match self {
            Held::Unlocked => (Vec::new(), NO_ID, NO_ID),
            Held::Shared { reads, write } => {
                (reads.iter().copied().collect(), write.unwrap_or(NO_ID), NO_ID)
            }
            Held::Exclusive(id) => (Vec::new(), NO_ID, *id),
        };
        write!(f, "[readIds={:?},writeId={},fileId={}]", reads, write, file)
    }
}

/// Per-file semaphore handing out read, write and file locks
#[derive(Debug)]
pub struct Lock {
    current_id: LockId,
    held: Held,
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

impl Lock {
    pub fn new() -> Self {
        Self {
            current_id: NO_ID,
            held: Held::Unlocked,
        }
    }

    /// Acquire a lock of `kind`, failing at once if it conflicts
    pub fn acquire(&mut self, kind: LockKind) -> Result<LockId, LockError> {
        if !self.held.admits(kind) {
            return Err(LockError::Conflict {
                kind,
                held: self.held.clone(),
            });
        }
        let id = self.next_id();
        self.held.insert(kind, id);
        Ok(id)
    }

    pub fn release(&mut self, kind: LockKind, id: LockId) -> Result<(), LockError> {
        self.assert_releasable(kind, id)?;
        self.held.remove(kind, id);
        Ok(())
    }

    pub fn assert_releasable(&self, kind: LockKind, id: LockId) -> Result<(), LockError> {
        if self.held.contains(kind, id) {
            Ok(())
        } else {
            Err(LockError::NotHeld {
                kind,
                id,
                held: self.held.clone(),
            })
        }
    }

    pub fn is_held(&self, kind: LockKind, id: LockId) -> bool {
        self.held.contains(kind, id)
    }

    /// Whether any lock of `kind` is outstanding
    pub fn is_kind_held(&self, kind: LockKind) -> bool {
        self.held.contains_kind(kind)
    }

    pub fn is_locked(&self) -> bool {
        self.held != Held::Unlocked
    }

    pub fn assert_no_locks_held(&self) -> Result<(), LockError> {
        if self.is_locked() {
            return Err(LockError::StillHeld {
                held: self.held.clone(),
            });
        }
        Ok(())
    }

    pub fn held(&self) -> &Held {
        &self.held
    }

    // Ids only need to be unique among the locks outstanding at one time,
    // so wrapping back to zero is harmless in practice.
    fn next_id(&mut self) -> LockId {
        self.current_id = match self.current_id.checked_add(1) {
            Some(id) => id,
            None => {
                warn!("lock id overflow - setting current id to zero");
                0
            }
        };
        self.current_id
    }
}

impl fmt::Display for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.held, f)
    }
}
