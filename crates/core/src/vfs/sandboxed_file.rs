//! One broker-provided OS file, adapted to the storage engine's I/O primitives.
//!
//! The file handle arrives already opened. The engine "opens" it by moving it
//! into the active slot and "closes" it by moving it back, so the same handle
//! can be bound again for the next transaction.

use std::fs::File;
use std::io;
use std::sync::{Mutex, MutexGuard};

use super::VfsError;
use crate::params::AccessRights;

/// SQLite lock levels, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LockMode {
    None,
    Shared,
    Reserved,
    Pending,
    Exclusive,
}

impl LockMode {
    /// Map an engine lock constant, clamping unknown values to `Exclusive`.
    pub fn from_raw(level: i32) -> Self {
        match level {
            i32::MIN..=0 => LockMode::None,
            1 => LockMode::Shared,
            2 => LockMode::Reserved,
            3 => LockMode::Pending,
            _ => LockMode::Exclusive,
        }
    }
}

/// Sync request flags passed down from the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncFlags {
    pub data_only: bool,
    pub full: bool,
}

#[derive(Debug)]
struct FileState {
    underlying_file: Option<File>,
    opened_file: Option<File>,
    lock_mode: LockMode,
}

/// A file whose open/close lifecycle is controlled by the engine but whose
/// OS handle is owned here.
///
/// At most one of the underlying and opened slots holds the handle. Locking
/// is purely in-process bookkeeping: no OS-level lock is ever taken.
#[derive(Debug)]
pub struct SandboxedFile {
    state: Mutex<FileState>,
    access_rights: AccessRights,
}

impl SandboxedFile {
    pub fn new(file: Option<File>, access_rights: AccessRights) -> Self {
        Self {
            state: Mutex::new(FileState { underlying_file: file, opened_file: None, lock_mode: LockMode::None }),
            access_rights,
        }
    }

    fn state(&self) -> MutexGuard<'_, FileState> {
        // A panic while holding the lock cannot leave the slots half-moved.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn access_rights(&self) -> AccessRights {
        self.access_rights
    }

    /// Bound for I/O by the engine.
    pub fn is_valid(&self) -> bool {
        self.state().opened_file.is_some()
    }

    /// A handle exists in either slot.
    pub fn has_file(&self) -> bool {
        let state = self.state();
        state.opened_file.is_some() || state.underlying_file.is_some()
    }

    pub fn lock_mode(&self) -> LockMode {
        self.state().lock_mode
    }

    /// Move the handle into the active slot.
    pub fn open(&self) -> Result<(), VfsError> {
        let mut state = self.state();
        if state.opened_file.is_some() {
            return Err(VfsError::CantOpen);
        }
        let file = state.underlying_file.take().ok_or(VfsError::CantOpen)?;
        state.opened_file = Some(file);
        Ok(())
    }

    /// Move the handle back so a later `open` can rebind it.
    pub fn close(&self) {
        let mut state = self.state();
        if let Some(file) = state.opened_file.take() {
            state.underlying_file = Some(file);
        }
        state.lock_mode = LockMode::None;
    }

    /// Fill `buf` from `offset`.
    ///
    /// On a short read the unread tail of `buf` is zeroed and
    /// [`VfsError::ShortRead`] is returned.
    pub fn read(&self, buf: &mut [u8], offset: u64) -> Result<(), VfsError> {
        let state = self.state();
        let file = state.opened_file.as_ref().ok_or(VfsError::Read)?;

        let mut total = 0usize;
        while total < buf.len() {
            match read_at(file, &mut buf[total..], offset + total as u64) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!("sandboxed read failed at offset {}: {}", offset, e);
                    return Err(VfsError::Read);
                }
            }
        }

        if total < buf.len() {
            buf[total..].fill(0);
            return Err(VfsError::ShortRead);
        }
        Ok(())
    }

    /// Write all of `buf` at `offset`, growing the file if needed.
    pub fn write(&self, buf: &[u8], offset: u64) -> Result<(), VfsError> {
        if !self.access_rights.is_writable() {
            return Err(VfsError::Write);
        }
        let state = self.state();
        let file = state.opened_file.as_ref().ok_or(VfsError::Write)?;

        let mut total = 0usize;
        while total < buf.len() {
            match write_at(file, &buf[total..], offset + total as u64) {
                Ok(0) => return Err(VfsError::Write),
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::StorageFull => return Err(VfsError::Full),
                Err(e) => {
                    tracing::debug!("sandboxed write failed at offset {}: {}", offset, e);
                    return Err(VfsError::Write);
                }
            }
        }
        Ok(())
    }

    pub fn truncate(&self, size: u64) -> Result<(), VfsError> {
        let state = self.state();
        let file = state.opened_file.as_ref().ok_or(VfsError::Truncate)?;
        file.set_len(size).map_err(|_| VfsError::Truncate)
    }

    pub fn sync(&self, flags: SyncFlags) -> Result<(), VfsError> {
        let state = self.state();
        let file = state.opened_file.as_ref().ok_or(VfsError::Fsync)?;
        let result = if flags.data_only && !flags.full { file.sync_data() } else { file.sync_all() };
        result.map_err(|_| VfsError::Fsync)
    }

    pub fn file_size(&self) -> Result<u64, VfsError> {
        let state = self.state();
        let file = state.opened_file.as_ref().ok_or(VfsError::Fstat)?;
        file.metadata().map(|m| m.len()).map_err(|_| VfsError::Fstat)
    }

    /// Length of whichever slot holds the handle. Used by access checks made
    /// while the engine has the file closed.
    pub fn current_len(&self) -> Result<u64, VfsError> {
        let state = self.state();
        let file = state.opened_file.as_ref().or(state.underlying_file.as_ref()).ok_or(VfsError::Fstat)?;
        file.metadata().map(|m| m.len()).map_err(|_| VfsError::Fstat)
    }

    /// Discard the contents. The path is not ours to unlink, so a delete
    /// request from the engine empties the file instead.
    pub fn delete_contents(&self) -> Result<(), VfsError> {
        if !self.access_rights.is_writable() {
            return Err(VfsError::Delete);
        }
        let state = self.state();
        let file = state.opened_file.as_ref().or(state.underlying_file.as_ref()).ok_or(VfsError::Delete)?;
        file.set_len(0).map_err(|_| VfsError::Delete)
    }

    /// Raise the lock level. Requests at or below the current level are no-ops.
    pub fn lock(&self, mode: LockMode) -> Result<(), VfsError> {
        let mut state = self.state();
        if mode > state.lock_mode {
            state.lock_mode = mode;
        }
        Ok(())
    }

    /// Lower the lock level. Requests at or above the current level are no-ops.
    pub fn unlock(&self, mode: LockMode) -> Result<(), VfsError> {
        let mut state = self.state();
        if mode < state.lock_mode {
            state.lock_mode = mode;
        }
        Ok(())
    }

    pub fn check_reserved_lock(&self) -> Result<bool, VfsError> {
        Ok(self.state().lock_mode >= LockMode::Reserved)
    }

    pub fn shm_map(&self, _region: i32, _size: i32, _extend: bool) -> Result<(), VfsError> {
        Err(VfsError::Unsupported)
    }

    pub fn shm_lock(&self, _offset: i32, _n: i32, _flags: i32) -> Result<(), VfsError> {
        Err(VfsError::Unsupported)
    }

    pub fn shm_barrier(&self) {}

    pub fn shm_unmap(&self, _delete: bool) -> Result<(), VfsError> {
        Err(VfsError::Unsupported)
    }

    pub fn fetch(&self, _offset: u64, _amount: usize) -> Result<(), VfsError> {
        Err(VfsError::Unsupported)
    }

    pub fn unfetch(&self, _offset: u64) -> Result<(), VfsError> {
        Err(VfsError::Unsupported)
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(unix)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(windows)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_write(buf, offset)
}
