//! Sandboxed virtual file system for the SQLite backend.
//!
//! Databases never see real paths. Each backend registers a pair of
//! already-opened files under virtual names with a [`SandboxedVfs`], and
//! SQLite opens the database by that virtual name.
//!
//! - [`SandboxedFile`] adapts one OS handle to the engine's I/O primitives
//! - [`VfsFileSet`] pairs the main and journal files and names them
//! - [`SandboxedVfs`] is the registry the engine resolves names against
//!
//! Shared memory is not implemented, so only rollback-journal modes work.

mod file_set;
mod hooks;
mod registry;
mod sandboxed_file;

use std::os::raw::c_int;

use tokio_rusqlite::rusqlite::ffi;

pub use file_set::VfsFileSet;
pub use registry::{SandboxedVfs, UnregisterRunner};
pub use sandboxed_file::{LockMode, SandboxedFile, SyncFlags};

/// Failure outcomes of sandboxed file operations, one per engine status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VfsError {
    /// Fewer bytes than requested were available; the buffer tail is zeroed.
    #[error("short read")]
    ShortRead,

    #[error("read failed")]
    Read,

    #[error("write failed")]
    Write,

    /// Out of disk space during a write.
    #[error("disk full")]
    Full,

    #[error("truncate failed")]
    Truncate,

    #[error("sync failed")]
    Fsync,

    #[error("stat failed")]
    Fstat,

    #[error("delete failed")]
    Delete,

    /// The file has no handle to bind, or is already bound.
    #[error("cannot open")]
    CantOpen,

    /// Shared memory and memory-mapped I/O.
    #[error("unsupported operation")]
    Unsupported,
}

impl VfsError {
    /// SQLite result code reported for this outcome.
    pub fn code(&self) -> c_int {
        match self {
            VfsError::ShortRead => ffi::SQLITE_IOERR_SHORT_READ,
            VfsError::Read => ffi::SQLITE_IOERR_READ,
            VfsError::Write => ffi::SQLITE_IOERR_WRITE,
            VfsError::Full => ffi::SQLITE_FULL,
            VfsError::Truncate => ffi::SQLITE_IOERR_TRUNCATE,
            VfsError::Fsync => ffi::SQLITE_IOERR_FSYNC,
            VfsError::Fstat => ffi::SQLITE_IOERR_FSTAT,
            VfsError::Delete => ffi::SQLITE_IOERR_DELETE,
            VfsError::CantOpen => ffi::SQLITE_CANTOPEN,
            VfsError::Unsupported => ffi::SQLITE_IOERR,
        }
    }
}
