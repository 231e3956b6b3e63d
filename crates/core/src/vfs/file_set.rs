//! The pair of files backing one database, under collision-free virtual names.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::SandboxedFile;

/// Source of virtual path ids, unique for the life of the process.
static NEXT_VIRTUAL_FS_ID: AtomicU64 = AtomicU64::new(0);

/// Main database file and its rollback journal.
///
/// Every set gets its own id, so two live sets never produce the same virtual
/// path even when they were built from the same backend key.
#[derive(Debug)]
pub struct VfsFileSet {
    db_file: Arc<SandboxedFile>,
    journal_file: Arc<SandboxedFile>,
    virtual_fs_id: u64,
}

impl VfsFileSet {
    pub fn new(db_file: SandboxedFile, journal_file: SandboxedFile) -> Self {
        Self {
            db_file: Arc::new(db_file),
            journal_file: Arc::new(journal_file),
            virtual_fs_id: NEXT_VIRTUAL_FS_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn virtual_fs_id(&self) -> u64 {
        self.virtual_fs_id
    }

    /// Name handed to the engine's open call.
    pub fn db_virtual_path(&self) -> String {
        format!("{}_data.db", self.virtual_fs_id)
    }

    /// Matches the name the engine derives for the main journal.
    pub fn journal_virtual_path(&self) -> String {
        format!("{}_data.db-journal", self.virtual_fs_id)
    }

    pub fn db_file(&self) -> &Arc<SandboxedFile> {
        &self.db_file
    }

    pub fn journal_file(&self) -> &Arc<SandboxedFile> {
        &self.journal_file
    }

    /// `(virtual path, file)` pairs to register with the VFS.
    pub fn entries(&self) -> [(String, Arc<SandboxedFile>); 2] {
        [
            (self.db_virtual_path(), Arc::clone(&self.db_file)),
            (self.journal_virtual_path(), Arc::clone(&self.journal_file)),
        ]
    }
}
