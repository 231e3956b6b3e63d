//! SQLite storage engine running on the sandboxed VFS.
//!
//! The database is opened by virtual name, so SQLite never resolves a real
//! path. All statements run on tokio-rusqlite's background thread.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use super::{Backend, Entry, EntryMetadata, migrations};
use crate::Error;
use crate::params::{AccessRights, BackendParams, BackendType};
use crate::vfs::{SandboxedFile, SandboxedVfs, UnregisterRunner, VfsFileSet};

/// SQLite-backed key/value store over a pair of pre-opened files.
///
/// Fields drop in declaration order: the connection is released first, then
/// the virtual paths are unregistered, and only then are the files closed.
#[derive(Debug)]
pub struct SqliteBackend {
    db: Option<Connection>,
    unregister_runner: UnregisterRunner,
    file_set: VfsFileSet,
    access_rights: AccessRights,
}

impl SqliteBackend {
    /// Take ownership of `params` and register its files with `vfs`.
    ///
    /// Nothing is opened until [`Backend::initialize`].
    pub fn new(params: BackendParams, vfs: &Arc<SandboxedVfs>) -> Self {
        let access_rights = params.access_rights();
        let file_set = VfsFileSet::new(
            SandboxedFile::new(params.db_file, AccessRights::from_writable(params.db_file_is_writable)),
            SandboxedFile::new(params.journal_file, AccessRights::from_writable(params.journal_file_is_writable)),
        );
        let unregister_runner = vfs.register(&file_set);

        Self { db: None, unregister_runner, file_set, access_rights }
    }

    pub fn file_set(&self) -> &VfsFileSet {
        &self.file_set
    }

    fn conn(&self) -> Result<&Connection, Error> {
        self.db.as_ref().ok_or(Error::NotInitialized)
    }

    fn open_flags(&self) -> OpenFlags {
        let mode = if self.access_rights.is_writable() {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        } else {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        };
        mode | OpenFlags::SQLITE_OPEN_NO_MUTEX
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn initialize(&mut self) -> Result<(), Error> {
        if self.db.is_some() {
            return Ok(());
        }
        if !self.file_set.db_file().has_file() || !self.file_set.journal_file().has_file() {
            return Err(Error::InvalidParams("backing files were not opened".to_string()));
        }

        let vfs_name = self.unregister_runner.vfs().name().to_string();
        let conn = Connection::open_with_flags_and_vfs(self.file_set.db_virtual_path(), self.open_flags(), vfs_name.as_str())
            .await
            .map_err(|e| Error::Database(e.into()))?;

        // Rollback journal only: the VFS has no shared memory for WAL.
        let journal_mode: String = conn
            .call(|conn| {
                conn.execute_batch(
                    "PRAGMA synchronous=NORMAL;
                     PRAGMA temp_store=MEMORY;
                     PRAGMA mmap_size=0;",
                )?;
                conn.query_row("PRAGMA journal_mode=TRUNCATE", [], |row| row.get(0))
            })
            .await
            .map_err(Error::Database)?;
        if !journal_mode.eq_ignore_ascii_case("truncate") {
            return Err(Error::JournalMode(journal_mode));
        }

        if self.access_rights.is_writable() {
            migrations::run(&conn).await?;
        } else {
            migrations::verify(&conn).await?;
        }

        tracing::debug!(
            virtual_path = %self.file_set.db_virtual_path(),
            access = %self.access_rights,
            "sqlite backend initialized"
        );
        self.db = Some(conn);
        Ok(())
    }

    async fn find(&self, key: &str) -> Result<Option<Entry>, Error> {
        let key = key.to_string();
        self.conn()?
            .call(move |conn| -> Result<Option<Entry>, Error> {
                let mut stmt =
                    conn.prepare("SELECT content, input_signature, write_timestamp FROM entries WHERE key = ?1")?;
                let entry = stmt
                    .query_row(params![key], |row| {
                        let metadata = EntryMetadata { input_signature: row.get(1)?, write_timestamp: row.get(2)? };
                        Ok(Entry::new(row.get(0)?, metadata))
                    })
                    .optional()?;
                Ok(entry)
            })
            .await
            .map_err(Error::from)
    }

    async fn insert(&self, key: &str, content: &[u8], metadata: EntryMetadata) -> Result<(), Error> {
        let conn = self.conn()?;
        let key = key.to_string();
        let content = content.to_vec();
        let write_timestamp = match metadata.write_timestamp {
            0 => chrono::Utc::now().timestamp_micros(),
            stamped => stamped,
        };

        conn.call(move |conn| -> Result<(), Error> {
            conn.execute(
                "INSERT INTO entries (key, content, input_signature, write_timestamp)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    content = excluded.content,
                    input_signature = excluded.input_signature,
                    write_timestamp = excluded.write_timestamp",
                params![key, content, metadata.input_signature, write_timestamp],
            )?;
            Ok(())
        })
        .await
        .map_err(Error::from)
    }

    async fn close(&mut self) -> Result<(), Error> {
        match self.db.take() {
            Some(conn) => conn.close().await.map_err(Error::from),
            None => Ok(()),
        }
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Sqlite
    }

    fn access_rights(&self) -> AccessRights {
        self.access_rights
    }
}
