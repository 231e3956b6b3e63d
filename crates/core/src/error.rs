//! Unified error types for the persistent cache.
//!
//! Cache unavailability is never fatal to callers: `PersistentCache` turns
//! these into "absent" or "no-op" results. They are still surfaced by the
//! lower layers so that the facade can log them.

use tokio_rusqlite::rusqlite;

/// Unified error types for the persistent cache engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Existing schema is older than this build and cannot be upgraded
    /// (read-only access).
    #[error("CACHE_ERROR: schema version {found} is older than required {required}")]
    SchemaTooOld { found: i64, required: i64 },

    /// The storage engine refused the rollback journal mode.
    #[error("CACHE_ERROR: unsupported journal mode: {0}")]
    JournalMode(String),

    /// Backend key cannot be used as a filename prefix.
    #[error("INVALID_KEY: {0}")]
    InvalidKey(String),

    /// Backend params do not carry usable file handles.
    #[error("INVALID_PARAMS: {0}")]
    InvalidParams(String),

    /// The backend was used before `initialize` succeeded or after `close`.
    #[error("BACKEND_UNINITIALIZED")]
    NotInitialized,

    /// Sandboxed VFS could not be registered with the storage engine.
    #[error("VFS_ERROR: {0}")]
    Vfs(String),

    /// Filesystem operation on the cache root failed.
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidKey("../escape".to_string());
        assert!(err.to_string().contains("INVALID_KEY"));
        assert!(err.to_string().contains("../escape"));
    }

    #[test]
    fn test_schema_error_display() {
        let err = Error::SchemaTooOld { found: 0, required: 1 };
        assert_eq!(err.to_string(), "CACHE_ERROR: schema version 0 is older than required 1");
    }

    #[test]
    fn test_rusqlite_error_wraps_as_database() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, Error::Database(_)));
        assert!(err.to_string().starts_with("CACHE_ERROR"));
    }
}
