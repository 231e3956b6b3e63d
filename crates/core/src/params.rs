//! Backend selection and the file handles a backend is opened from.

use std::fmt;
use std::fs::File;

use serde::{Deserialize, Serialize};

/// Storage engine behind a `PersistentCache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendType {
    Sqlite,
    /// Only for test doubles handed to `PersistentCache::from_backend`.
    Mock,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Sqlite => "Sqlite",
            BackendType::Mock => "Mock",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether backing files are opened with write capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessRights {
    ReadWrite,
    ReadOnly,
}

impl AccessRights {
    pub fn is_writable(&self) -> bool {
        matches!(self, AccessRights::ReadWrite)
    }

    pub fn from_writable(writable: bool) -> Self {
        if writable { AccessRights::ReadWrite } else { AccessRights::ReadOnly }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRights::ReadWrite => "ReadWrite",
            AccessRights::ReadOnly => "ReadOnly",
        }
    }
}

impl fmt::Display for AccessRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one logical database in the params cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendParamsKey {
    pub backend_type: BackendType,
    pub key: String,
}

impl BackendParamsKey {
    pub fn new(backend_type: BackendType, key: impl Into<String>) -> Self {
        Self { backend_type, key: key.into() }
    }
}

/// Everything a backend needs to open its database.
///
/// A `None` file is an invalid handle: opening failed or was refused. Params
/// are move-only; use [`BackendParams::try_copy`] to duplicate the OS handles.
#[derive(Debug)]
pub struct BackendParams {
    pub backend_type: BackendType,
    pub db_file: Option<File>,
    pub db_file_is_writable: bool,
    pub journal_file: Option<File>,
    pub journal_file_is_writable: bool,
}

impl BackendParams {
    /// Params with no usable files.
    pub fn invalid(backend_type: BackendType) -> Self {
        Self {
            backend_type,
            db_file: None,
            db_file_is_writable: false,
            journal_file: None,
            journal_file_is_writable: false,
        }
    }

    /// Both files are present.
    pub fn is_valid(&self) -> bool {
        self.db_file.is_some() && self.journal_file.is_some()
    }

    /// Duplicate the params, including the underlying OS handles.
    ///
    /// The copy shares file contents with the original but owns its own
    /// descriptors, so dropping one never invalidates the other.
    pub fn try_copy(&self) -> std::io::Result<Self> {
        Ok(Self {
            backend_type: self.backend_type,
            db_file: self.db_file.as_ref().map(File::try_clone).transpose()?,
            db_file_is_writable: self.db_file_is_writable,
            journal_file: self.journal_file.as_ref().map(File::try_clone).transpose()?,
            journal_file_is_writable: self.journal_file_is_writable,
        })
    }

    /// Access rights implied by the db file's writability.
    pub fn access_rights(&self) -> AccessRights {
        AccessRights::from_writable(self.db_file_is_writable)
    }
}
