//! Storage engines behind a [`PersistentCache`](crate::PersistentCache).
//!
//! A backend is built from [`BackendParams`](crate::BackendParams), then
//! initialized once. Only initialized backends are kept by the facade.

pub mod migrations;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::params::{AccessRights, BackendType};

pub use sqlite::SqliteBackend;

/// Caller-provided bookkeeping stored next to an entry's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Opaque value identifying the inputs the content was derived from.
    pub input_signature: i64,
    /// Microseconds since the Unix epoch. Zero means "stamp on insert".
    pub write_timestamp: i64,
}

impl EntryMetadata {
    pub fn with_input_signature(input_signature: i64) -> Self {
        Self { input_signature, write_timestamp: 0 }
    }
}

/// A cached value as returned by `find`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    content: Vec<u8>,
    metadata: EntryMetadata,
}

impl Entry {
    pub fn new(content: Vec<u8>, metadata: EntryMetadata) -> Self {
        Self { content, metadata }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn content_size(&self) -> usize {
        self.content.len()
    }

    pub fn metadata(&self) -> EntryMetadata {
        self.metadata
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

/// A storage engine the cache facade can drive.
///
/// Absence of a key is `Ok(None)`, never an error.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Open the underlying store. Called exactly once, before any other
    /// operation.
    async fn initialize(&mut self) -> Result<(), Error>;

    async fn find(&self, key: &str) -> Result<Option<Entry>, Error>;

    /// Insert or replace the entry for `key`.
    async fn insert(&self, key: &str, content: &[u8], metadata: EntryMetadata) -> Result<(), Error>;

    /// Release the store, waiting for pending work to finish.
    async fn close(&mut self) -> Result<(), Error>;

    fn backend_type(&self) -> BackendType;

    fn access_rights(&self) -> AccessRights;
}
