//! Persistent key/value cache storage engine.
//!
//! This crate provides:
//! - A sandboxed SQLite VFS that only ever sees pre-opened files
//! - A SQLite backend storing entries behind that VFS
//! - `PersistentCache`, a facade that degrades to a no-op on failure
//! - `BackendParamsManager`, which opens, caches and evicts backing files
//! - Unified error types and layered configuration

pub mod backend;
pub mod config;
pub mod error;
pub mod hash;
pub mod manager;
pub mod params;
pub mod persistent_cache;
pub mod vfs;

pub use backend::{Backend, Entry, EntryMetadata, SqliteBackend};
pub use config::{CacheConfig, ConfigError};
pub use error::Error;
pub use hash::derive_backend_key;
pub use manager::BackendParamsManager;
pub use params::{AccessRights, BackendParams, BackendParamsKey, BackendType};
pub use persistent_cache::PersistentCache;
pub use vfs::SandboxedVfs;
