//! Best-effort cache facade.
//!
//! A `PersistentCache` never fails its callers. If the backend cannot be
//! initialized the cache stays permanently disabled: lookups miss and
//! inserts do nothing.

use std::sync::Arc;
use std::time::Instant;

use crate::backend::{Backend, Entry, EntryMetadata, SqliteBackend};
use crate::params::{BackendParams, BackendType};
use crate::vfs::SandboxedVfs;

/// Key/value cache over an optional backend.
pub struct PersistentCache {
    backend: Option<Box<dyn Backend>>,
}

impl PersistentCache {
    /// Open a cache over `params` using the process-wide sandboxed VFS.
    pub async fn open(params: BackendParams) -> Self {
        match SandboxedVfs::shared() {
            Ok(vfs) => Self::open_with_vfs(params, &vfs).await,
            Err(e) => {
                tracing::warn!("sandboxed vfs unavailable, persistent cache disabled: {}", e);
                Self::disabled()
            }
        }
    }

    /// Open a cache over `params`, registering its files with `vfs`.
    ///
    /// # Panics
    ///
    /// Panics for `BackendType::Mock`; test doubles go through
    /// [`PersistentCache::from_backend`].
    pub async fn open_with_vfs(params: BackendParams, vfs: &Arc<SandboxedVfs>) -> Self {
        let backend: Box<dyn Backend> = match params.backend_type {
            BackendType::Sqlite => Box::new(SqliteBackend::new(params, vfs)),
            BackendType::Mock => unreachable!("mock backends are injected with PersistentCache::from_backend"),
        };
        Self::from_backend(backend).await
    }

    /// Initialize `backend` and keep it only if that succeeds.
    pub async fn from_backend(mut backend: Box<dyn Backend>) -> Self {
        let started = Instant::now();
        let result = backend.initialize().await;

        tracing::info!(
            metric = %format!("PersistentCache.{}.{}.BackendInitialize", backend.backend_type(), backend.access_rights()),
            elapsed_us = started.elapsed().as_micros() as u64,
            success = result.is_ok(),
            "persistent cache backend initialization"
        );

        match result {
            Ok(()) => Self { backend: Some(backend) },
            Err(e) => {
                tracing::warn!("persistent cache backend failed to initialize, cache disabled: {}", e);
                Self::disabled()
            }
        }
    }

    fn disabled() -> Self {
        Self { backend: None }
    }

    /// Whether a backend initialized successfully.
    pub fn is_operational(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_type(&self) -> Option<BackendType> {
        self.backend.as_ref().map(|backend| backend.backend_type())
    }

    /// Look up `key`. Errors are logged and reported as a miss.
    pub async fn find(&self, key: &str) -> Option<Entry> {
        let backend = self.backend.as_ref()?;
        match backend.find(key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key, "persistent cache lookup failed: {}", e);
                None
            }
        }
    }

    /// Store `content` under `key`. Errors are logged and dropped.
    pub async fn insert(&self, key: &str, content: &[u8], metadata: EntryMetadata) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        if let Err(e) = backend.insert(key, content, metadata).await {
            tracing::warn!(key, size = content.len(), "persistent cache insert failed: {}", e);
        }
    }

    /// Release the backend, waiting for its pending work.
    pub async fn close(mut self) {
        if let Some(mut backend) = self.backend.take()
            && let Err(e) = backend.close().await
        {
            tracing::warn!("persistent cache close failed: {}", e);
        }
    }
}

impl std::fmt::Debug for PersistentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentCache")
            .field("backend_type", &self.backend_type())
            .field("operational", &self.is_operational())
            .finish()
    }
}
