//! Subcommand implementations.
//!
//! Each command returns a serializable output that `main` prints as JSON.

use std::path::PathBuf;

use anyhow::{Result, bail};
use pcache_core::{AccessRights, BackendParamsManager, BackendType, EntryMetadata, PersistentCache, derive_backend_key};
use serde::Serialize;

/// Backend key for `name`: hashed unless the caller asked for it verbatim.
pub fn backend_key(name: &str, raw: bool) -> String {
    if raw { name.to_string() } else { derive_backend_key(name) }
}

/// Output from `pcache put`.
#[derive(Debug, Clone, Serialize)]
pub struct PutOutput {
    pub backend_key: String,
    pub key: String,
    pub size: usize,
}

pub async fn put(
    manager: &BackendParamsManager, backend_key: &str, key: &str, content: &[u8], input_signature: i64,
) -> Result<PutOutput> {
    let params = manager.get_params_or_create(BackendType::Sqlite, backend_key, AccessRights::ReadWrite).await;
    let cache = PersistentCache::open(params).await;
    if !cache.is_operational() {
        tracing::warn!(backend_key, "cache is not operational, refusing to store entry");
        bail!("cache for backend key {backend_key} could not be opened for writing");
    }

    cache.insert(key, content, EntryMetadata::with_input_signature(input_signature)).await;
    cache.close().await;

    Ok(PutOutput { backend_key: backend_key.to_string(), key: key.to_string(), size: content.len() })
}

/// Output from `pcache get`. Content is returned separately.
#[derive(Debug, Clone, Serialize)]
pub struct GetOutput {
    pub backend_key: String,
    pub key: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_signature: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_timestamp: Option<i64>,
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
}

/// Look up `key` through a read-only cache.
///
/// A database that was never written reads as a miss.
pub async fn get(manager: &BackendParamsManager, backend_key: &str, key: &str) -> Result<GetOutput> {
    let params = manager.get_params_or_create(BackendType::Sqlite, backend_key, AccessRights::ReadOnly).await;
    let cache = PersistentCache::open(params).await;
    let entry = cache.find(key).await;
    cache.close().await;

    let mut output = GetOutput {
        backend_key: backend_key.to_string(),
        key: key.to_string(),
        found: entry.is_some(),
        size: None,
        input_signature: None,
        write_timestamp: None,
        content: None,
    };
    if let Some(entry) = entry {
        let metadata = entry.metadata();
        output.size = Some(entry.content_size());
        output.input_signature = Some(metadata.input_signature);
        output.write_timestamp = Some(metadata.write_timestamp);
        output.content = Some(entry.into_content());
    }
    Ok(output)
}

/// Output from `pcache trim`.
#[derive(Debug, Clone, Serialize)]
pub struct TrimOutput {
    pub root_dir: PathBuf,
    pub total_before: u64,
    pub target_bytes: u64,
    pub deleted: u64,
}

pub fn trim(manager: &BackendParamsManager, target_bytes: u64) -> TrimOutput {
    let total_before = manager.total_footprint_of_files();
    let deleted = manager.bring_down_total_footprint_of_files(target_bytes);
    TrimOutput { root_dir: manager.root_dir().to_path_buf(), total_before, target_bytes, deleted }
}

/// Output from `pcache clear`.
#[derive(Debug, Clone, Serialize)]
pub struct ClearOutput {
    pub root_dir: PathBuf,
    pub cleared: bool,
}

pub fn clear(manager: &BackendParamsManager) -> Result<ClearOutput> {
    manager.delete_all_files()?;
    Ok(ClearOutput { root_dir: manager.root_dir().to_path_buf(), cleared: true })
}

/// Output from `pcache footprint`.
#[derive(Debug, Clone, Serialize)]
pub struct FootprintOutput {
    pub root_dir: PathBuf,
    pub total_bytes: u64,
    pub target_bytes: u64,
    pub over_target: bool,
}

pub fn footprint(manager: &BackendParamsManager, target_bytes: u64) -> FootprintOutput {
    let total_bytes = manager.total_footprint_of_files();
    FootprintOutput {
        root_dir: manager.root_dir().to_path_buf(),
        total_bytes,
        target_bytes,
        over_target: total_bytes > target_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use tokio::runtime::Handle;

    fn manager(root: &std::path::Path) -> BackendParamsManager {
        BackendParamsManager::new(root, NonZeroUsize::new(4).unwrap(), Handle::current()).unwrap()
    }

    #[test]
    fn test_backend_key_hashing() {
        assert_eq!(backend_key("plain", true), "plain");
        assert_eq!(backend_key("plain", false), derive_backend_key("plain"));
        assert_eq!(backend_key("a/b", false).len(), 32);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let key = backend_key("project", false);

        let put_output = put(&manager, &key, "artifact", b"hello", 5).await.unwrap();
        assert_eq!(put_output.size, 5);

        let output = get(&manager, &key, "artifact").await.unwrap();
        assert!(output.found);
        assert_eq!(output.input_signature, Some(5));
        assert_eq!(output.content.as_deref(), Some(&b"hello"[..]));

        let json = serde_json::to_value(&output).unwrap();
        assert!(json.get("content").is_none());
        assert_eq!(json["size"], 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_on_unwritten_key_misses() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        let output = get(&manager, "fresh", "anything").await.unwrap();
        assert!(!output.found);
        let json = serde_json::to_value(&output).unwrap();
        assert!(json.get("size").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_with_unsafe_raw_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        assert!(put(&manager, "../escape", "k", b"v", 0).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_trim_footprint_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        put(&manager, "a", "k", &[0u8; 4096], 0).await.unwrap();

        let before = footprint(&manager, 0);
        assert!(before.total_bytes > 0);
        assert!(before.over_target);

        let trimmed = trim(&manager, 0);
        assert_eq!(trimmed.total_before, before.total_bytes);
        assert_eq!(trimmed.deleted, before.total_bytes);
        assert_eq!(footprint(&manager, 0).total_bytes, 0);

        put(&manager, "b", "k", b"v", 0).await.unwrap();
        let cleared = clear(&manager).unwrap();
        assert!(cleared.cleared);
        assert_eq!(manager.total_footprint_of_files(), 0);
    }
}
