//! Opens, caches and evicts the files backing each persistent cache.
//!
//! Every backend key owns two files directly under the root directory,
//! `<key>.db_file` and `<key>.journal_file`. Opened handles are kept in a
//! bounded LRU so that repeated opens of the same key reuse them.
//!
//! Callers must be the only process using a given root directory. Nothing
//! here locks files against other processes.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use lru::LruCache;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use walkdir::WalkDir;

use crate::Error;
use crate::config::CacheConfig;
use crate::params::{AccessRights, BackendParams, BackendParamsKey, BackendType};

pub const DB_FILE_EXTENSION: &str = "db_file";
pub const JOURNAL_FILE_EXTENSION: &str = "journal_file";

struct Inner {
    root_dir: PathBuf,
    cache: Mutex<LruCache<BackendParamsKey, BackendParams>>,
}

impl Inner {
    fn cache(&self) -> MutexGuard<'_, LruCache<BackendParamsKey, BackendParams>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fresh handles duplicated from the cached params, refreshing recency.
    fn cached_copy(&self, key: &BackendParamsKey) -> Option<BackendParams> {
        let mut cache = self.cache();
        let copy = cache.get(key)?.try_copy();
        match copy {
            Ok(params) => Some(params),
            Err(e) => {
                tracing::warn!(key = %key.key, "dropping cached params that could not be duplicated: {}", e);
                cache.pop(key);
                None
            }
        }
    }

    fn save(&self, key: BackendParamsKey, params: &BackendParams) {
        if !params.is_valid() {
            return;
        }
        match params.try_copy() {
            Ok(copy) => {
                self.cache().put(key, copy);
            }
            Err(e) => tracing::warn!(key = %key.key, "not caching params that could not be duplicated: {}", e),
        }
    }
}

/// Sizes of the files directly under the root, and the databases among them.
#[derive(Debug, Default)]
struct FootprintScan {
    total: u64,
    sizes: HashMap<PathBuf, u64>,
    /// `(mtime, path)` of every `.db_file`.
    db_files: Vec<(SystemTime, PathBuf)>,
}

/// Hands out [`BackendParams`] for backend keys under one root directory.
pub struct BackendParamsManager {
    inner: Arc<Inner>,
    runtime: Handle,
}

impl BackendParamsManager {
    /// Create a manager over `root_dir`, creating the directory if needed.
    ///
    /// Background file creation is spawned on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the root directory cannot be created.
    pub fn new(root_dir: impl Into<PathBuf>, capacity: NonZeroUsize, runtime: Handle) -> Result<Self, Error> {
        let root_dir = root_dir.into();
        fs::create_dir_all(&root_dir)?;
        let inner = Inner { root_dir, cache: Mutex::new(LruCache::new(capacity)) };
        Ok(Self { inner: Arc::new(inner), runtime })
    }

    pub fn from_config(config: &CacheConfig, runtime: Handle) -> Result<Self, Error> {
        let capacity = NonZeroUsize::new(config.params_cache_capacity)
            .ok_or_else(|| Error::InvalidParams("params cache capacity must be non-zero".to_string()))?;
        Self::new(&config.root_dir, capacity, runtime)
    }

    pub fn root_dir(&self) -> &Path {
        &self.inner.root_dir
    }

    /// Number of params currently held in the LRU.
    pub fn cached_len(&self) -> usize {
        self.inner.cache().len()
    }

    /// Whether params for this key are cached. Does not affect recency.
    pub fn contains(&self, backend_type: BackendType, key: &str) -> bool {
        self.inner.cache().contains(&BackendParamsKey::new(backend_type, key))
    }

    /// Deliver params for `key` to `callback`.
    ///
    /// On a cache hit the callback runs before this returns, with freshly
    /// duplicated handles. Otherwise the files are opened on a blocking
    /// worker and the callback runs from the runtime once that finishes.
    /// Either way it runs exactly once.
    pub fn get_params_sync_or_create_async<F>(
        &self, backend_type: BackendType, key: &str, rights: AccessRights, callback: F,
    ) where
        F: FnOnce(BackendParams) + Send + 'static,
    {
        let cache_key = BackendParamsKey::new(backend_type, key);
        if let Some(params) = self.inner.cached_copy(&cache_key) {
            tracing::debug!(key, "backend params cache hit");
            callback(params);
            return;
        }

        tracing::debug!(key, "backend params cache miss, opening files in background");
        let weak = Arc::downgrade(&self.inner);
        let root_dir = self.inner.root_dir.clone();
        self.runtime.spawn(async move {
            let key = cache_key.key.clone();
            let created =
                tokio::task::spawn_blocking(move || Self::create_params_sync(&root_dir, backend_type, &key, rights))
                    .await;
            let params = match created {
                Ok(params) => params,
                Err(e) => {
                    tracing::warn!(key = %cache_key.key, "backend params creation did not complete: {}", e);
                    BackendParams::invalid(backend_type)
                }
            };

            // The manager may be gone by now; the caller still gets its params.
            if let Some(inner) = weak.upgrade() {
                inner.save(cache_key, &params);
            }
            callback(params);
        });
    }

    /// Awaitable form of [`get_params_sync_or_create_async`](Self::get_params_sync_or_create_async).
    pub async fn get_params_or_create(&self, backend_type: BackendType, key: &str, rights: AccessRights) -> BackendParams {
        let (tx, rx) = oneshot::channel();
        self.get_params_sync_or_create_async(backend_type, key, rights, move |params| {
            let _ = tx.send(params);
        });
        rx.await.unwrap_or_else(|_| BackendParams::invalid(backend_type))
    }

    /// Blocking form: returns cached params or opens the files inline.
    pub fn get_or_create_params_sync(&self, backend_type: BackendType, key: &str, rights: AccessRights) -> BackendParams {
        let cache_key = BackendParamsKey::new(backend_type, key);
        if let Some(params) = self.inner.cached_copy(&cache_key) {
            tracing::debug!(key, "backend params cache hit");
            return params;
        }

        let params = Self::create_params_sync(&self.inner.root_dir, backend_type, key, rights);
        self.inner.save(cache_key, &params);
        params
    }

    /// Open (creating if absent) the two files for `key` under `directory`.
    ///
    /// Always returns params. A file that could not be opened is left as
    /// `None`, and unsafe keys yield fully invalid params.
    pub fn create_params_sync(
        directory: &Path, backend_type: BackendType, key: &str, rights: AccessRights,
    ) -> BackendParams {
        if let Err(e) = validate_key(key) {
            tracing::warn!("refusing to create backend files: {}", e);
            return BackendParams::invalid(backend_type);
        }

        let writable = rights.is_writable();
        let db_file = open_backing_file(&directory.join(format!("{key}.{DB_FILE_EXTENSION}")), writable);
        let journal_file = open_backing_file(&directory.join(format!("{key}.{JOURNAL_FILE_EXTENSION}")), writable);

        BackendParams {
            backend_type,
            db_file,
            db_file_is_writable: writable,
            journal_file,
            journal_file_is_writable: writable,
        }
    }

    /// Forget every cached handle and remove everything under the root.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the root cannot be removed or recreated.
    pub fn delete_all_files(&self) -> Result<(), Error> {
        self.inner.cache().clear();

        let root_dir = &self.inner.root_dir;
        match fs::remove_dir_all(root_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(root_dir)?;
        tracing::info!(root = %root_dir.display(), "deleted all persistent cache files");
        Ok(())
    }

    /// Total size in bytes of the regular files directly under the root.
    pub fn total_footprint_of_files(&self) -> u64 {
        self.scan().total
    }

    /// Delete the least recently modified databases, with their journals,
    /// until the files under the root add up to at most `target_bytes`.
    ///
    /// Returns the number of bytes deleted. Only `.db_file`s are candidates,
    /// so a root that is over target without any database returns 0.
    pub fn bring_down_total_footprint_of_files(&self, target_bytes: u64) -> u64 {
        self.inner.cache().clear();

        let FootprintScan { total, sizes, mut db_files } = self.scan();
        if total <= target_bytes {
            return 0;
        }
        let to_delete = total - target_bytes;
        db_files.sort();

        let mut deleted = 0u64;
        for (_, db_path) in db_files {
            if deleted >= to_delete {
                break;
            }

            match remove_file_if_exists(&db_path) {
                Ok(true) => deleted += sizes.get(&db_path).copied().unwrap_or(0),
                // Already gone: still clear out its journal below.
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(path = %db_path.display(), "failed to delete cache database: {}", e);
                    continue;
                }
            }

            let journal_path = db_path.with_extension(JOURNAL_FILE_EXTENSION);
            match remove_file_if_exists(&journal_path) {
                Ok(true) => deleted += sizes.get(&journal_path).copied().unwrap_or(0),
                Ok(false) => {}
                Err(e) => tracing::warn!(
                    metric = "PersistentCache.ParamsManager.OrphanedJournal",
                    path = %journal_path.display(),
                    "failed to delete cache journal: {}",
                    e
                ),
            }
        }

        tracing::info!(total, target_bytes, deleted, "brought down persistent cache footprint");
        deleted
    }

    fn scan(&self) -> FootprintScan {
        let mut scan = FootprintScan::default();

        for entry in WalkDir::new(&self.inner.root_dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("failed to enumerate cache root: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), "failed to stat cache file: {}", e);
                    continue;
                }
            };

            let size = metadata.len();
            scan.total += size;
            scan.sizes.insert(entry.path().to_path_buf(), size);
            if entry.path().extension().is_some_and(|ext| ext == DB_FILE_EXTENSION) {
                let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
                scan.db_files.push((modified, entry.into_path()));
            }
        }

        scan
    }
}

impl fmt::Debug for BackendParamsManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendParamsManager")
            .field("root_dir", &self.inner.root_dir)
            .field("cached", &self.cached_len())
            .finish()
    }
}

/// Keys become filename prefixes, so they must not leave the root directory.
fn validate_key(key: &str) -> Result<(), Error> {
    if key.is_empty() || key == "." || key == ".." {
        return Err(Error::InvalidKey(format!("{key:?} is not a usable file name")));
    }
    if key.contains(['/', '\\', '\0']) {
        return Err(Error::InvalidKey(format!("{key:?} contains a path separator or NUL")));
    }
    Ok(())
}

fn open_options(writable: bool) -> OpenOptions {
    let mut options = OpenOptions::new();
    options.read(true).write(writable).create(writable).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

/// Open `path`, creating it if missing, with write access only if `writable`.
fn open_backing_file(path: &Path, writable: bool) -> Option<File> {
    let opened = if writable {
        open_options(true).open(path)
    } else {
        // Creating requires write access, so create first and reopen read-only.
        match open_options(false).open(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                open_options(true).open(path).and_then(|_| open_options(false).open(path))
            }
            other => other,
        }
    };

    match opened {
        Ok(file) => {
            tracing::debug!(path = %path.display(), writable, "opened cache file");
            Some(file)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), writable, "failed to open cache file: {}", e);
            None
        }
    }
}

/// `Ok(false)` if there was nothing to remove.
fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EntryMetadata;
    use crate::persistent_cache::PersistentCache;
    use crate::vfs::SandboxedVfs;
    use filetime::FileTime;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn manager(root: &Path, capacity: usize) -> BackendParamsManager {
        BackendParamsManager::new(root, NonZeroUsize::new(capacity).unwrap(), Handle::current()).unwrap()
    }

    /// Create both files for `key` with the given sizes and modification time.
    fn seed(root: &Path, key: &str, db_size: usize, journal_size: usize, mtime_secs: i64) {
        let db = root.join(format!("{key}.db_file"));
        fs::write(&db, vec![0u8; db_size]).unwrap();
        fs::write(root.join(format!("{key}.journal_file")), vec![0u8; journal_size]).unwrap();
        filetime::set_file_mtime(&db, FileTime::from_unix_time(mtime_secs, 0)).unwrap();
    }

    #[tokio::test]
    async fn test_create_params_sync_opens_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let params =
            BackendParamsManager::create_params_sync(dir.path(), BackendType::Sqlite, "alpha", AccessRights::ReadWrite);

        assert!(params.is_valid());
        assert!(params.db_file_is_writable && params.journal_file_is_writable);
        assert!(dir.path().join("alpha.db_file").is_file());
        assert!(dir.path().join("alpha.journal_file").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_created_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        BackendParamsManager::create_params_sync(dir.path(), BackendType::Sqlite, "perm", AccessRights::ReadWrite);
        let mode = fs::metadata(dir.path().join("perm.db_file")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_read_only_creates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let params =
            BackendParamsManager::create_params_sync(dir.path(), BackendType::Sqlite, "ro", AccessRights::ReadOnly);

        assert!(params.is_valid());
        assert_eq!(params.access_rights(), AccessRights::ReadOnly);
        assert!(dir.path().join("ro.db_file").exists());
    }

    #[tokio::test]
    async fn test_unsafe_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 4);

        for key in ["", ".", "..", "../escape", "a/b", "a\\b", "nul\0byte"] {
            let params = manager.get_or_create_params_sync(BackendType::Sqlite, key, AccessRights::ReadWrite);
            assert!(!params.is_valid(), "key {key:?} should be rejected");
        }
        assert_eq!(manager.cached_len(), 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cache_key_uniqueness() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 4);

        let a = manager.get_or_create_params_sync(BackendType::Sqlite, "a", AccessRights::ReadWrite);
        let b = manager.get_or_create_params_sync(BackendType::Sqlite, "b", AccessRights::ReadWrite);
        let a_again = manager.get_or_create_params_sync(BackendType::Sqlite, "a", AccessRights::ReadWrite);
        assert!(a.is_valid() && b.is_valid() && a_again.is_valid());
        assert_eq!(manager.cached_len(), 2);
        assert!(manager.contains(BackendType::Sqlite, "a"));
        assert!(!manager.contains(BackendType::Mock, "a"));
    }

    #[tokio::test]
    async fn test_lru_evicts_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 2);

        manager.get_or_create_params_sync(BackendType::Sqlite, "a", AccessRights::ReadWrite);
        manager.get_or_create_params_sync(BackendType::Sqlite, "b", AccessRights::ReadWrite);
        manager.get_or_create_params_sync(BackendType::Sqlite, "a", AccessRights::ReadWrite);
        manager.get_or_create_params_sync(BackendType::Sqlite, "c", AccessRights::ReadWrite);

        assert_eq!(manager.cached_len(), 2);
        assert!(manager.contains(BackendType::Sqlite, "a"));
        assert!(!manager.contains(BackendType::Sqlite, "b"));
        assert!(manager.contains(BackendType::Sqlite, "c"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_async_miss_then_synchronous_hit() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 4);

        let params = manager.get_params_or_create(BackendType::Sqlite, "k", AccessRights::ReadWrite).await;
        assert!(params.is_valid());
        assert!(manager.contains(BackendType::Sqlite, "k"));

        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        manager.get_params_sync_or_create_async(BackendType::Sqlite, "k", AccessRights::ReadWrite, move |params| {
            assert!(params.is_valid());
            flag.store(true, Ordering::SeqCst);
        });
        assert!(called.load(Ordering::SeqCst), "cache hit should call back before returning");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_callback_fires_after_manager_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 4);
        let (tx, rx) = oneshot::channel();

        manager.get_params_sync_or_create_async(BackendType::Sqlite, "late", AccessRights::ReadWrite, move |params| {
            let _ = tx.send(params.is_valid());
        });
        drop(manager);

        assert!(rx.await.unwrap());
    }

    #[tokio::test]
    async fn test_cached_copies_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 4);

        let first = manager.get_or_create_params_sync(BackendType::Sqlite, "k", AccessRights::ReadWrite);
        drop(first);
        let second = manager.get_or_create_params_sync(BackendType::Sqlite, "k", AccessRights::ReadWrite);
        assert!(second.is_valid());
        assert!(second.db_file.unwrap().metadata().is_ok());
    }

    #[tokio::test]
    async fn test_cache_hit_shares_file_content() {
        use std::io::{Read, Seek, SeekFrom, Write};

        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 4);

        let mut first = manager.get_or_create_params_sync(BackendType::Sqlite, "k", AccessRights::ReadWrite);
        let mut second = manager.get_or_create_params_sync(BackendType::Sqlite, "k", AccessRights::ReadWrite);
        assert_eq!(manager.cached_len(), 1);

        let writer = first.db_file.as_mut().unwrap();
        writer.write_all(b"xyz").unwrap();
        writer.sync_all().unwrap();

        let reader = second.db_file.as_mut().unwrap();
        reader.seek(SeekFrom::Start(0)).unwrap();
        let mut contents = String::new();
        reader.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "xyz");
    }

    #[tokio::test]
    async fn test_params_outlive_lru_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 1);
        let vfs = SandboxedVfs::new().unwrap();

        let a = manager.get_or_create_params_sync(BackendType::Sqlite, "a", AccessRights::ReadWrite);
        manager.get_or_create_params_sync(BackendType::Sqlite, "b", AccessRights::ReadWrite);
        assert!(!manager.contains(BackendType::Sqlite, "a"));
        assert!(manager.contains(BackendType::Sqlite, "b"));

        let cache = PersistentCache::open_with_vfs(a, &vfs).await;
        assert!(cache.is_operational());
        cache.insert("entry", b"still usable", EntryMetadata::default()).await;
        assert_eq!(cache.find("entry").await.unwrap().content(), b"still usable");
        cache.close().await;
    }

    #[tokio::test]
    async fn test_delete_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        let manager = manager(&root, 4);
        manager.get_or_create_params_sync(BackendType::Sqlite, "a", AccessRights::ReadWrite);
        fs::create_dir(root.join("nested")).unwrap();

        manager.delete_all_files().unwrap();
        assert_eq!(manager.cached_len(), 0);
        assert!(root.is_dir());
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_footprint_evicts_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 4);
        seed(dir.path(), "old", 100, 10, 1_000);
        seed(dir.path(), "mid", 100, 10, 2_000);
        seed(dir.path(), "new", 100, 10, 3_000);
        assert_eq!(manager.total_footprint_of_files(), 330);

        let deleted = manager.bring_down_total_footprint_of_files(250);
        assert_eq!(deleted, 110);
        assert!(!dir.path().join("old.db_file").exists());
        assert!(!dir.path().join("old.journal_file").exists());
        assert!(dir.path().join("mid.db_file").exists());
        assert!(dir.path().join("new.db_file").exists());

        let deleted = manager.bring_down_total_footprint_of_files(110);
        assert_eq!(deleted, 110);
        assert!(!dir.path().join("mid.db_file").exists());
        assert!(dir.path().join("new.db_file").exists());
        assert!(manager.total_footprint_of_files() <= 110);
    }

    #[tokio::test]
    async fn test_footprint_under_target_is_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 4);
        seed(dir.path(), "a", 50, 0, 1_000);

        assert_eq!(manager.bring_down_total_footprint_of_files(50), 0);
        assert_eq!(manager.bring_down_total_footprint_of_files(1_000), 0);
        assert!(dir.path().join("a.db_file").exists());
    }

    #[tokio::test]
    async fn test_footprint_zero_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 4);
        seed(dir.path(), "a", 40, 4, 1_000);
        seed(dir.path(), "b", 60, 6, 2_000);
        manager.get_or_create_params_sync(BackendType::Sqlite, "a", AccessRights::ReadWrite);

        assert_eq!(manager.bring_down_total_footprint_of_files(0), 110);
        assert_eq!(manager.cached_len(), 0);
        assert_eq!(manager.total_footprint_of_files(), 0);
    }

    #[tokio::test]
    async fn test_undeletable_journal_counts_only_database() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 4);
        fs::write(dir.path().join("a.db_file"), vec![0u8; 100]).unwrap();
        fs::create_dir(dir.path().join("a.journal_file")).unwrap();

        assert_eq!(manager.bring_down_total_footprint_of_files(0), 100);
        assert!(!dir.path().join("a.db_file").exists());
        assert!(dir.path().join("a.journal_file").is_dir());
    }

    #[tokio::test]
    async fn test_footprint_ignores_non_database_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 4);
        fs::write(dir.path().join("stray.bin"), vec![0u8; 500]).unwrap();

        assert_eq!(manager.bring_down_total_footprint_of_files(10), 0);
        assert!(dir.path().join("stray.bin").exists());
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("abc123").is_ok());
        assert!(validate_key("with.dots").is_ok());
        assert!(matches!(validate_key(".."), Err(Error::InvalidKey(_))));
        assert!(matches!(validate_key("a/b"), Err(Error::InvalidKey(_))));
    }
}
