//! Virtual path registry, registered with SQLite as a named VFS.

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::ffi::CString;
use std::fmt;
use std::os::raw::c_void;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tokio_rusqlite::rusqlite::ffi;

use super::{SandboxedFile, VfsFileSet, hooks};
use crate::Error;

static NEXT_VFS_ID: AtomicU64 = AtomicU64::new(0);

/// Resolves virtual paths to sandboxed files on behalf of SQLite.
///
/// Each instance registers its own uniquely named VFS and unregisters it when
/// the last reference goes away. Backends keep an `Arc` alive through their
/// [`UnregisterRunner`], and every file SQLite holds open keeps one too.
pub struct SandboxedVfs {
    base: UnsafeCell<ffi::sqlite3_vfs>,
    name: CString,
    files: Mutex<HashMap<String, Arc<SandboxedFile>>>,
}

// `base` is only touched by SQLite under its own VFS-list mutex, `files` is
// behind a mutex, and `name` is immutable.
unsafe impl Send for SandboxedVfs {}
unsafe impl Sync for SandboxedVfs {}

impl SandboxedVfs {
    /// Create and register a new VFS.
    ///
    /// # Errors
    ///
    /// Returns `Error::Vfs` if SQLite rejects the registration.
    pub fn new() -> Result<Arc<Self>, Error> {
        let id = NEXT_VFS_ID.fetch_add(1, Ordering::Relaxed);
        let name = CString::new(format!("pcache-sandboxed-{id}")).map_err(|e| Error::Vfs(e.to_string()))?;

        let vfs = Arc::new_cyclic(|weak| {
            let base = hooks::vfs_struct(name.as_ptr(), weak.as_ptr() as *mut c_void);
            Self { base: UnsafeCell::new(base), name, files: Mutex::new(HashMap::new()) }
        });

        let rc = unsafe { ffi::sqlite3_vfs_register(vfs.base.get(), 0) };
        if rc != ffi::SQLITE_OK {
            return Err(Error::Vfs(format!("sqlite3_vfs_register returned {rc}")));
        }

        tracing::debug!("registered sandboxed vfs {}", vfs.name());
        Ok(vfs)
    }

    /// Process-wide instance used by `PersistentCache::open`.
    pub fn shared() -> Result<Arc<Self>, Error> {
        static SHARED: OnceLock<Arc<SandboxedVfs>> = OnceLock::new();

        if let Some(vfs) = SHARED.get() {
            return Ok(Arc::clone(vfs));
        }
        let vfs = Self::new()?;
        Ok(Arc::clone(SHARED.get_or_init(|| vfs)))
    }

    /// Name to pass as the VFS when opening a connection.
    pub fn name(&self) -> &str {
        // Built from a `String` in `new`, so always valid UTF-8.
        self.name.to_str().unwrap_or_default()
    }

    fn files(&self) -> MutexGuard<'_, HashMap<String, Arc<SandboxedFile>>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make both files of `file_set` resolvable until the returned runner drops.
    pub fn register(self: &Arc<Self>, file_set: &VfsFileSet) -> UnregisterRunner {
        let mut files = self.files();
        let mut paths = Vec::with_capacity(2);
        for (path, file) in file_set.entries() {
            let previous = files.insert(path.clone(), file);
            debug_assert!(previous.is_none(), "virtual path {path} registered twice");
            paths.push(path);
        }
        UnregisterRunner { vfs: Arc::clone(self), paths }
    }

    /// File registered under `path`, if any.
    pub fn lookup(&self, path: &str) -> Option<Arc<SandboxedFile>> {
        self.files().get(path).cloned()
    }

    pub fn registered_len(&self) -> usize {
        self.files().len()
    }

    fn unregister(&self, paths: &[String]) {
        let mut files = self.files();
        for path in paths {
            files.remove(path);
        }
    }

    #[cfg(test)]
    pub(super) fn as_raw(&self) -> *mut ffi::sqlite3_vfs {
        self.base.get()
    }

    /// Borrow the instance behind a SQLite VFS pointer.
    ///
    /// # Safety
    ///
    /// `vfs` must be the `sqlite3_vfs` of a live `SandboxedVfs`.
    pub(super) unsafe fn from_vfs<'a>(vfs: *mut ffi::sqlite3_vfs) -> Option<&'a Self> {
        let app_data = unsafe { vfs.as_ref() }?.pAppData.cast::<Self>();
        unsafe { app_data.as_ref() }
    }

    /// Take a new strong reference to the instance behind a SQLite VFS pointer.
    ///
    /// # Safety
    ///
    /// `vfs` must be the `sqlite3_vfs` of a live `SandboxedVfs`.
    pub(super) unsafe fn retain_from_vfs(vfs: *mut ffi::sqlite3_vfs) -> Option<Arc<Self>> {
        let app_data = unsafe { vfs.as_ref() }?.pAppData.cast::<Self>().cast_const();
        if app_data.is_null() {
            return None;
        }
        unsafe {
            Arc::increment_strong_count(app_data);
            Some(Arc::from_raw(app_data))
        }
    }
}

impl Drop for SandboxedVfs {
    fn drop(&mut self) {
        unsafe {
            ffi::sqlite3_vfs_unregister(self.base.get());
        }
        tracing::debug!("unregistered sandboxed vfs {}", self.name());
    }
}

impl fmt::Debug for SandboxedVfs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxedVfs")
            .field("name", &self.name)
            .field("registered", &self.registered_len())
            .finish()
    }
}

/// Removes a file set's virtual paths from the VFS when dropped.
#[derive(Debug)]
pub struct UnregisterRunner {
    vfs: Arc<SandboxedVfs>,
    paths: Vec<String>,
}

impl UnregisterRunner {
    pub fn vfs(&self) -> &Arc<SandboxedVfs> {
        &self.vfs
    }
}

impl Drop for UnregisterRunner {
    fn drop(&mut self) {
        self.vfs.unregister(&self.paths);
    }
}
