//! `extern "C"` entry points SQLite calls on a [`SandboxedVfs`].
//!
//! File operations forward to [`SandboxedFile`]; platform services
//! (randomness, sleeping, clocks) forward to the default OS VFS.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::sync::Arc;
use std::{mem, ptr, slice};

use tokio_rusqlite::rusqlite::ffi;

use super::{LockMode, SandboxedFile, SandboxedVfs, SyncFlags, VfsError};

const MAX_PATHNAME: c_int = 512;
const SECTOR_SIZE: c_int = 4096;

/// What SQLite allocates per open file (`szOsFile`).
#[repr(C)]
struct FileHandle {
    base: ffi::sqlite3_file,
    /// Strong reference taken in `x_open`, released in `x_close`.
    file: *const SandboxedFile,
    /// Keeps the VFS registered while the engine holds the file.
    vfs: *const SandboxedVfs,
}

static IO_METHODS: ffi::sqlite3_io_methods = ffi::sqlite3_io_methods {
    iVersion: 3,
    xClose: Some(x_close),
    xRead: Some(x_read),
    xWrite: Some(x_write),
    xTruncate: Some(x_truncate),
    xSync: Some(x_sync),
    xFileSize: Some(x_file_size),
    xLock: Some(x_lock),
    xUnlock: Some(x_unlock),
    xCheckReservedLock: Some(x_check_reserved_lock),
    xFileControl: Some(x_file_control),
    xSectorSize: Some(x_sector_size),
    xDeviceCharacteristics: Some(x_device_characteristics),
    xShmMap: Some(x_shm_map),
    xShmLock: Some(x_shm_lock),
    xShmBarrier: Some(x_shm_barrier),
    xShmUnmap: Some(x_shm_unmap),
    xFetch: Some(x_fetch),
    xUnfetch: Some(x_unfetch),
};

/// VFS method table for a registry at `app_data`, named `name`.
pub(super) fn vfs_struct(name: *const c_char, app_data: *mut c_void) -> ffi::sqlite3_vfs {
    ffi::sqlite3_vfs {
        iVersion: 2,
        szOsFile: mem::size_of::<FileHandle>() as c_int,
        mxPathname: MAX_PATHNAME,
        pNext: ptr::null_mut(),
        zName: name,
        pAppData: app_data,
        xOpen: Some(x_open),
        xDelete: Some(x_delete),
        xAccess: Some(x_access),
        xFullPathname: Some(x_full_pathname),
        // Extension loading stays disabled on these connections.
        xDlOpen: None,
        xDlError: None,
        xDlSym: None,
        xDlClose: None,
        xRandomness: Some(x_randomness),
        xSleep: Some(x_sleep),
        xCurrentTime: Some(x_current_time),
        xGetLastError: Some(x_get_last_error),
        xCurrentTimeInt64: Some(x_current_time_int64),
        xSetSystemCall: None,
        xGetSystemCall: None,
        xNextSystemCall: None,
    }
}

fn status(result: Result<(), VfsError>) -> c_int {
    match result {
        Ok(()) => ffi::SQLITE_OK,
        Err(e) => e.code(),
    }
}

unsafe fn sandboxed<'a>(file: *mut ffi::sqlite3_file) -> &'a SandboxedFile {
    unsafe { &*(*file.cast::<FileHandle>()).file }
}

unsafe fn path<'a>(name: *const c_char) -> Option<&'a str> {
    if name.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(name) }.to_str().ok()
}

unsafe fn os_vfs() -> Option<(*mut ffi::sqlite3_vfs, &'static ffi::sqlite3_vfs)> {
    let os = unsafe { ffi::sqlite3_vfs_find(ptr::null()) };
    unsafe { os.as_ref() }.map(|v| (os, v))
}

unsafe extern "C" fn x_open(
    vfs: *mut ffi::sqlite3_vfs,
    name: *const c_char,
    file: *mut ffi::sqlite3_file,
    flags: c_int,
    out_flags: *mut c_int,
) -> c_int {
    // SQLite only calls xClose on files whose pMethods is set.
    unsafe { (*file).pMethods = ptr::null() };

    let Some(sandbox) = (unsafe { SandboxedVfs::retain_from_vfs(vfs) }) else {
        return ffi::SQLITE_CANTOPEN;
    };
    let Some(path) = (unsafe { path(name) }) else {
        // Anonymous temp files must stay in memory (temp_store=MEMORY).
        tracing::debug!("sandboxed vfs refused an unnamed file (flags {:#x})", flags);
        return ffi::SQLITE_CANTOPEN;
    };
    let Some(sandboxed) = sandbox.lookup(path) else {
        tracing::debug!("sandboxed vfs has no file registered at {}", path);
        return ffi::SQLITE_CANTOPEN;
    };
    if let Err(e) = sandboxed.open() {
        return e.code();
    }

    if !out_flags.is_null() {
        let granted = if sandboxed.access_rights().is_writable() {
            flags
        } else {
            (flags & !(ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE)) | ffi::SQLITE_OPEN_READONLY
        };
        unsafe { out_flags.write(granted) };
    }

    let handle = FileHandle {
        base: ffi::sqlite3_file { pMethods: &IO_METHODS },
        file: Arc::into_raw(sandboxed),
        vfs: Arc::into_raw(sandbox),
    };
    unsafe { file.cast::<FileHandle>().write(handle) };
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_delete(vfs: *mut ffi::sqlite3_vfs, name: *const c_char, _sync_dir: c_int) -> c_int {
    let Some(sandbox) = (unsafe { SandboxedVfs::from_vfs(vfs) }) else {
        return ffi::SQLITE_IOERR_DELETE;
    };
    match unsafe { path(name) }.and_then(|p| sandbox.lookup(p)) {
        Some(file) => status(file.delete_contents()),
        None => ffi::SQLITE_IOERR_DELETE_NOENT,
    }
}

unsafe extern "C" fn x_access(
    vfs: *mut ffi::sqlite3_vfs,
    name: *const c_char,
    flags: c_int,
    out: *mut c_int,
) -> c_int {
    let Some(sandbox) = (unsafe { SandboxedVfs::from_vfs(vfs) }) else {
        return ffi::SQLITE_IOERR_ACCESS;
    };
    let granted = match unsafe { path(name) }.and_then(|p| sandbox.lookup(p)) {
        None => false,
        Some(file) => match flags {
            // An empty journal is indistinguishable from a missing one.
            ffi::SQLITE_ACCESS_EXISTS => file.current_len().map(|len| len > 0).unwrap_or(false),
            ffi::SQLITE_ACCESS_READWRITE => file.access_rights().is_writable(),
            _ => true,
        },
    };
    unsafe { out.write(c_int::from(granted)) };
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_full_pathname(
    _vfs: *mut ffi::sqlite3_vfs,
    name: *const c_char,
    n_out: c_int,
    out: *mut c_char,
) -> c_int {
    // Virtual paths are already canonical.
    let bytes = unsafe { CStr::from_ptr(name) }.to_bytes_with_nul();
    if n_out < 0 || bytes.len() > n_out as usize {
        return ffi::SQLITE_CANTOPEN;
    }
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), out, bytes.len()) };
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_randomness(_vfs: *mut ffi::sqlite3_vfs, n: c_int, out: *mut c_char) -> c_int {
    match unsafe { os_vfs() } {
        Some((os, v)) => v.xRandomness.map_or(0, |f| unsafe { f(os, n, out) }),
        None => 0,
    }
}

unsafe extern "C" fn x_sleep(_vfs: *mut ffi::sqlite3_vfs, microseconds: c_int) -> c_int {
    match unsafe { os_vfs() } {
        Some((os, v)) => v.xSleep.map_or(0, |f| unsafe { f(os, microseconds) }),
        None => 0,
    }
}

unsafe extern "C" fn x_current_time(_vfs: *mut ffi::sqlite3_vfs, out: *mut f64) -> c_int {
    match unsafe { os_vfs() } {
        Some((os, v)) => v.xCurrentTime.map_or(ffi::SQLITE_ERROR, |f| unsafe { f(os, out) }),
        None => ffi::SQLITE_ERROR,
    }
}

unsafe extern "C" fn x_current_time_int64(_vfs: *mut ffi::sqlite3_vfs, out: *mut ffi::sqlite3_int64) -> c_int {
    match unsafe { os_vfs() } {
        Some((os, v)) if v.iVersion >= 2 => v.xCurrentTimeInt64.map_or(ffi::SQLITE_ERROR, |f| unsafe { f(os, out) }),
        _ => ffi::SQLITE_ERROR,
    }
}

unsafe extern "C" fn x_get_last_error(_vfs: *mut ffi::sqlite3_vfs, n: c_int, out: *mut c_char) -> c_int {
    match unsafe { os_vfs() } {
        Some((os, v)) => v.xGetLastError.map_or(0, |f| unsafe { f(os, n, out) }),
        None => 0,
    }
}

unsafe extern "C" fn x_close(file: *mut ffi::sqlite3_file) -> c_int {
    let handle = file.cast::<FileHandle>();
    let (sandboxed, vfs) = unsafe { (Arc::from_raw((*handle).file), Arc::from_raw((*handle).vfs)) };
    sandboxed.close();
    unsafe { (*handle).base.pMethods = ptr::null() };
    drop(sandboxed);
    drop(vfs);
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_read(
    file: *mut ffi::sqlite3_file,
    data: *mut c_void,
    amount: c_int,
    offset: ffi::sqlite3_int64,
) -> c_int {
    assert!(amount >= 0 && offset >= 0, "invalid read request: amount={amount} offset={offset}");
    assert!(amount == 0 || !data.is_null(), "null read buffer");
    let buf = unsafe { slice::from_raw_parts_mut(data.cast::<u8>(), amount as usize) };
    status(unsafe { sandboxed(file) }.read(buf, offset as u64))
}

unsafe extern "C" fn x_write(
    file: *mut ffi::sqlite3_file,
    data: *const c_void,
    amount: c_int,
    offset: ffi::sqlite3_int64,
) -> c_int {
    assert!(amount >= 0 && offset >= 0, "invalid write request: amount={amount} offset={offset}");
    assert!(amount == 0 || !data.is_null(), "null write buffer");
    let buf = unsafe { slice::from_raw_parts(data.cast::<u8>(), amount as usize) };
    status(unsafe { sandboxed(file) }.write(buf, offset as u64))
}

unsafe extern "C" fn x_truncate(file: *mut ffi::sqlite3_file, size: ffi::sqlite3_int64) -> c_int {
    assert!(size >= 0, "invalid truncate size: {size}");
    status(unsafe { sandboxed(file) }.truncate(size as u64))
}

unsafe extern "C" fn x_sync(file: *mut ffi::sqlite3_file, flags: c_int) -> c_int {
    let flags = SyncFlags {
        data_only: flags & ffi::SQLITE_SYNC_DATAONLY != 0,
        full: flags & ffi::SQLITE_SYNC_FULL == ffi::SQLITE_SYNC_FULL,
    };
    status(unsafe { sandboxed(file) }.sync(flags))
}

unsafe extern "C" fn x_file_size(file: *mut ffi::sqlite3_file, out: *mut ffi::sqlite3_int64) -> c_int {
    match unsafe { sandboxed(file) }.file_size() {
        Ok(size) => {
            unsafe { out.write(size as ffi::sqlite3_int64) };
            ffi::SQLITE_OK
        }
        Err(e) => e.code(),
    }
}

unsafe extern "C" fn x_lock(file: *mut ffi::sqlite3_file, level: c_int) -> c_int {
    status(unsafe { sandboxed(file) }.lock(LockMode::from_raw(level)))
}

unsafe extern "C" fn x_unlock(file: *mut ffi::sqlite3_file, level: c_int) -> c_int {
    status(unsafe { sandboxed(file) }.unlock(LockMode::from_raw(level)))
}

unsafe extern "C" fn x_check_reserved_lock(file: *mut ffi::sqlite3_file, out: *mut c_int) -> c_int {
    match unsafe { sandboxed(file) }.check_reserved_lock() {
        Ok(reserved) => {
            unsafe { out.write(c_int::from(reserved)) };
            ffi::SQLITE_OK
        }
        Err(e) => e.code(),
    }
}

unsafe extern "C" fn x_file_control(_file: *mut ffi::sqlite3_file, _op: c_int, _arg: *mut c_void) -> c_int {
    ffi::SQLITE_NOTFOUND
}

unsafe extern "C" fn x_sector_size(_file: *mut ffi::sqlite3_file) -> c_int {
    SECTOR_SIZE
}

unsafe extern "C" fn x_device_characteristics(_file: *mut ffi::sqlite3_file) -> c_int {
    0
}

unsafe extern "C" fn x_shm_map(
    file: *mut ffi::sqlite3_file,
    region: c_int,
    size: c_int,
    extend: c_int,
    out: *mut *mut c_void,
) -> c_int {
    if !out.is_null() {
        unsafe { out.write(ptr::null_mut()) };
    }
    status(unsafe { sandboxed(file) }.shm_map(region, size, extend != 0))
}

unsafe extern "C" fn x_shm_lock(file: *mut ffi::sqlite3_file, offset: c_int, n: c_int, flags: c_int) -> c_int {
    status(unsafe { sandboxed(file) }.shm_lock(offset, n, flags))
}

unsafe extern "C" fn x_shm_barrier(file: *mut ffi::sqlite3_file) {
    unsafe { sandboxed(file) }.shm_barrier();
}

unsafe extern "C" fn x_shm_unmap(file: *mut ffi::sqlite3_file, delete: c_int) -> c_int {
    status(unsafe { sandboxed(file) }.shm_unmap(delete != 0))
}

unsafe extern "C" fn x_fetch(
    file: *mut ffi::sqlite3_file,
    offset: ffi::sqlite3_int64,
    amount: c_int,
    out: *mut *mut c_void,
) -> c_int {
    if !out.is_null() {
        unsafe { out.write(ptr::null_mut()) };
    }
    status(unsafe { sandboxed(file) }.fetch(offset.max(0) as u64, amount.max(0) as usize))
}

unsafe extern "C" fn x_unfetch(file: *mut ffi::sqlite3_file, offset: ffi::sqlite3_int64, _page: *mut c_void) -> c_int {
    status(unsafe { sandboxed(file) }.unfetch(offset.max(0) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AccessRights;
    use crate::vfs::{UnregisterRunner, VfsFileSet};
    use std::ffi::CString;

    fn registered_set(vfs: &Arc<SandboxedVfs>, journal_rights: AccessRights) -> (VfsFileSet, UnregisterRunner) {
        let set = VfsFileSet::new(
            SandboxedFile::new(Some(tempfile::tempfile().unwrap()), AccessRights::ReadWrite),
            SandboxedFile::new(Some(tempfile::tempfile().unwrap()), journal_rights),
        );
        let runner = vfs.register(&set);
        (set, runner)
    }

    fn raw_vfs(vfs: &SandboxedVfs) -> *mut ffi::sqlite3_vfs {
        vfs.as_raw()
    }

    #[test]
    fn test_access_reports_empty_files_as_missing() {
        let vfs = SandboxedVfs::new().unwrap();
        let (set, _runner) = registered_set(&vfs, AccessRights::ReadWrite);
        let journal = CString::new(set.journal_virtual_path()).unwrap();
        let unknown = CString::new("nope_data.db-wal").unwrap();

        let mut out = -1;
        let rc = unsafe { x_access(raw_vfs(&vfs), journal.as_ptr(), ffi::SQLITE_ACCESS_EXISTS, &mut out) };
        assert_eq!(rc, ffi::SQLITE_OK);
        assert_eq!(out, 0);

        set.journal_file().open().unwrap();
        set.journal_file().write(b"hot", 0).unwrap();
        set.journal_file().close();
        let rc = unsafe { x_access(raw_vfs(&vfs), journal.as_ptr(), ffi::SQLITE_ACCESS_EXISTS, &mut out) };
        assert_eq!(rc, ffi::SQLITE_OK);
        assert_eq!(out, 1);

        let rc = unsafe { x_access(raw_vfs(&vfs), unknown.as_ptr(), ffi::SQLITE_ACCESS_EXISTS, &mut out) };
        assert_eq!(rc, ffi::SQLITE_OK);
        assert_eq!(out, 0);
    }

    #[test]
    fn test_access_readwrite_follows_rights() {
        let vfs = SandboxedVfs::new().unwrap();
        let (set, _runner) = registered_set(&vfs, AccessRights::ReadOnly);
        let db = CString::new(set.db_virtual_path()).unwrap();
        let journal = CString::new(set.journal_virtual_path()).unwrap();

        let mut out = -1;
        unsafe { x_access(raw_vfs(&vfs), db.as_ptr(), ffi::SQLITE_ACCESS_READWRITE, &mut out) };
        assert_eq!(out, 1);
        unsafe { x_access(raw_vfs(&vfs), journal.as_ptr(), ffi::SQLITE_ACCESS_READWRITE, &mut out) };
        assert_eq!(out, 0);
    }

    #[test]
    fn test_delete_truncates_registered_file() {
        let vfs = SandboxedVfs::new().unwrap();
        let (set, _runner) = registered_set(&vfs, AccessRights::ReadWrite);
        set.journal_file().open().unwrap();
        set.journal_file().write(&[1u8; 512], 0).unwrap();
        set.journal_file().close();

        let journal = CString::new(set.journal_virtual_path()).unwrap();
        let rc = unsafe { x_delete(raw_vfs(&vfs), journal.as_ptr(), 0) };
        assert_eq!(rc, ffi::SQLITE_OK);
        assert_eq!(set.journal_file().current_len().unwrap(), 0);

        let unknown = CString::new("missing").unwrap();
        let rc = unsafe { x_delete(raw_vfs(&vfs), unknown.as_ptr(), 0) };
        assert_eq!(rc, ffi::SQLITE_IOERR_DELETE_NOENT);
    }

    #[test]
    fn test_full_pathname_is_identity() {
        let vfs = SandboxedVfs::new().unwrap();
        let name = CString::new("7_data.db").unwrap();
        let mut out = [0 as c_char; 32];
        let rc = unsafe { x_full_pathname(raw_vfs(&vfs), name.as_ptr(), out.len() as c_int, out.as_mut_ptr()) };
        assert_eq!(rc, ffi::SQLITE_OK);
        assert_eq!(unsafe { CStr::from_ptr(out.as_ptr()) }, name.as_c_str());

        let mut small = [0 as c_char; 4];
        let rc = unsafe { x_full_pathname(raw_vfs(&vfs), name.as_ptr(), small.len() as c_int, small.as_mut_ptr()) };
        assert_eq!(rc, ffi::SQLITE_CANTOPEN);
    }

    #[test]
    fn test_open_binds_and_close_releases() {
        let vfs = SandboxedVfs::new().unwrap();
        let (set, _runner) = registered_set(&vfs, AccessRights::ReadOnly);
        let journal = CString::new(set.journal_virtual_path()).unwrap();

        let mut storage = mem::MaybeUninit::<FileHandle>::zeroed();
        let file = storage.as_mut_ptr().cast::<ffi::sqlite3_file>();
        let mut out_flags = 0;
        let flags = ffi::SQLITE_OPEN_MAIN_JOURNAL | ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        let rc = unsafe { x_open(raw_vfs(&vfs), journal.as_ptr(), file, flags, &mut out_flags) };
        assert_eq!(rc, ffi::SQLITE_OK);
        assert!(set.journal_file().is_valid());
        assert_ne!(out_flags & ffi::SQLITE_OPEN_READONLY, 0);
        assert_eq!(out_flags & ffi::SQLITE_OPEN_READWRITE, 0);
        assert_eq!(Arc::strong_count(set.journal_file()), 3);

        let mut size = -1;
        assert_eq!(unsafe { x_file_size(file, &mut size) }, ffi::SQLITE_OK);
        assert_eq!(size, 0);

        let mut pages: *mut c_void = ptr::null_mut();
        assert_eq!(unsafe { x_shm_map(file, 0, 32768, 1, &mut pages) }, ffi::SQLITE_IOERR);
        assert!(pages.is_null());

        assert_eq!(unsafe { x_close(file) }, ffi::SQLITE_OK);
        assert!(!set.journal_file().is_valid());
        assert_eq!(Arc::strong_count(set.journal_file()), 2);
    }

    #[test]
    fn test_open_unknown_path_fails_without_methods() {
        let vfs = SandboxedVfs::new().unwrap();
        let name = CString::new("0_unregistered.db").unwrap();
        let mut storage = mem::MaybeUninit::<FileHandle>::zeroed();
        let file = storage.as_mut_ptr().cast::<ffi::sqlite3_file>();
        let rc = unsafe { x_open(raw_vfs(&vfs), name.as_ptr(), file, ffi::SQLITE_OPEN_MAIN_DB, ptr::null_mut()) };
        assert_eq!(rc, ffi::SQLITE_CANTOPEN);
        assert!(unsafe { (*file).pMethods }.is_null());

        let rc = unsafe { x_open(raw_vfs(&vfs), ptr::null(), file, ffi::SQLITE_OPEN_TEMP_JOURNAL, ptr::null_mut()) };
        assert_eq!(rc, ffi::SQLITE_CANTOPEN);
    }
}
