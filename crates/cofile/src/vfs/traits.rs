use std::fmt;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use cofile_base::CofileResult;

use crate::mode::Mode;

/// One opened file description.
///
/// A `FileIo` owns its descriptor exclusively and carries the cursor
/// for that descriptor. The lock methods operate on the identity of
/// the underlying file, not on this handle, so two handles opened on
/// the same path contend with each other.
pub trait FileIo: fmt::Debug + Send {
    /// Move the cursor. Returns the resulting absolute offset.
    fn seek(&mut self, pos: SeekFrom) -> CofileResult<u64>;

    /// Read from the cursor into `buf`, advancing the cursor by the
    /// returned count. A short read is not an error; 0 means the
    /// cursor is at or past end-of-file.
    fn read(&mut self, buf: &mut [u8]) -> CofileResult<usize>;

    /// Write from `buf` at the cursor, overwriting existing bytes and
    /// extending the file as needed. Advances the cursor by the
    /// returned count, which may be short.
    fn write(&mut self, buf: &[u8]) -> CofileResult<usize>;

    /// Flush library-level buffering to the operating system.
    fn flush(&mut self) -> CofileResult<()>;

    /// Force written data down to durable storage.
    fn sync(&mut self) -> CofileResult<()>;

    /// Truncate or extend the file to `len` bytes. Extension fills
    /// with zero bytes. The cursor is left where it was.
    fn set_len(&mut self, len: u64) -> CofileResult<()>;

    /// Block until this handle holds a shared lock on the file.
    ///
    /// Shared holders are mutually compatible; an exclusive holder
    /// excludes everyone else. The lock is advisory: it constrains
    /// only callers that also take locks.
    fn lock_shared(&mut self) -> CofileResult<()>;

    /// Block until this handle is the sole lock holder of the file.
    fn lock_exclusive(&mut self) -> CofileResult<()>;

    /// Release whatever lock this handle holds. Unlocking a handle
    /// that holds nothing is permitted and does nothing.
    fn unlock(&mut self) -> CofileResult<()>;
}

/// Filesystem the reader and writer handles operate against.
///
/// Two implementations are provided:
/// - `OsVfs`: the operating system's filesystem
/// - `MemoryVfs`: in-memory implementation for testing
pub trait Vfs: fmt::Debug + Send + Sync + 'static {
    /// Open the file at `path` with the given mode.
    fn open(&self, path: &Path, mode: Mode) -> CofileResult<Box<dyn FileIo>>;

    /// Check if a file exists at the given path.
    fn exists(&self, path: &Path) -> CofileResult<bool>;

    /// Remove the file at the given path.
    fn remove(&self, path: &Path) -> CofileResult<()>;
}

/// Handle to a Vfs implementation, enabling shared ownership.
///
/// Internally wraps `Arc<dyn Vfs>` for cheap cloning and thread-safe
/// sharing. Every clone talks to the same backend, so handles built
/// from clones contend for the same files.
///
/// # Examples
///
/// ```
/// use cofile::{MemoryVfs, VfsHandle};
///
/// let vfs = VfsHandle::new(MemoryVfs::new());
/// let vfs_clone = vfs.clone(); // Cheap clone, shares the same backend
/// ```
#[derive(Debug, Clone)]
pub struct VfsHandle(Arc<dyn Vfs>);

impl VfsHandle {
    /// Create a new VfsHandle from a Vfs implementation.
    pub fn new(vfs: impl Vfs + 'static) -> Self {
        Self(Arc::new(vfs))
    }
}

impl std::ops::Deref for VfsHandle {
    type Target = dyn Vfs;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl Default for VfsHandle {
    /// The operating system's filesystem.
    fn default() -> Self {
        Self::new(crate::vfs::OsVfs::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryVfs;

    #[test]
    fn test_vfs_handle_clone_shares_backend() {
        let memory = MemoryVfs::new();
        memory.add_file("shared.txt", b"content".to_vec());
        let vfs = VfsHandle::new(memory);
        let vfs_clone = vfs.clone();
        assert!(vfs_clone.exists(Path::new("shared.txt")).unwrap());
    }

    #[test]
    fn test_vfs_handle_deref() {
        let vfs = VfsHandle::new(MemoryVfs::new());
        assert!(!vfs.exists(Path::new("missing.txt")).unwrap());
    }

    #[test]
    fn test_vfs_handle_default_is_os_backed() {
        let vfs = VfsHandle::default();
        let missing = std::env::temp_dir().join("cofile-definitely-missing-4f2a");
        assert!(!vfs.exists(&missing).unwrap());
    }
}
