use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, instrument};

use cofile_base::error::ErrorKind;
use cofile_base::CofileResult;

use crate::mode::Mode;
use crate::vfs::traits::{FileIo, Vfs};

/// Vfs implementation backed by the operating system's filesystem.
///
/// Locks are the platform's advisory file locks (`flock` on POSIX,
/// `LockFileEx` on Windows), so handles opened by other processes
/// contend as well. The OS releases a handle's lock when the handle
/// is closed.
#[derive(Debug, Default)]
pub struct OsVfs;

impl OsVfs {
    /// Create a new OsVfs.
    pub fn new() -> Self {
        Self
    }
}

impl Vfs for OsVfs {
    #[instrument(skip(self), fields(path = %path.display(), mode = ?mode))]
    fn open(&self, path: &Path, mode: Mode) -> CofileResult<Box<dyn FileIo>> {
        debug!("opening file");
        let file = mode.to_open_options().open(path).map_err(|e| {
            debug!(error = %e, "failed to open file");
            Box::new(cofile_base::CofileError::new(ErrorKind::FileError {
                path: path.to_path_buf(),
                source: e,
            }))
        })?;
        debug!("file opened successfully");
        Ok(Box::new(OsFile {
            file,
            path: path.to_path_buf(),
            locked: false,
        }))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn exists(&self, path: &Path) -> CofileResult<bool> {
        let exists = path.exists();
        debug!(exists, "checked file existence");
        Ok(exists)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn remove(&self, path: &Path) -> CofileResult<()> {
        fs::remove_file(path).map_err(|e| {
            debug!(error = %e, "failed to remove file");
            Box::new(cofile_base::CofileError::new(ErrorKind::FileError {
                path: path.to_path_buf(),
                source: e,
            }))
        })?;
        debug!("file removed successfully");
        Ok(())
    }
}

/// One OS file description. Keeps the pathname it was opened from for
/// error reporting, and whether this handle holds a lock so that
/// unlocking with nothing held stays a no-op on every platform.
#[derive(Debug)]
struct OsFile {
    file: fs::File,
    path: PathBuf,
    locked: bool,
}

impl OsFile {
    fn file_error(&self, source: std::io::Error) -> Box<cofile_base::CofileError> {
        ErrorKind::FileError {
            path: self.path.clone(),
            source,
        }
        .into()
    }

    fn lock_error(&self, source: std::io::Error) -> Box<cofile_base::CofileError> {
        ErrorKind::LockError {
            path: self.path.clone(),
            source,
        }
        .into()
    }
}

impl FileIo for OsFile {
    fn seek(&mut self, pos: SeekFrom) -> CofileResult<u64> {
        self.file.seek(pos).map_err(|e| self.file_error(e))
    }

    fn read(&mut self, buf: &mut [u8]) -> CofileResult<usize> {
        self.file.read(buf).map_err(|e| self.file_error(e))
    }

    fn write(&mut self, buf: &[u8]) -> CofileResult<usize> {
        self.file.write(buf).map_err(|e| self.file_error(e))
    }

    fn flush(&mut self) -> CofileResult<()> {
        self.file.flush().map_err(|e| self.file_error(e))
    }

    fn sync(&mut self) -> CofileResult<()> {
        self.file.sync_all().map_err(|e| self.file_error(e))
    }

    fn set_len(&mut self, len: u64) -> CofileResult<()> {
        self.file.set_len(len).map_err(|e| self.file_error(e))
    }

    // The fs2 calls use the qualified trait form: std::fs::File grew
    // inherent locking methods with the same names, and the plain
    // method syntax would resolve to those instead.

    fn lock_shared(&mut self) -> CofileResult<()> {
        FileExt::lock_shared(&self.file).map_err(|e| self.lock_error(e))?;
        self.locked = true;
        Ok(())
    }

    fn lock_exclusive(&mut self) -> CofileResult<()> {
        FileExt::lock_exclusive(&self.file).map_err(|e| self.lock_error(e))?;
        self.locked = true;
        Ok(())
    }

    fn unlock(&mut self) -> CofileResult<()> {
        // Releasing with nothing held must succeed; Windows reports
        // ERROR_NOT_LOCKED if the call reaches the OS.
        if !self.locked {
            return Ok(());
        }
        self.locked = false;
        FileExt::unlock(&self.file).map_err(|e| self.lock_error(e))
    }
}
