use std::io::SeekFrom;
use std::path::Path;

use tracing::{debug, instrument, trace};

use cofile_base::error::ErrorKind;
use cofile_base::{CofileResult, ResultExt};

use crate::file_ref::FileRef;
use crate::handle::OpenFile;
use crate::mode::Mode;
use crate::vfs::VfsHandle;

/// Byte-oriented read cursor over one shared file.
///
/// Every operation brackets itself in the file's shared advisory
/// lock: it acquires the lock, does its work, and releases the lock
/// before returning. Any number of readers therefore interleave
/// freely, while a writer holding the exclusive lock keeps them all
/// waiting. The cursor is private to this handle and advances only
/// through its own operations.
///
/// A reader with nothing open reports every operation as a
/// [`NotOpen`](ErrorKind::NotOpen) error rather than panicking.
///
/// # Examples
///
/// ```no_run
/// use cofile::{FileReader, VfsHandle};
/// use std::path::Path;
///
/// # fn main() -> cofile_base::CofileResult<()> {
/// let mut reader = FileReader::open(VfsHandle::default(), Path::new("data.bin"))?;
/// while let Some(byte) = reader.read_byte()? {
///     println!("{byte}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileReader {
    vfs: VfsHandle,
    open: Option<OpenFile>,
}

impl FileReader {
    /// Create a reader with nothing open. [`ready`](Self::ready)
    /// stays false until [`reopen`](Self::reopen) succeeds.
    pub fn new(vfs: VfsHandle) -> Self {
        Self { vfs, open: None }
    }

    /// Open the file at `path` for reading. The file must exist.
    pub fn open(vfs: VfsHandle, path: &Path) -> CofileResult<Self> {
        let mut reader = Self::new(vfs);
        reader.reopen(path)?;
        Ok(reader)
    }

    /// Open the file a [`FileRef`] resolves to.
    pub fn open_ref(vfs: VfsHandle, file: &FileRef) -> CofileResult<Self> {
        let resolved = file.resolve()?;
        Self::open(vfs, &resolved).with_context(|| format!("opening reader for {}", file))
    }

    /// Open `path`, first closing whatever is currently open.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn reopen(&mut self, path: &Path) -> CofileResult<()> {
        if self.open.is_some() {
            self.close()?;
        }
        let io = self.vfs.open(path, Mode::ReadOnly)?;
        self.open = Some(OpenFile {
            path: path.to_path_buf(),
            io,
        });
        debug!("reader opened");
        Ok(())
    }

    /// Whether a file is currently open.
    pub fn ready(&self) -> bool {
        self.open.is_some()
    }

    /// Pathname of the open file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.open.as_ref().map(|open| open.path.as_path())
    }

    /// Close the handle, releasing any lock it still holds.
    ///
    /// Closing an already-closed reader is an error. Cleanup proceeds
    /// through every step even when one fails; the first failure is
    /// the one reported.
    #[instrument(skip(self))]
    pub fn close(&mut self) -> CofileResult<()> {
        let Some(mut open) = self.open.take() else {
            return Err(ErrorKind::NotOpen { operation: "close" }.into());
        };
        let unlocked = open.io.unlock();
        drop(open);
        debug!("reader closed");
        unlocked
    }

    /// Read the byte at the cursor and advance past it. Returns
    /// `Ok(None)` at end-of-file.
    pub fn read_byte(&mut self) -> CofileResult<Option<u8>> {
        self.with_shared_lock("read_byte", |open| {
            let mut byte = [0u8; 1];
            let count = open.io.read(&mut byte)?;
            Ok((count == 1).then_some(byte[0]))
        })
    }

    /// Read up to `max_len` bytes from the cursor. The result is
    /// shorter than `max_len` only when end-of-file cuts it short.
    pub fn read(&mut self, max_len: usize) -> CofileResult<Vec<u8>> {
        self.with_shared_lock("read", |open| {
            let mut out = vec![0u8; max_len];
            let mut filled = 0;
            while filled < max_len {
                let count = open.io.read(&mut out[filled..])?;
                if count == 0 {
                    break;
                }
                filled += count;
            }
            out.truncate(filled);
            trace!(requested = max_len, read = filled, "read");
            Ok(out)
        })
    }

    /// Read up to `max_len` bytes into `buf`, starting at `offset`
    /// within the buffer. Returns the number of bytes stored.
    ///
    /// The buffer never grows: the read is clamped to the space
    /// between `offset` and the buffer's end. An `offset` at or past
    /// the end reads nothing, leaves `buf` untouched and returns 0.
    pub fn read_into(
        &mut self,
        buf: &mut [u8],
        offset: usize,
        max_len: usize,
    ) -> CofileResult<usize> {
        self.with_shared_lock("read_into", |open| {
            if offset >= buf.len() {
                return Ok(0);
            }
            let window = (buf.len() - offset).min(max_len);
            let mut filled = 0;
            while filled < window {
                let count = open.io.read(&mut buf[offset + filled..offset + window])?;
                if count == 0 {
                    break;
                }
                filled += count;
            }
            trace!(offset, requested = max_len, read = filled, "read_into");
            Ok(filled)
        })
    }

    /// Move the cursor `delta` bytes, backward when negative. Returns
    /// the distance actually moved: 0 when the move would land before
    /// the start of the file, in which case the cursor stays put. A
    /// forward move past the largest seekable offset is an error.
    pub fn skip(&mut self, delta: i64) -> CofileResult<i64> {
        self.with_shared_lock("skip", |open| open.skip(delta))
    }

    /// Move the cursor back to offset 0.
    pub fn reset_pos(&mut self) -> CofileResult<()> {
        self.with_shared_lock("reset_pos", |open| {
            open.io.seek(SeekFrom::Start(0))?;
            Ok(())
        })
    }

    /// Run `operation` while holding the shared lock on the open
    /// file. The lock is released on both the success and the error
    /// path; an operation error wins over an unlock error.
    fn with_shared_lock<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut OpenFile) -> CofileResult<T>,
    ) -> CofileResult<T> {
        let Some(open) = self.open.as_mut() else {
            return Err(ErrorKind::NotOpen { operation }.into());
        };
        open.io.lock_shared()?;
        let result = f(open);
        let unlocked = open.io.unlock();
        match result {
            Ok(value) => unlocked.map(|()| value),
            Err(err) => Err(err),
        }
    }
}

impl Drop for FileReader {
    fn drop(&mut self) {
        if let Some(mut open) = self.open.take() {
            let _ = open.io.unlock();
        }
    }
}
