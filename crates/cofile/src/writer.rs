use std::io::SeekFrom;
use std::path::Path;

use tracing::{debug, instrument, trace};

use cofile_base::error::ErrorKind;
use cofile_base::{CofileResult, ResultExt};

use crate::file_ref::FileRef;
use crate::handle::OpenFile;
use crate::mode::Mode;
use crate::vfs::VfsHandle;

/// Byte-oriented write cursor over one shared file.
///
/// Every mutating operation brackets itself in the file's exclusive
/// advisory lock, so at most one writer mutates the file at a time
/// and lock-taking readers never observe a half-applied write.
/// Opening creates the file when it is missing and never truncates
/// existing content; truncation is explicit via [`clear`](Self::clear).
///
/// Plain writes go through the cursor, overwriting in place. The
/// append variants jump the cursor to end-of-file first and leave it
/// after the written bytes, so a following plain write continues from
/// there.
///
/// # Examples
///
/// ```no_run
/// use cofile::{FileWriter, VfsHandle};
/// use std::path::Path;
///
/// # fn main() -> cofile_base::CofileResult<()> {
/// let mut writer = FileWriter::open(VfsHandle::default(), Path::new("out.log"))?;
/// writer.append(b"one more line\n")?;
/// writer.flush()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileWriter {
    vfs: VfsHandle,
    open: Option<OpenFile>,
}

impl FileWriter {
    /// Create a writer with nothing open. [`ready`](Self::ready)
    /// stays false until [`reopen`](Self::reopen) succeeds.
    pub fn new(vfs: VfsHandle) -> Self {
        Self { vfs, open: None }
    }

    /// Open the file at `path` for writing, creating it when missing.
    pub fn open(vfs: VfsHandle, path: &Path) -> CofileResult<Self> {
        let mut writer = Self::new(vfs);
        writer.reopen(path)?;
        Ok(writer)
    }

    /// Open the file a [`FileRef`] resolves to.
    pub fn open_ref(vfs: VfsHandle, file: &FileRef) -> CofileResult<Self> {
        let resolved = file.resolve()?;
        Self::open(vfs, &resolved).with_context(|| format!("opening writer for {}", file))
    }

    /// Open `path`, first closing whatever is currently open.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn reopen(&mut self, path: &Path) -> CofileResult<()> {
        if self.open.is_some() {
            self.close()?;
        }
        let io = self.vfs.open(path, Mode::WriteCreate)?;
        self.open = Some(OpenFile {
            path: path.to_path_buf(),
            io,
        });
        debug!("writer opened");
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

    /// Close the handle: flush buffered data, release any lock, then
    /// release the file.
    ///
    /// Closing an already-closed writer is an error. Cleanup proceeds
    /// through every step even when one fails; the first failure is
    /// the one reported.
    #[instrument(skip(self))]
    pub fn close(&mut self) -> CofileResult<()> {
        let Some(mut open) = self.open.take() else {
            return Err(ErrorKind::NotOpen { operation: "close" }.into());
        };
        let flushed = open.io.flush();
        let synced = open.io.sync();
        let unlocked = open.io.unlock();
        drop(open);
        debug!("writer closed");
        flushed.and(synced).and(unlocked)
    }

    /// Write one byte at the cursor, overwriting what is there, and
    /// advance past it.
    pub fn write_byte(&mut self, byte: u8) -> CofileResult<()> {
        self.with_exclusive_lock("write_byte", |open| {
            open.write_all(&[byte])?;
            Ok(())
        })
    }

    /// Write all of `bytes` at the cursor, overwriting in place and
    /// extending the file as needed. Returns the number of bytes
    /// written; the cursor advances by the same amount.
    pub fn write(&mut self, bytes: &[u8]) -> CofileResult<usize> {
        self.with_exclusive_lock("write", |open| {
            let written = open.write_all(bytes)?;
            trace!(written, "write");
            Ok(written)
        })
    }

    /// Write the sub-range of `bytes` starting at `offset`, `len`
    /// defaulting to the rest of the slice. The range is clamped to
    /// the slice, so an out-of-range `offset` writes nothing and
    /// returns 0.
    pub fn write_range(
        &mut self,
        bytes: &[u8],
        offset: usize,
        len: Option<usize>,
    ) -> CofileResult<usize> {
        self.with_exclusive_lock("write_range", |open| {
            open.write_all(range_of(bytes, offset, len))
        })
    }

    /// Jump the cursor to end-of-file, then write one byte. The
    /// cursor stays after the written byte.
    pub fn append_byte(&mut self, byte: u8) -> CofileResult<()> {
        self.with_exclusive_lock("append_byte", |open| {
            open.io.seek(SeekFrom::End(0))?;
            open.write_all(&[byte])?;
            Ok(())
        })
    }

    /// Jump the cursor to end-of-file, then write all of `bytes`.
    /// The cursor stays after the written bytes; the jump is not
    /// sticky and a later plain write goes through the cursor as
    /// usual.
    pub fn append(&mut self, bytes: &[u8]) -> CofileResult<usize> {
        self.with_exclusive_lock("append", |open| {
            open.io.seek(SeekFrom::End(0))?;
            let written = open.write_all(bytes)?;
            trace!(written, "append");
            Ok(written)
        })
    }

    /// Jump the cursor to end-of-file, then write the sub-range of
    /// `bytes` starting at `offset`, `len` defaulting to the rest of
    /// the slice. The range is clamped the same way as
    /// [`write_range`](Self::write_range).
    pub fn append_range(
        &mut self,
        bytes: &[u8],
        offset: usize,
        len: Option<usize>,
    ) -> CofileResult<usize> {
        self.with_exclusive_lock("append_range", |open| {
            open.io.seek(SeekFrom::End(0))?;
            open.write_all(range_of(bytes, offset, len))
        })
    }

    /// Push buffered data down to durable storage.
    pub fn flush(&mut self) -> CofileResult<()> {
        let Some(open) = self.open.as_mut() else {
            return Err(ErrorKind::NotOpen { operation: "flush" }.into());
        };
        open.io.flush()?;
        open.io.sync()
    }

    /// Truncate the file to zero length and put the cursor at 0.
    ///
    /// The handle stays open and fully usable; a later write starts
    /// from a genuinely empty file. Clearing an already-empty file is
    /// a no-op that still succeeds.
    #[instrument(skip(self))]
    pub fn clear(&mut self) -> CofileResult<()> {
        self.with_exclusive_lock("clear", |open| {
            open.io.set_len(0)?;
            open.io.seek(SeekFrom::Start(0))?;
            debug!("file cleared");
            Ok(())
        })
    }

    /// Move the cursor `delta` bytes, backward when negative. Returns
    /// the distance actually moved: 0 when the move would land before
    /// the start of the file, in which case the cursor stays put. A
    /// forward move past the largest seekable offset is an error.
    pub fn skip(&mut self, delta: i64) -> CofileResult<i64> {
        self.with_exclusive_lock("skip", |open| open.skip(delta))
    }

    /// Run `operation` while holding the exclusive lock on the open
    /// file. The lock is released on both the success and the error
    /// path; an operation error wins over an unlock error.
    fn with_exclusive_lock<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut OpenFile) -> CofileResult<T>,
    ) -> CofileResult<T> {
        let Some(open) = self.open.as_mut() else {
            return Err(ErrorKind::NotOpen { operation }.into());
        };
        open.io.lock_exclusive()?;
        let result = f(open);
        let unlocked = open.io.unlock();
        match result {
            Ok(value) => unlocked.map(|()| value),
            Err(err) => Err(err),
        }
    }
}

impl Drop for FileWriter {
    /// An abandoned writer still flushes and releases its lock.
    fn drop(&mut self) {
        if let Some(mut open) = self.open.take() {
            let _ = open.io.flush();
            let _ = open.io.sync();
            let _ = open.io.unlock();
        }
    }
}

/// Sub-range of `bytes` from `offset`, at most `len` long, clamped so
/// it never leaves the slice.
fn range_of(bytes: &[u8], offset: usize, len: Option<usize>) -> &[u8] {
    let Some(available) = bytes.len().checked_sub(offset) else {
        return &[];
    };
    let take = len.unwrap_or(available).min(available);
    &bytes[offset..offset + take]
}
