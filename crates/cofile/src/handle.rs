use std::io::SeekFrom;
use std::path::PathBuf;

use cofile_base::error::ErrorKind;
use cofile_base::CofileResult;

use crate::vfs::FileIo;

/// The open state a reader or writer carries: the pathname it was
/// opened from plus the file description behind it. A handle is
/// either fully open (this struct exists) or fully closed (it does
/// not); there is no partially initialised state in between.
#[derive(Debug)]
pub(crate) struct OpenFile {
    pub(crate) path: PathBuf,
    pub(crate) io: Box<dyn FileIo>,
}

impl OpenFile {
    /// Move the cursor `delta` bytes, backward when negative.
    ///
    /// Returns the distance actually moved. A backward move that
    /// would land before the start of the file moves nothing and
    /// returns 0, leaving the cursor where it was. A forward move
    /// that would pass the largest seekable offset is an error and
    /// also leaves the cursor in place.
    pub(crate) fn skip(&mut self, delta: i64) -> CofileResult<i64> {
        let current = self.io.seek(SeekFrom::Current(0))?;
        if delta < 0 && delta.unsigned_abs() > current {
            return Ok(0);
        }
        // Offsets are capped at i64::MAX, the largest target an OS
        // seek can address.
        let in_range = current
            .checked_add_signed(delta)
            .is_some_and(|target| i64::try_from(target).is_ok());
        if !in_range {
            return Err(ErrorKind::FileError {
                path: self.path.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "seek past the maximum file offset",
                ),
            }
            .into());
        }
        let landed = self.io.seek(SeekFrom::Current(delta))?;
        Ok(landed as i64 - current as i64)
    }

    /// Write the whole slice at the cursor, looping over short
    /// writes. The cursor ends up after the last byte written, also
    /// when an error cuts the loop off early.
    pub(crate) fn write_all(&mut self, bytes: &[u8]) -> CofileResult<usize> {
        let mut written = 0;
        while written < bytes.len() {
            let count = self.io.write(&bytes[written..])?;
            if count == 0 {
                return Err(ErrorKind::FileError {
                    path: self.path.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "write made no progress",
                    ),
                }
                .into());
            }
            written += count;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use crate::vfs::{MemoryVfs, Vfs};
    use std::path::Path;

    fn open_file(vfs: &MemoryVfs, path: &str, mode: Mode) -> OpenFile {
        OpenFile {
            path: PathBuf::from(path),
            io: vfs.open(Path::new(path), mode).unwrap(),
        }
    }

    #[test]
    fn test_skip_forward() {
        let vfs = MemoryVfs::new();
        vfs.add_file("skip.txt", b"abcdef".to_vec());
        let mut open = open_file(&vfs, "skip.txt", Mode::ReadOnly);

        assert_eq!(open.skip(4).unwrap(), 4);
        assert_eq!(open.io.seek(SeekFrom::Current(0)).unwrap(), 4);
    }

    #[test]
    fn test_skip_backward() {
        let vfs = MemoryVfs::new();
        vfs.add_file("skip.txt", b"abcdef".to_vec());
        let mut open = open_file(&vfs, "skip.txt", Mode::ReadOnly);

        open.skip(4).unwrap();
        assert_eq!(open.skip(-3).unwrap(), -3);
        assert_eq!(open.io.seek(SeekFrom::Current(0)).unwrap(), 1);
    }

    #[test]
    fn test_skip_backward_past_start_moves_nothing() {
        let vfs = MemoryVfs::new();
        vfs.add_file("skip.txt", b"abcdef".to_vec());
        let mut open = open_file(&vfs, "skip.txt", Mode::ReadOnly);

        open.skip(2).unwrap();
        assert_eq!(open.skip(-5).unwrap(), 0);
        // Cursor stays at the pre-skip offset.
        assert_eq!(open.io.seek(SeekFrom::Current(0)).unwrap(), 2);
    }

    #[test]
    fn test_skip_to_exact_start() {
        let vfs = MemoryVfs::new();
        vfs.add_file("skip.txt", b"abcdef".to_vec());
        let mut open = open_file(&vfs, "skip.txt", Mode::ReadOnly);

        open.skip(3).unwrap();
        assert_eq!(open.skip(-3).unwrap(), -3);
        assert_eq!(open.io.seek(SeekFrom::Current(0)).unwrap(), 0);
    }

    #[test]
    fn test_skip_past_end_is_allowed() {
        let vfs = MemoryVfs::new();
        vfs.add_file("skip.txt", b"ab".to_vec());
        let mut open = open_file(&vfs, "skip.txt", Mode::ReadOnly);

        assert_eq!(open.skip(10).unwrap(), 10);
        let mut buf = [0u8; 1];
        assert_eq!(open.io.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_skip_past_maximum_offset_fails() {
        let vfs = MemoryVfs::new();
        vfs.add_file("skip.txt", b"abcdef".to_vec());
        let mut open = open_file(&vfs, "skip.txt", Mode::ReadOnly);

        open.skip(6).unwrap();
        let err = open.skip(i64::MAX).err().expect("skip should fail");
        assert!(matches!(err.kind(), ErrorKind::FileError { .. }));
        // The refused move left the cursor where it was.
        assert_eq!(open.io.seek(SeekFrom::Current(0)).unwrap(), 6);
    }

    #[test]
    fn test_skip_to_maximum_offset_is_allowed() {
        let vfs = MemoryVfs::new();
        vfs.add_file("skip.txt", b"ab".to_vec());
        let mut open = open_file(&vfs, "skip.txt", Mode::ReadOnly);

        assert_eq!(open.skip(i64::MAX).unwrap(), i64::MAX);
        // One more byte would pass the cap.
        assert!(open.skip(1).is_err());
        assert_eq!(open.io.seek(SeekFrom::Current(0)).unwrap(), i64::MAX as u64);
    }

    #[test]
    fn test_write_all_writes_everything() {
        let vfs = MemoryVfs::new();
        let mut open = open_file(&vfs, "out.txt", Mode::WriteCreate);

        assert_eq!(open.write_all(b"payload").unwrap(), 7);
        assert_eq!(vfs.contents("out.txt").unwrap(), b"payload");
    }

    #[test]
    fn test_write_all_empty_slice() {
        let vfs = MemoryVfs::new();
        let mut open = open_file(&vfs, "out.txt", Mode::WriteCreate);

        assert_eq!(open.write_all(b"").unwrap(), 0);
        assert_eq!(vfs.contents("out.txt").unwrap(), b"");
    }
}
