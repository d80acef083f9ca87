use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use cofile_base::error::ErrorKind;
use cofile_base::CofileResult;

use crate::mode::Mode;
use crate::vfs::traits::{FileIo, Vfs};

/// In-memory Vfs implementation for testing.
///
/// File contents live in a shared map; every opened handle carries its
/// own cursor. A lock table keyed by pathname reproduces the advisory
/// contract: shared holders are mutually compatible, an exclusive
/// holder is alone, and acquisition blocks until compatible. Plain
/// reads and writes stay unsynchronised so that tests can observe what
/// happens to callers that bypass the locks.
///
/// # Examples
///
/// ```
/// use cofile::{MemoryVfs, Vfs};
/// use std::path::Path;
///
/// let vfs = MemoryVfs::new();
/// vfs.add_file("test.txt", b"content".to_vec());
/// assert!(vfs.exists(Path::new("test.txt")).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryVfs {
    files: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<Vec<u8>>>>>>,
    locks: Arc<LockTable>,
    write_delay: Arc<Mutex<Option<Duration>>>,
}

impl MemoryVfs {
    /// Create a new empty MemoryVfs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the in-memory storage, replacing any previous
    /// content at that path.
    pub fn add_file(&self, path: impl Into<PathBuf>, content: Vec<u8>) {
        self.files
            .lock()
            .insert(path.into(), Arc::new(Mutex::new(content)));
    }

    /// Snapshot of the bytes currently stored at `path`.
    ///
    /// Reads the raw storage without taking the advisory lock, the
    /// same way any non-cooperating accessor would.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let files = self.files.lock();
        files.get(path.as_ref()).map(|content| content.lock().clone())
    }

    /// Stall every subsequent write midway for `delay`.
    ///
    /// The stalled writer keeps its advisory lock but not the content
    /// buffer, so raw accessors can observe the half-written state
    /// while lock-taking readers cannot. `None` turns the stall off.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.lock() = delay;
    }
}

impl Vfs for MemoryVfs {
    fn open(&self, path: &Path, mode: Mode) -> CofileResult<Box<dyn FileIo>> {
        let mut files = self.files.lock();
        let content = match files.get(path) {
            Some(content) => Arc::clone(content),
            None => {
                if !mode.writable() {
                    return Err(ErrorKind::FileError {
                        path: path.to_path_buf(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            format!("File not found: {}", path.display()),
                        ),
                    }
                    .into());
                }
                let content = Arc::new(Mutex::new(Vec::new()));
                files.insert(path.to_path_buf(), Arc::clone(&content));
                content
            }
        };
        Ok(Box::new(MemoryFile {
            path: path.to_path_buf(),
            content,
            locks: Arc::clone(&self.locks),
            write_delay: Arc::clone(&self.write_delay),
            mode,
            pos: 0,
            held: None,
        }))
    }

    fn exists(&self, path: &Path) -> CofileResult<bool> {
        Ok(self.files.lock().contains_key(path))
    }

    fn remove(&self, path: &Path) -> CofileResult<()> {
        let mut files = self.files.lock();
        if files.remove(path).is_none() {
            return Err(ErrorKind::FileError {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path.display()),
                ),
            }
            .into());
        }
        Ok(())
    }
}

/// Which advisory lock a handle currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeldLock {
    Shared,
    Exclusive,
}

/// Per-path shared/exclusive lock state.
///
/// Waiters block on the condvar and re-check compatibility whenever a
/// lock is released. Entries are removed once nobody holds the lock,
/// so the table does not grow with the number of paths ever touched.
#[derive(Debug, Default)]
struct LockTable {
    state: Mutex<HashMap<PathBuf, LockState>>,
    released: Condvar,
}

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    writer: bool,
}

impl LockTable {
    fn acquire_shared(&self, path: &Path) {
        let mut state = self.state.lock();
        loop {
            let entry = state.entry(path.to_path_buf()).or_default();
            if !entry.writer {
                entry.readers += 1;
                return;
            }
            self.released.wait(&mut state);
        }
    }

    fn acquire_exclusive(&self, path: &Path) {
        let mut state = self.state.lock();
        loop {
            let entry = state.entry(path.to_path_buf()).or_default();
            if !entry.writer && entry.readers == 0 {
                entry.writer = true;
                return;
            }
            self.released.wait(&mut state);
        }
    }

    fn release(&self, path: &Path, held: HeldLock) {
        let mut state = self.state.lock();
        if let Some(entry) = state.get_mut(path) {
            match held {
                HeldLock::Shared => entry.readers = entry.readers.saturating_sub(1),
                HeldLock::Exclusive => entry.writer = false,
            }
            if entry.readers == 0 && !entry.writer {
                state.remove(path);
            }
        }
        drop(state);
        self.released.notify_all();
    }
}

/// One handle onto a MemoryVfs file: a private cursor plus shared
/// content storage.
#[derive(Debug)]
struct MemoryFile {
    path: PathBuf,
    content: Arc<Mutex<Vec<u8>>>,
    locks: Arc<LockTable>,
    write_delay: Arc<Mutex<Option<Duration>>>,
    mode: Mode,
    pos: u64,
    held: Option<HeldLock>,
}

impl MemoryFile {
    fn io_error(&self, kind: std::io::ErrorKind, message: &str) -> Box<cofile_base::CofileError> {
        ErrorKind::FileError {
            path: self.path.clone(),
            source: std::io::Error::new(kind, message),
        }
        .into()
    }

    /// Copy `buf` into the content at the cursor, zero-filling any
    /// gap when the cursor sits past the current end.
    fn write_at_cursor(&mut self, buf: &[u8]) {
        let mut content = self.content.lock();
        let start = self.pos as usize;
        if content.len() < start {
            content.resize(start, 0);
        }
        let overlap = (content.len() - start).min(buf.len());
        content[start..start + overlap].copy_from_slice(&buf[..overlap]);
        content.extend_from_slice(&buf[overlap..]);
        drop(content);
        self.pos += buf.len() as u64;
    }
}

impl FileIo for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> CofileResult<u64> {
        let end = self.content.lock().len() as i128;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => self.pos as i128 + delta as i128,
            SeekFrom::End(delta) => end + delta as i128,
        };
        if target < 0 {
            return Err(self.io_error(
                std::io::ErrorKind::InvalidInput,
                "seek before start of file",
            ));
        }
        if target > u64::MAX as i128 {
            return Err(self.io_error(
                std::io::ErrorKind::InvalidInput,
                "seek past the maximum file offset",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> CofileResult<usize> {
        let content = self.content.lock();
        let start = self.pos as usize;
        if start >= content.len() {
            return Ok(0);
        }
        let count = buf.len().min(content.len() - start);
        buf[..count].copy_from_slice(&content[start..start + count]);
        drop(content);
        self.pos += count as u64;
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> CofileResult<usize> {
        if !self.mode.writable() {
            return Err(self.io_error(
                std::io::ErrorKind::PermissionDenied,
                "handle opened read-only",
            ));
        }
        let delay = *self.write_delay.lock();
        match delay {
            // Split the write around the stall so the intermediate
            // state exists while the content mutex is not held.
            Some(delay) if buf.len() > 1 => {
                let half = buf.len() / 2;
                self.write_at_cursor(&buf[..half]);
                std::thread::sleep(delay);
                self.write_at_cursor(&buf[half..]);
            }
            Some(delay) => {
                std::thread::sleep(delay);
                self.write_at_cursor(buf);
            }
            None => self.write_at_cursor(buf),
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> CofileResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> CofileResult<()> {
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> CofileResult<()> {
        if !self.mode.writable() {
            return Err(self.io_error(
                std::io::ErrorKind::PermissionDenied,
                "handle opened read-only",
            ));
        }
        self.content.lock().resize(len as usize, 0);
        Ok(())
    }

    fn lock_shared(&mut self) -> CofileResult<()> {
        if self.held.is_some() {
            return Err(ErrorKind::LockError {
                path: self.path.clone(),
                source: std::io::Error::other("handle already holds a lock"),
            }
            .into());
        }
        self.locks.acquire_shared(&self.path);
        self.held = Some(HeldLock::Shared);
        Ok(())
    }

    fn lock_exclusive(&mut self) -> CofileResult<()> {
        if self.held.is_some() {
            return Err(ErrorKind::LockError {
                path: self.path.clone(),
                source: std::io::Error::other("handle already holds a lock"),
            }
            .into());
        }
        self.locks.acquire_exclusive(&self.path);
        self.held = Some(HeldLock::Exclusive);
        Ok(())
    }

    fn unlock(&mut self) -> CofileResult<()> {
        if let Some(held) = self.held.take() {
            self.locks.release(&self.path, held);
        }
        Ok(())
    }
}

impl Drop for MemoryFile {
    /// A dropped handle releases its lock, mirroring how the OS drops
    /// advisory locks on close.
    fn drop(&mut self) {
        if let Some(held) = self.held.take() {
            self.locks.release(&self.path, held);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_open_read_only_missing_file() {
        let vfs = MemoryVfs::new();
        let result = vfs.open(Path::new("missing.txt"), Mode::ReadOnly);
        let err = result.err().expect("open should fail");
        assert!(matches!(err.kind(), ErrorKind::FileError { .. }));
    }

    #[test]
    fn test_open_write_create_creates_missing_file() {
        let vfs = MemoryVfs::new();
        let handle = vfs.open(Path::new("new.txt"), Mode::WriteCreate).unwrap();
        drop(handle);

        assert!(vfs.exists(Path::new("new.txt")).unwrap());
        assert_eq!(vfs.contents("new.txt").unwrap(), b"");
    }

    #[test]
    fn test_open_write_create_preserves_existing_content() {
        let vfs = MemoryVfs::new();
        vfs.add_file("keep.txt", b"keep".to_vec());

        let mut handle = vfs.open(Path::new("keep.txt"), Mode::WriteCreate).unwrap();
        handle.write(b"K").unwrap();
        drop(handle);

        assert_eq!(vfs.contents("keep.txt").unwrap(), b"Keep");
    }

    #[test]
    fn test_handles_share_content_but_not_cursor() {
        let vfs = MemoryVfs::new();
        vfs.add_file("shared.txt", b"abcdef".to_vec());

        let mut first = vfs.open(Path::new("shared.txt"), Mode::ReadOnly).unwrap();
        let mut second = vfs.open(Path::new("shared.txt"), Mode::ReadOnly).unwrap();

        let mut buf = [0u8; 3];
        first.read(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");

        // The second handle still starts at the beginning.
        second.read(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn test_write_past_end_zero_fills_gap() {
        let vfs = MemoryVfs::new();
        let mut handle = vfs.open(Path::new("gap.bin"), Mode::WriteCreate).unwrap();

        handle.seek(SeekFrom::Start(4)).unwrap();
        handle.write(b"x").unwrap();
        drop(handle);

        assert_eq!(vfs.contents("gap.bin").unwrap(), b"\0\0\0\0x");
    }

    #[test]
    fn test_write_overwrites_then_extends() {
        let vfs = MemoryVfs::new();
        vfs.add_file("mix.txt", b"abcd".to_vec());

        let mut handle = vfs.open(Path::new("mix.txt"), Mode::WriteCreate).unwrap();
        handle.seek(SeekFrom::Start(2)).unwrap();
        handle.write(b"XYZ").unwrap();
        drop(handle);

        assert_eq!(vfs.contents("mix.txt").unwrap(), b"abXYZ");
    }

    #[test]
    fn test_read_only_handle_cannot_write() {
        let vfs = MemoryVfs::new();
        vfs.add_file("ro.txt", b"data".to_vec());

        let mut handle = vfs.open(Path::new("ro.txt"), Mode::ReadOnly).unwrap();
        assert!(handle.write(b"x").is_err());
        assert!(handle.set_len(0).is_err());
    }

    #[test]
    fn test_seek_before_start_fails() {
        let vfs = MemoryVfs::new();
        vfs.add_file("seek.txt", b"data".to_vec());

        let mut handle = vfs.open(Path::new("seek.txt"), Mode::ReadOnly).unwrap();
        assert!(handle.seek(SeekFrom::Current(-1)).is_err());
        // The failed seek leaves the cursor where it was.
        assert_eq!(handle.seek(SeekFrom::Current(0)).unwrap(), 0);
    }

    #[test]
    fn test_seek_past_maximum_offset_fails() {
        let vfs = MemoryVfs::new();
        vfs.add_file("seek.txt", b"data".to_vec());

        let mut handle = vfs.open(Path::new("seek.txt"), Mode::ReadOnly).unwrap();
        handle.seek(SeekFrom::Start(u64::MAX)).unwrap();
        // The cursor cannot be pushed past u64::MAX, it stays put.
        assert!(handle.seek(SeekFrom::Current(1)).is_err());
        assert_eq!(handle.seek(SeekFrom::Current(0)).unwrap(), u64::MAX);
    }

    #[test]
    fn test_set_len_truncates_and_extends() {
        let vfs = MemoryVfs::new();
        vfs.add_file("len.txt", b"abcdef".to_vec());

        let mut handle = vfs.open(Path::new("len.txt"), Mode::WriteCreate).unwrap();
        handle.set_len(3).unwrap();
        assert_eq!(vfs.contents("len.txt").unwrap(), b"abc");

        handle.set_len(5).unwrap();
        assert_eq!(vfs.contents("len.txt").unwrap(), b"abc\0\0");
    }

    #[test]
    fn test_remove_missing_file_fails() {
        let vfs = MemoryVfs::new();
        assert!(vfs.remove(Path::new("never-there.txt")).is_err());
    }

    #[test]
    fn test_shared_locks_coexist() {
        let vfs = MemoryVfs::new();
        vfs.add_file("locked.txt", b"data".to_vec());

        let mut first = vfs.open(Path::new("locked.txt"), Mode::ReadOnly).unwrap();
        let mut second = vfs.open(Path::new("locked.txt"), Mode::ReadOnly).unwrap();
        first.lock_shared().unwrap();
        // Must not block: shared holders are compatible.
        second.lock_shared().unwrap();
        first.unlock().unwrap();
        second.unlock().unwrap();
    }

    #[test]
    fn test_exclusive_lock_blocks_until_released() {
        let vfs = MemoryVfs::new();
        vfs.add_file("locked.txt", b"data".to_vec());

        let mut holder = vfs.open(Path::new("locked.txt"), Mode::WriteCreate).unwrap();
        holder.lock_exclusive().unwrap();

        let acquired = Arc::new(AtomicBool::new(false));
        let acquired_in_thread = Arc::clone(&acquired);
        let vfs_in_thread = vfs.clone();
        let waiter = std::thread::spawn(move || {
            let mut contender = vfs_in_thread
                .open(Path::new("locked.txt"), Mode::WriteCreate)
                .unwrap();
            contender.lock_exclusive().unwrap();
            acquired_in_thread.store(true, Ordering::SeqCst);
            contender.unlock().unwrap();
        });

        // Give the contender time to reach the lock and block on it.
        std::thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        holder.unlock().unwrap();
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_exclusive_lock_waits_for_shared_holders() {
        let vfs = MemoryVfs::new();
        vfs.add_file("locked.txt", b"data".to_vec());

        let mut reader = vfs.open(Path::new("locked.txt"), Mode::ReadOnly).unwrap();
        reader.lock_shared().unwrap();

        let acquired = Arc::new(AtomicBool::new(false));
        let acquired_in_thread = Arc::clone(&acquired);
        let vfs_in_thread = vfs.clone();
        let waiter = std::thread::spawn(move || {
            let mut writer = vfs_in_thread
                .open(Path::new("locked.txt"), Mode::WriteCreate)
                .unwrap();
            writer.lock_exclusive().unwrap();
            acquired_in_thread.store(true, Ordering::SeqCst);
            writer.unlock().unwrap();
        });

        std::thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        reader.unlock().unwrap();
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_lock_while_holding_one_fails() {
        let vfs = MemoryVfs::new();
        vfs.add_file("locked.txt", b"data".to_vec());

        let mut handle = vfs.open(Path::new("locked.txt"), Mode::WriteCreate).unwrap();
        handle.lock_shared().unwrap();
        let err = handle.lock_exclusive().err().expect("relock should fail");
        assert!(matches!(err.kind(), ErrorKind::LockError { .. }));
        handle.unlock().unwrap();
    }

    #[test]
    fn test_unlock_without_lock_is_noop() {
        let vfs = MemoryVfs::new();
        vfs.add_file("locked.txt", b"data".to_vec());

        let mut handle = vfs.open(Path::new("locked.txt"), Mode::ReadOnly).unwrap();
        handle.unlock().unwrap();
        handle.unlock().unwrap();
    }

    #[test]
    fn test_dropped_handle_releases_lock() {
        let vfs = MemoryVfs::new();
        vfs.add_file("locked.txt", b"data".to_vec());

        let mut holder = vfs.open(Path::new("locked.txt"), Mode::WriteCreate).unwrap();
        holder.lock_exclusive().unwrap();
        drop(holder);

        // If the drop leaked the lock this would block forever.
        let mut next = vfs.open(Path::new("locked.txt"), Mode::WriteCreate).unwrap();
        next.lock_exclusive().unwrap();
        next.unlock().unwrap();
    }

    #[test]
    fn test_locks_key_on_path_identity() {
        let vfs = MemoryVfs::new();
        vfs.add_file("a.txt", b"a".to_vec());
        vfs.add_file("b.txt", b"b".to_vec());

        let mut on_a = vfs.open(Path::new("a.txt"), Mode::WriteCreate).unwrap();
        let mut on_b = vfs.open(Path::new("b.txt"), Mode::WriteCreate).unwrap();
        on_a.lock_exclusive().unwrap();
        // Different path, no contention.
        on_b.lock_exclusive().unwrap();
        on_a.unlock().unwrap();
        on_b.unlock().unwrap();
    }

    #[test]
    fn test_write_delay_exposes_torn_state_to_raw_reads() {
        let vfs = MemoryVfs::new();
        vfs.add_file("torn.bin", b"aaaaaa".to_vec());
        vfs.set_write_delay(Some(Duration::from_millis(80)));

        let vfs_in_thread = vfs.clone();
        let writer = std::thread::spawn(move || {
            let mut handle = vfs_in_thread
                .open(Path::new("torn.bin"), Mode::WriteCreate)
                .unwrap();
            handle.lock_exclusive().unwrap();
            handle.write(b"bbbbbb").unwrap();
            handle.unlock().unwrap();
        });

        // Sample the raw content until the first half lands. The
        // advisory lock is held the whole time, but raw access does
        // not take it, so the half-written state is observable. The
        // poll interval is far below the stall, so the first change
        // seen is the torn state and never the finished write.
        let mut sampled = vfs.contents("torn.bin").unwrap();
        for _ in 0..200 {
            if sampled != b"aaaaaa" {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
            sampled = vfs.contents("torn.bin").unwrap();
        }
        writer.join().unwrap();

        assert_eq!(sampled, b"bbbaaa");
        assert_eq!(vfs.contents("torn.bin").unwrap(), b"bbbbbb");
    }
}
