//! Filesystem access behind the reader and writer handles.
//!
//! The `Vfs` trait carries the operations the handles need; `OsVfs`
//! maps them onto the real filesystem and its advisory locks, while
//! `MemoryVfs` reproduces the same contract in memory for tests.

mod memory;
mod os;
mod traits;

pub use memory::MemoryVfs;
pub use os::OsVfs;
pub use traits::{FileIo, Vfs, VfsHandle};
