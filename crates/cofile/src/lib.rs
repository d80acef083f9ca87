//! Coordinated shared-file access.
//!
//! A [`FileReader`] and a [`FileWriter`] are byte cursors over one
//! file each. Every operation brackets itself in the file's advisory
//! lock (shared for reads, exclusive for writes), so concurrent
//! readers interleave freely while writes are serialised and never
//! observed half-applied by other lock-taking handles. The handles
//! run against a [`Vfs`]: [`OsVfs`] for the real filesystem,
//! [`MemoryVfs`] for tests.

pub mod file_ref;
mod handle;
pub mod mode;
pub mod reader;
pub mod vfs;
pub mod writer;


pub use file_ref::FileRef;
pub use mode::Mode;
pub use reader::FileReader;
pub use vfs::{FileIo, MemoryVfs, OsVfs, Vfs, VfsHandle};
pub use writer::FileWriter;
