//! Foundational error handling and tracing setup shared by the cofile
//! crates.

pub mod error;
pub mod tracing;

// Re-export commonly used types for convenience
pub use error::{CofileError, CofileResult, ErrorKind, ResultExt};
