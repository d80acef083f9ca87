use std::fmt;
use std::path::{Path, PathBuf};

use cofile_base::error::ErrorKind;
use cofile_base::CofileResult;

/// Reference to a file by pathname.
///
/// A thin wrapper around the platform path type: separator handling,
/// name extraction and parent traversal are all delegated to
/// `std::path`. A `FileRef` never touches the filesystem except in
/// [`resolve`](Self::resolve), so it can refer to files that do not
/// exist yet.
///
/// # Examples
///
/// ```
/// use cofile::FileRef;
///
/// let file = FileRef::join("logs", "current.log");
/// assert_eq!(file.name(), Some("current.log"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef(PathBuf);

impl FileRef {
    /// Create a reference from a pathname.
    pub fn new(pathname: impl Into<PathBuf>) -> Self {
        Self(pathname.into())
    }

    /// Reference the `child` entry under `parent`, joined with the
    /// platform separator.
    pub fn join(parent: impl AsRef<Path>, child: impl AsRef<Path>) -> Self {
        Self(parent.as_ref().join(child.as_ref()))
    }

    /// Absolute form of the pathname, resolved against the current
    /// working directory. Does not require the file to exist.
    pub fn resolve(&self) -> CofileResult<PathBuf> {
        std::path::absolute(&self.0).map_err(|source| {
            ErrorKind::FileError {
                path: self.0.clone(),
                source,
            }
            .into()
        })
    }

    /// Final component of the pathname, if there is one and it is
    /// valid Unicode.
    pub fn name(&self) -> Option<&str> {
        self.0.file_name().and_then(|name| name.to_str())
    }

    /// The pathname without its final component.
    pub fn parent(&self) -> Option<&Path> {
        self.0.parent()
    }

    /// Extension of the final component, without the dot.
    pub fn extension(&self) -> Option<&str> {
        self.0.extension().and_then(|ext| ext.to_str())
    }

    /// The pathname as a borrowed `Path`.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consumes the FileRef and returns the underlying PathBuf.
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl From<&str> for FileRef {
    fn from(s: &str) -> Self {
        Self(PathBuf::from(s))
    }
}

impl From<String> for FileRef {
    fn from(s: String) -> Self {
        Self(PathBuf::from(s))
    }
}

impl From<PathBuf> for FileRef {
    fn from(p: PathBuf) -> Self {
        Self(p)
    }
}

impl From<&Path> for FileRef {
    fn from(p: &Path) -> Self {
        Self(p.to_path_buf())
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for FileRef {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_ref_from_str() {
        let file = FileRef::from("logs/current.log");
        assert_eq!(file.as_path(), Path::new("logs/current.log"));
    }

    #[test]
    fn test_file_ref_from_string() {
        let file = FileRef::from(String::from("data.bin"));
        assert_eq!(file.as_path(), Path::new("data.bin"));
    }

    #[test]
    fn test_file_ref_join() {
        let file = FileRef::join("logs", "current.log");
        assert_eq!(file.as_path(), Path::new("logs").join("current.log"));
    }

    #[test]
    fn test_file_ref_name() {
        let file = FileRef::from("logs/current.log");
        assert_eq!(file.name(), Some("current.log"));
    }

    #[test]
    fn test_file_ref_name_of_bare_file() {
        let file = FileRef::from("current.log");
        assert_eq!(file.name(), Some("current.log"));
    }

    #[test]
    fn test_file_ref_parent() {
        let file = FileRef::join("logs", "current.log");
        assert_eq!(file.parent(), Some(Path::new("logs")));
    }

    #[test]
    fn test_file_ref_extension() {
        let file = FileRef::from("archive.tar");
        assert_eq!(file.extension(), Some("tar"));
        let file = FileRef::from("no_extension");
        assert_eq!(file.extension(), None);
    }

    #[test]
    fn test_file_ref_resolve_is_absolute() {
        let file = FileRef::from("relative.txt");
        let resolved = file.resolve().unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(resolved.file_name().unwrap(), "relative.txt");
    }

    #[test]
    fn test_file_ref_resolve_keeps_absolute_paths() {
        let absolute = std::env::temp_dir().join("anchor.txt");
        let file = FileRef::from(absolute.clone());
        assert_eq!(file.resolve().unwrap(), absolute);
    }

    #[test]
    fn test_file_ref_display() {
        let file = FileRef::from("data.bin");
        assert_eq!(file.to_string(), "data.bin");
    }

    #[test]
    fn test_file_ref_equality_and_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(FileRef::from("a.txt"));
        set.insert(FileRef::from("b.txt"));
        assert!(set.contains(&FileRef::from("a.txt")));
        assert!(!set.contains(&FileRef::from("c.txt")));
    }
}
