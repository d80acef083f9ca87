use std::fs;

/// Access mode a file handle is opened with.
///
/// Reading is always permitted; the mode controls whether the handle
/// may mutate the file and whether a missing file is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Read access only. The file must already exist.
    ReadOnly,
    /// Read and write access. A missing file is created empty;
    /// existing content is never truncated by the open itself.
    WriteCreate,
}

impl Mode {
    /// Whether handles opened with this mode may mutate the file.
    pub fn writable(self) -> bool {
        matches!(self, Mode::WriteCreate)
    }

    /// The `std::fs::OpenOptions` this mode maps to.
    pub fn to_open_options(self) -> fs::OpenOptions {
        let mut options = fs::OpenOptions::new();
        match self {
            Mode::ReadOnly => {
                options.read(true);
            }
            Mode::WriteCreate => {
                options.read(true).write(true).create(true).truncate(false);
            }
        }
        options
    }
}
