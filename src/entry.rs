//! Format-neutral description of an archive entry.

/// What an archive entry is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link. The target may be empty when the format stores it as content.
    Symlink { target: String },
}

/// Entry metadata as reported by an adapter, before anything is written.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    /// Name as stored in the archive (`/`-separated).
    pub name: String,
    /// Declared uncompressed size in bytes.
    pub size: u64,
    pub kind: EntryKind,
    /// Unix permission bits, when the format carries them.
    pub mode: Option<u32>,
}

impl EntryInfo {
    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }
}
