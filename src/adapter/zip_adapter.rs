//! ZIP archive adapter.

use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use crate::entry::{EntryInfo, EntryKind};
use crate::error::Error;

use super::copy_limited;

/// Adapter for ZIP archives, backed by the `zip` crate.
pub struct ZipAdapter<R: Read + Seek> {
    archive: zip::ZipArchive<R>,
}

impl<R: Read + Seek> ZipAdapter<R> {
    /// Read the central directory from `reader`.
    pub fn new(reader: R) -> Result<Self, Error> {
        let archive = zip::ZipArchive::new(reader)?;
        Ok(Self { archive })
    }

    /// Number of entries in the central directory.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Read metadata for one entry without decompressing it.
    ///
    /// Encrypted entries are rejected with [`Error::EncryptedEntry`].
    pub fn entry_info(&mut self, index: usize) -> Result<EntryInfo, Error> {
        let entry = self.archive.by_index_raw(index)?;
        let name = entry.name().to_string();

        if entry.encrypted() {
            return Err(Error::EncryptedEntry { entry: name });
        }

        let kind = if entry.is_dir() {
            EntryKind::Directory
        } else if entry.is_symlink() {
            // ZIP stores the target as content; it is never followed, so leave it unread.
            EntryKind::Symlink {
                target: String::new(),
            }
        } else {
            EntryKind::File
        };

        Ok(EntryInfo {
            name,
            size: entry.size(),
            kind,
            mode: entry.unix_mode(),
        })
    }

    /// Metadata for every entry, in central directory order. Fails on the
    /// first encrypted entry.
    pub fn entries_metadata(&mut self) -> Result<Vec<EntryInfo>, Error> {
        (0..self.archive.len()).map(|i| self.entry_info(i)).collect()
    }

    /// Decompress entry `index` into `writer`, writing at most `limit` bytes.
    ///
    /// Fails with [`Error::SizeMismatch`] when the entry yields more data
    /// than `limit` allows.
    pub fn extract_to<W: Write>(
        &mut self,
        index: usize,
        writer: &mut W,
        limit: u64,
    ) -> Result<u64, Error> {
        let mut entry = self.archive.by_index(index)?;
        let declared = entry.size();

        let written = copy_limited(&mut entry, writer, limit.min(declared))?;

        // A lying header keeps producing data past the declared size.
        let mut extra = [0u8; 1];
        if entry.read(&mut extra)? > 0 {
            return Err(Error::SizeMismatch {
                entry: entry.name().to_string(),
                declared,
                actual: written + 1,
            });
        }

        Ok(written)
    }
}

impl ZipAdapter<BufReader<File>> {
    /// Open a ZIP file from a path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}
