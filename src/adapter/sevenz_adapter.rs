//! 7z archive adapter.
//!
//! Provides read-only extraction of 7z archives with the same path and
//! size checks as ZIP.

use std::fs;
use std::path::Path;

use crate::entry::{EntryInfo, EntryKind};
use crate::error::Error;

/// Adapter for 7z archives.
///
/// Uses the `sevenz-rust` crate for decompression. Note that 7z archives
/// are fully decompressed into memory before extraction, so very large
/// archives may use significant RAM.
pub struct SevenZAdapter {
    /// Cached entries (7z requires full decompression)
    entries: Vec<SevenZEntry>,
}

struct SevenZEntry {
    info: EntryInfo,
    data: Vec<u8>,
}

impl SevenZAdapter {
    /// Open a 7z file from a path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        // Surface missing files and permission problems as plain I/O errors.
        fs::metadata(path)?;
        let entries = Self::decompress_all(path)?;
        Ok(Self { entries })
    }

    fn decompress_all(path: &Path) -> Result<Vec<SevenZEntry>, Error> {
        let mut entries = Vec::new();

        let mut archive = sevenz_rust::SevenZReader::open(path, sevenz_rust::Password::empty())
            .map_err(|e| classify(path, e))?;

        archive
            .for_each_entries(|entry, reader| {
                let name = entry.name().to_string();

                let kind = if entry.is_directory() {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };

                let mut data = Vec::new();
                if matches!(kind, EntryKind::File) {
                    reader.read_to_end(&mut data)?;
                }

                let info = EntryInfo {
                    name,
                    size: data.len() as u64,
                    kind,
                    mode: None, // 7z doesn't preserve Unix permissions
                };

                entries.push(SevenZEntry { info, data });
                Ok(true)
            })
            .map_err(|e| classify(path, e))?;

        Ok(entries)
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the archive is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Process each entry with a callback. Returning `Ok(false)` stops early.
    pub fn for_each<F>(&self, mut callback: F) -> Result<(), Error>
    where
        F: FnMut(&EntryInfo, Option<&[u8]>) -> Result<bool, Error>,
    {
        for entry in &self.entries {
            let data = if matches!(entry.info.kind, EntryKind::File) {
                Some(entry.data.as_slice())
            } else {
                None
            };

            if !callback(&entry.info, data)? {
                break;
            }
        }
        Ok(())
    }
}

fn classify(path: &Path, e: sevenz_rust::Error) -> Error {
    let archive = path.display().to_string();
    match e {
        sevenz_rust::Error::PasswordRequired | sevenz_rust::Error::MaybeBadPassword(_) => {
            Error::EncryptedEntry { entry: archive }
        }
        // Without AES support compiled in, encrypted archives report their cipher as a codec.
        sevenz_rust::Error::UnsupportedCompressionMethod(method) => Error::UnsupportedFeature {
            archive,
            detail: format!("unsupported compression method {}", method),
        },
        sevenz_rust::Error::Unsupported(what) => Error::UnsupportedFeature {
            archive,
            detail: what.to_string(),
        },
        sevenz_rust::Error::ExternalUnsupported => Error::UnsupportedFeature {
            archive,
            detail: "unsupported external data".into(),
        },
        other => Error::CorruptArchive {
            archive,
            detail: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;
    use tempfile::tempdir;

    #[test]
    fn test_open_reads_every_entry() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("a.txt"), b"alpha").unwrap();
        fs::write(src.join("sub/b.txt"), b"beta").unwrap();
        let archive = dir.path().join("pack.7z");
        sevenz_rust::compress_to_path(&src, &archive).unwrap();

        let adapter = SevenZAdapter::open(&archive).unwrap();
        assert!(!adapter.is_empty());

        let mut files = Vec::new();
        adapter
            .for_each(|info, data| {
                if let Some(data) = data {
                    files.push((info.name.clone(), data.to_vec()));
                }
                Ok(true)
            })
            .unwrap();
        files.sort();
        assert_eq!(
            files,
            vec![
                ("a.txt".to_string(), b"alpha".to_vec()),
                ("sub/b.txt".to_string(), b"beta".to_vec()),
            ]
        );
        assert!(adapter.len() >= files.len());
    }

    #[test]
    fn test_missing_cipher_support_is_unsupported_feature() {
        let err = classify(
            Path::new("enc.7z"),
            sevenz_rust::Error::UnsupportedCompressionMethod("AES256SHA256".into()),
        );
        assert_eq!(err.kind(), FailureKind::UnsupportedFeature);
        assert!(err.to_string().contains("AES256SHA256"));
    }

    #[test]
    fn test_password_errors_are_encrypted_entries() {
        let err = classify(Path::new("enc.7z"), sevenz_rust::Error::PasswordRequired);
        assert!(matches!(err, Error::EncryptedEntry { .. }));
        assert_eq!(err.kind(), FailureKind::UnsupportedFeature);
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("bad.7z");
        fs::write(&archive, b"definitely not 7z").unwrap();

        let err = SevenZAdapter::open(&archive).err().unwrap();
        assert_eq!(err.kind(), FailureKind::CorruptArchive);
    }
}
