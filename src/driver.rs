//! Single-archive extraction.
//!
//! The driver extracts one archive into one destination, using an adapter
//! for the format and a [`PolicyChain`] to vet every entry first. It knows
//! nothing about nesting; the [`Engine`](crate::Engine) calls it once per
//! work item.

use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::adapter::{SevenZAdapter, ZipAdapter};
use crate::entry::{EntryInfo, EntryKind};
use crate::error::Error;
use crate::format::ArchiveFormat;
use crate::limits::Limits;
use crate::policy::{ExtractionState, PolicyChain, PolicyConfig, SymlinkBehavior, Verdict};

/// What to do when a file already exists at the extraction path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverwriteMode {
    /// Fail extraction if file exists.
    #[default]
    Error,
    /// Skip files that already exist.
    Skip,
    /// Overwrite existing files. Symlinks are removed before overwriting.
    Overwrite,
}

/// An entry that was left out of an otherwise successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Entry name as stored in the archive.
    pub entry: String,
    pub reason: String,
}

/// What one archive extraction produced.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub files_extracted: usize,
    pub dirs_created: usize,
    pub bytes_written: u64,
    pub entries_skipped: usize,
    /// Every regular file written, in archive order.
    pub produced: Vec<PathBuf>,
    /// Entries skipped for safety reasons (traversal, bad names, symlinks).
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Default)]
struct Progress {
    state: ExtractionState,
    produced: Vec<PathBuf>,
    skipped: Vec<SkippedEntry>,
}

impl Progress {
    fn skip(&mut self, entry: &str, reason: impl Into<String>) {
        self.state.entries_skipped += 1;
        self.skipped.push(SkippedEntry {
            entry: entry.to_string(),
            reason: reason.into(),
        });
    }

    fn into_report(self) -> ExtractionReport {
        ExtractionReport {
            files_extracted: self.state.files_extracted,
            dirs_created: self.state.dirs_created,
            bytes_written: self.state.bytes_written,
            entries_skipped: self.state.entries_skipped,
            produced: self.produced,
            skipped: self.skipped,
        }
    }
}

/// Extracts a single archive into a destination directory.
///
/// # Example
///
/// ```no_run
/// use ripple_unzip::{ArchiveFormat, Driver};
/// use std::path::Path;
///
/// let report = Driver::new_or_create("/tmp/out")?
///     .extract(Path::new("bundle.zip"), ArchiveFormat::Zip)?;
/// println!("{} files", report.files_extracted);
/// # Ok::<(), ripple_unzip::Error>(())
/// ```
pub struct Driver {
    destination: PathBuf,
    limits: Limits,
    overwrite: OverwriteMode,
}

impl Driver {
    /// Create a driver for an existing destination.
    ///
    /// Returns [`Error::DestinationNotFound`] if the directory is missing.
    pub fn new<P: AsRef<Path>>(destination: P) -> Result<Self, Error> {
        Self::new_impl(destination.as_ref(), false)
    }

    /// Create a driver, creating the destination if it doesn't exist.
    pub fn new_or_create<P: AsRef<Path>>(destination: P) -> Result<Self, Error> {
        Self::new_impl(destination.as_ref(), true)
    }

    fn new_impl(destination: &Path, create: bool) -> Result<Self, Error> {
        if !destination.exists() {
            if create {
                fs::create_dir_all(destination)?;
            } else {
                return Err(Error::DestinationNotFound {
                    path: destination.to_string_lossy().to_string(),
                });
            }
        }

        Ok(Self {
            destination: destination.to_path_buf(),
            limits: Limits::default(),
            overwrite: OverwriteMode::default(),
        })
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn overwrite(mut self, mode: OverwriteMode) -> Self {
        self.overwrite = mode;
        self
    }

    fn build_policies(&self) -> Result<PolicyChain, Error> {
        PolicyConfig {
            destination: self.destination.clone(),
            max_single_file: self.limits.max_single_file,
            max_total: self.limits.max_total_bytes,
            max_files: self.limits.max_file_count,
            max_depth: self.limits.max_path_depth,
            symlink_behavior: SymlinkBehavior::Skip,
        }
        .build()
    }

    /// Extract the archive at `archive`, dispatching on `format`.
    ///
    /// Format errors are relabelled with the archive path so they read well
    /// in a run report.
    pub fn extract(&self, archive: &Path, format: ArchiveFormat) -> Result<ExtractionReport, Error> {
        let result = match format {
            ArchiveFormat::Zip => ZipAdapter::open(archive).and_then(|a| self.extract_zip(a)),
            ArchiveFormat::SevenZ => SevenZAdapter::open(archive).and_then(|a| self.extract_7z(a)),
        };
        result.map_err(|e| label(archive, e))
    }

    /// Extract a ZIP archive.
    pub fn extract_zip<R: Read + Seek>(
        &self,
        mut adapter: ZipAdapter<R>,
    ) -> Result<ExtractionReport, Error> {
        let policies = self.build_policies()?;
        let mut progress = Progress::default();

        // Read every header up front so an encrypted entry rejects the
        // archive before any file is written.
        let entries = adapter.entries_metadata()?;

        for (index, info) in entries.iter().enumerate() {
            self.place(info, &policies, &mut progress, |out, limit| {
                adapter.extract_to(index, out, limit)
            })?;
        }

        Ok(progress.into_report())
    }

    /// Extract a 7z archive.
    pub fn extract_7z(&self, adapter: SevenZAdapter) -> Result<ExtractionReport, Error> {
        let policies = self.build_policies()?;
        let mut progress = Progress::default();

        adapter.for_each(|info, data| {
            self.place(info, &policies, &mut progress, |out, _limit| {
                use std::io::Write;
                let data = data.unwrap_or_default();
                out.write_all(data)?;
                Ok(data.len() as u64)
            })?;
            Ok(true)
        })?;

        Ok(progress.into_report())
    }

    /// Vet one entry and write it. `write` receives the open file and the
    /// byte budget left for it.
    fn place<F>(
        &self,
        info: &EntryInfo,
        policies: &PolicyChain,
        progress: &mut Progress,
        write: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(&mut fs::File, u64) -> Result<u64, Error>,
    {
        // 7z writers store the archive root as an unnamed directory.
        if matches!(info.kind, EntryKind::Directory) && info.name.trim_matches('/').is_empty() {
            return Ok(());
        }

        if let Verdict::Skip(reason) = policies.check_all(info, &progress.state)? {
            warn!(entry = %info.name, %reason, "skipping archive entry");
            progress.skip(&info.name, reason);
            return Ok(());
        }

        let safe_path = self.destination.join(&info.name);

        match info.kind {
            EntryKind::Directory => {
                fs::create_dir_all(&safe_path)?;
                progress.state.dirs_created += 1;
            }
            EntryKind::File => {
                if let Some(parent) = safe_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let Some(mut outfile) = self.open_for_write(&safe_path)? else {
                    progress.skip(&info.name, "file already exists");
                    return Ok(());
                };

                let limit = self.limits.max_single_file.min(
                    self.limits
                        .max_total_bytes
                        .saturating_sub(progress.state.bytes_written),
                );
                let written = write(&mut outfile, limit)?;

                #[cfg(unix)]
                if let Some(mode) = info.mode {
                    use std::os::unix::fs::PermissionsExt;
                    // Keep rwx bits only; never setuid/setgid/sticky.
                    let safe_mode = mode & 0o0777;
                    fs::set_permissions(&safe_path, fs::Permissions::from_mode(safe_mode))?;
                }

                debug!(path = %safe_path.display(), bytes = written, "extracted file");
                progress.state.bytes_written += written;
                progress.state.files_extracted += 1;
                if !progress.produced.contains(&safe_path) {
                    progress.produced.push(safe_path);
                }
            }
            EntryKind::Symlink { .. } => {
                // The symlink policy either skipped or rejected it already.
            }
        }

        Ok(())
    }

    /// Open a file for writing based on the overwrite mode.
    /// Returns `None` if the file should be skipped.
    fn open_for_write(&self, path: &Path) -> Result<Option<fs::File>, Error> {
        let create_new = || fs::OpenOptions::new().write(true).create_new(true).open(path);

        match self.overwrite {
            OverwriteMode::Error => match create_new() {
                Ok(f) => Ok(Some(f)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    Err(Error::AlreadyExists {
                        entry: path.display().to_string(),
                    })
                }
                Err(e) => Err(e.into()),
            },
            OverwriteMode::Skip => match create_new() {
                Ok(f) => Ok(Some(f)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
                Err(e) => Err(e.into()),
            },
            OverwriteMode::Overwrite => {
                // Never write through a symlink planted at the target.
                if let Ok(m) = fs::symlink_metadata(path) {
                    if m.file_type().is_symlink() {
                        fs::remove_file(path)?;
                    }
                }
                Ok(Some(fs::File::create(path)?))
            }
        }
    }
}

/// Attach the archive path to format-level errors.
fn label(archive: &Path, err: Error) -> Error {
    use zip::result::ZipError;

    let name = archive.display().to_string();
    match err {
        Error::Zip(e @ ZipError::UnsupportedArchive(_)) => Error::UnsupportedFeature {
            archive: name,
            detail: e.to_string(),
        },
        Error::Zip(ZipError::Io(e)) => Error::Io(e),
        Error::Zip(e) => Error::CorruptArchive {
            archive: name,
            detail: e.to_string(),
        },
        Error::EncryptedEntry { entry } if entry != name => Error::EncryptedEntry {
            entry: format!("{} in {}", entry, name),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::FileOptions;
    use zip::unstable::write::FileOptionsExt;

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buffer);
            let options: FileOptions<()> = FileOptions::default();
            for (name, content) in files {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content).unwrap();
            }
            zip.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_extract_zip_reports_produced_files() {
        let dest = tempdir().unwrap();
        let data = zip_bytes(&[("a.txt", b"A"), ("sub/b.txt", b"BB")]);
        let adapter = ZipAdapter::new(std::io::Cursor::new(data)).unwrap();

        let report = Driver::new(dest.path())
            .unwrap()
            .extract_zip(adapter)
            .unwrap();

        assert_eq!(report.files_extracted, 2);
        assert_eq!(report.bytes_written, 3);
        assert_eq!(
            report.produced,
            vec![dest.path().join("a.txt"), dest.path().join("sub/b.txt")]
        );
        assert_eq!(fs::read(dest.path().join("sub/b.txt")).unwrap(), b"BB");
    }

    #[test]
    fn test_traversal_entry_is_skipped_not_fatal() {
        let dest = tempdir().unwrap();
        let inner = dest.path().join("inner");
        fs::create_dir(&inner).unwrap();
        let data = zip_bytes(&[("safe.txt", b"ok"), ("../evil.txt", b"no")]);
        let adapter = ZipAdapter::new(std::io::Cursor::new(data)).unwrap();

        let report = Driver::new(&inner).unwrap().extract_zip(adapter).unwrap();

        assert_eq!(report.files_extracted, 1);
        assert_eq!(report.entries_skipped, 1);
        assert_eq!(report.skipped[0].entry, "../evil.txt");
        assert!(!dest.path().join("evil.txt").exists());
    }

    #[test]
    fn test_overwrite_error_mode() {
        let dest = tempdir().unwrap();
        fs::write(dest.path().join("a.txt"), b"old").unwrap();
        let data = zip_bytes(&[("a.txt", b"new")]);
        let adapter = ZipAdapter::new(std::io::Cursor::new(data)).unwrap();

        let result = Driver::new(dest.path()).unwrap().extract_zip(adapter);
        assert!(matches!(result, Err(Error::AlreadyExists { .. })));
    }

    #[test]
    fn test_missing_destination() {
        let dest = tempdir().unwrap();
        let result = Driver::new(dest.path().join("missing"));
        assert!(matches!(result, Err(Error::DestinationNotFound { .. })));
    }

    #[test]
    fn test_encrypted_entry_rejects_archive_before_writing() {
        let dest = tempdir().unwrap();
        let mut buffer = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buffer);
            let plain: FileOptions<()> = FileOptions::default();
            zip.start_file("first.txt", plain).unwrap();
            zip.write_all(b"plain").unwrap();
            zip.start_file("second.txt", plain.with_deprecated_encryption(b"secret"))
                .unwrap();
            zip.write_all(b"hidden").unwrap();
            zip.finish().unwrap();
        }
        let adapter = ZipAdapter::new(std::io::Cursor::new(buffer.into_inner())).unwrap();

        let result = Driver::new(dest.path()).unwrap().extract_zip(adapter);

        assert!(matches!(result, Err(Error::EncryptedEntry { .. })));
        assert!(!dest.path().join("first.txt").exists());
    }

    #[test]
    fn test_garbage_is_labelled_corrupt() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("bad.zip");
        fs::write(&archive, b"this is not a zip archive at all").unwrap();

        let err = Driver::new(dir.path())
            .unwrap()
            .extract(&archive, ArchiveFormat::Zip)
            .unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::CorruptArchive);
    }
}
