use std::fmt;

/// Errors that can occur while extracting archives.
///
/// Only [`Error::InvalidInput`] and [`Error::OutputNotCreatable`] abort a
/// recursive run (see [`Error::is_fatal`]). Everything else is scoped to a
/// single archive: the engine records it in the
/// [`RunReport`](crate::RunReport) and moves on.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in minor versions without breaking existing code. Always include a
/// catch-all `_ =>` arm when matching.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input path is missing, unreadable, or not a directory or supported archive.
    InvalidInput { path: String, reason: String },

    /// Output directory could not be created.
    OutputNotCreatable { path: String, source: std::io::Error },

    /// Path escapes destination directory (Zip Slip).
    PathEscape { entry: String, detail: String },

    /// Archive contains symlink and policy is Error.
    SymlinkNotAllowed { entry: String, target: String },

    /// Exceeded maximum total bytes.
    TotalSizeExceeded { limit: u64, would_be: u64 },

    /// Exceeded maximum file count.
    FileCountExceeded { limit: usize, attempted: usize },

    /// Single file exceeds size limit.
    FileTooLarge {
        entry: String,
        limit: u64,
        size: u64,
    },

    /// Actual decompressed size exceeds declared size (potential zip bomb).
    SizeMismatch {
        entry: String,
        declared: u64,
        actual: u64,
    },

    /// Path exceeds depth limit.
    PathTooDeep {
        entry: String,
        depth: usize,
        limit: usize,
    },

    /// Archive nested deeper than the configured limit.
    MaxDepthExceeded {
        archive: String,
        depth: usize,
        limit: usize,
    },

    /// File already exists and policy is Error.
    AlreadyExists { entry: String },

    /// Destination directory does not exist or is invalid.
    DestinationNotFound { path: String },

    /// Filename contains invalid characters or reserved names.
    InvalidFilename { entry: String, reason: String },

    /// Archive entry is encrypted (not supported).
    EncryptedEntry { entry: String },

    /// Archive is malformed or unreadable.
    CorruptArchive { archive: String, detail: String },

    /// Archive uses a feature this build cannot decode (compression method, etc.).
    UnsupportedFeature { archive: String, detail: String },

    /// Zip format error.
    Zip(zip::result::ZipError),

    /// IO error.
    Io(std::io::Error),

    /// Path jail error.
    Jail(path_jail::JailError),
}

/// Coarse classification of a per-archive failure, as recorded in a
/// [`RunReport`](crate::RunReport) and in the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Unreadable or malformed archive.
    CorruptArchive,
    /// Encrypted entries or compression methods that cannot be decoded.
    UnsupportedFeature,
    /// Disk or permission problem.
    Io,
    /// Size or count quota hit (possible archive bomb).
    LimitExceeded,
    /// Nesting deeper than `Limits::max_nesting_depth`.
    MaxDepthExceeded,
    /// Destination could not be placed safely inside the output root.
    UnsafePath,
    /// Input path problem. Only ever fatal.
    InvalidInput,
}

impl FailureKind {
    /// Short stable tag used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CorruptArchive => "CorruptArchiveError",
            Self::UnsupportedFeature => "UnsupportedFeatureError",
            Self::Io => "IOError",
            Self::LimitExceeded => "LimitExceededError",
            Self::MaxDepthExceeded => "MaxDepthExceededError",
            Self::UnsafePath => "UnsafePathError",
            Self::InvalidInput => "InvalidInputError",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error for reporting.
    pub fn kind(&self) -> FailureKind {
        use zip::result::ZipError;

        match self {
            Self::InvalidInput { .. } => FailureKind::InvalidInput,
            Self::OutputNotCreatable { .. }
            | Self::AlreadyExists { .. }
            | Self::DestinationNotFound { .. } => FailureKind::Io,
            Self::PathEscape { .. }
            | Self::SymlinkNotAllowed { .. }
            | Self::InvalidFilename { .. }
            | Self::Jail(_) => FailureKind::UnsafePath,
            Self::TotalSizeExceeded { .. }
            | Self::FileCountExceeded { .. }
            | Self::FileTooLarge { .. }
            | Self::SizeMismatch { .. }
            | Self::PathTooDeep { .. } => FailureKind::LimitExceeded,
            Self::MaxDepthExceeded { .. } => FailureKind::MaxDepthExceeded,
            Self::EncryptedEntry { .. } | Self::UnsupportedFeature { .. } => {
                FailureKind::UnsupportedFeature
            }
            Self::CorruptArchive { .. } => FailureKind::CorruptArchive,
            Self::Zip(ZipError::Io(e)) | Self::Io(e) => io_kind(e),
            Self::Zip(ZipError::UnsupportedArchive(_)) => FailureKind::UnsupportedFeature,
            Self::Zip(_) => FailureKind::CorruptArchive,
        }
    }

    /// Whether this error aborts a whole run rather than a single archive.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::OutputNotCreatable { .. }
        )
    }
}

/// Truncated or garbled data surfaces as I/O errors from the decoders.
fn io_kind(e: &std::io::Error) -> FailureKind {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData => {
            FailureKind::CorruptArchive
        }
        _ => FailureKind::Io,
    }
}

/// Format bytes in human-readable form (e.g., "1.5 GB").
pub(crate) fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { path, reason } => {
                write!(f, "invalid input '{}': {}", path, reason)
            }
            Self::OutputNotCreatable { path, source } => {
                write!(f, "cannot create output directory '{}': {}", path, source)
            }
            Self::PathEscape { entry, detail } => {
                write!(f, "path '{}' escapes destination: {}", entry, detail)
            }
            Self::SymlinkNotAllowed { entry, target } => {
                if target.is_empty() {
                    write!(
                        f,
                        "archive contains symlink '{}' (symlinks not allowed)",
                        entry
                    )
                } else {
                    write!(
                        f,
                        "archive contains symlink '{}' -> '{}' (symlinks not allowed)",
                        entry, target
                    )
                }
            }
            Self::TotalSizeExceeded { limit, would_be } => {
                write!(
                    f,
                    "extraction would write {}, exceeding the {} limit",
                    format_bytes(*would_be),
                    format_bytes(*limit)
                )
            }
            Self::FileCountExceeded { limit, attempted } => {
                write!(
                    f,
                    "extraction stopped at entry {}: would exceed {} file limit",
                    attempted, limit
                )
            }
            Self::FileTooLarge { entry, limit, size } => {
                write!(
                    f,
                    "file '{}' is {} (limit: {})",
                    entry,
                    format_bytes(*size),
                    format_bytes(*limit)
                )
            }
            Self::SizeMismatch {
                entry,
                declared,
                actual,
            } => {
                write!(
                    f,
                    "file '{}' decompressed to {} but declared {} (possible zip bomb)",
                    entry,
                    format_bytes(*actual),
                    format_bytes(*declared)
                )
            }
            Self::PathTooDeep {
                entry,
                depth,
                limit,
            } => {
                write!(
                    f,
                    "path '{}' has {} directory levels (limit: {})",
                    entry, depth, limit
                )
            }
            Self::MaxDepthExceeded {
                archive,
                depth,
                limit,
            } => {
                write!(
                    f,
                    "archive '{}' is nested {} levels deep (limit: {})",
                    archive, depth, limit
                )
            }
            Self::AlreadyExists { entry } => {
                write!(f, "file '{}' already exists", entry)
            }
            Self::DestinationNotFound { path } => {
                write!(f, "destination directory '{}' does not exist", path)
            }
            Self::InvalidFilename { entry, reason } => {
                write!(f, "invalid filename '{}': {}", entry, reason)
            }
            Self::EncryptedEntry { entry } => {
                write!(
                    f,
                    "entry '{}' is encrypted (encrypted archives not supported)",
                    entry
                )
            }
            Self::CorruptArchive { archive, detail } => {
                write!(f, "archive '{}' is corrupt: {}", archive, detail)
            }
            Self::UnsupportedFeature { archive, detail } => {
                write!(f, "archive '{}' uses an unsupported feature: {}", archive, detail)
            }
            Self::Zip(e) => write!(f, "zip format error: {}", e),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Jail(e) => write!(f, "path validation error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::OutputNotCreatable { source, .. } => Some(source),
            Self::Zip(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Jail(e) => Some(e),
            _ => None,
        }
    }
}

// Automatic conversions for ease of use
impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Zip(e)
    }
}
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
impl From<path_jail::JailError> for Error {
    fn from(e: path_jail::JailError) -> Self {
        Self::Jail(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let err = Error::InvalidInput {
            path: "/nope".into(),
            reason: "does not exist".into(),
        };
        assert!(err.is_fatal());
        assert_eq!(err.kind(), FailureKind::InvalidInput);

        let err = Error::CorruptArchive {
            archive: "a.zip".into(),
            detail: "bad header".into(),
        };
        assert!(!err.is_fatal());
        assert_eq!(err.kind(), FailureKind::CorruptArchive);
    }

    #[test]
    fn test_truncated_io_counts_as_corrupt() {
        let err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "short read",
        ));
        assert_eq!(err.kind(), FailureKind::CorruptArchive);

        let err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(err.kind(), FailureKind::Io);
    }

    #[test]
    fn test_encrypted_is_unsupported_feature() {
        let err = Error::EncryptedEntry {
            entry: "secret.txt".into(),
        };
        assert_eq!(err.kind(), FailureKind::UnsupportedFeature);
        assert_eq!(err.kind().to_string(), "UnsupportedFeatureError");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
