//! Extension-based archive format dispatch.

use std::fmt;
use std::path::Path;

/// Archive formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    SevenZ,
}

impl ArchiveFormat {
    /// Detect the format from the file extension (ASCII case-insensitive).
    ///
    /// Returns `None` for anything that is not `.zip` or `.7z`; contents are
    /// never inspected.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("zip") {
            Some(Self::Zip)
        } else if ext.eq_ignore_ascii_case("7z") {
            Some(Self::SevenZ)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::SevenZ => "7z",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// True when `path` has a supported archive extension.
pub fn is_archive(path: &Path) -> bool {
    ArchiveFormat::from_path(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_supported_extensions() {
        assert_eq!(
            ArchiveFormat::from_path(Path::new("a/b/data.zip")),
            Some(ArchiveFormat::Zip)
        );
        assert_eq!(
            ArchiveFormat::from_path(Path::new("data.7z")),
            Some(ArchiveFormat::SevenZ)
        );
        assert_eq!(
            ArchiveFormat::from_path(Path::new("DATA.ZIP")),
            Some(ArchiveFormat::Zip)
        );
    }

    #[test]
    fn test_rejects_other_files() {
        assert_eq!(ArchiveFormat::from_path(Path::new("data.tar.gz")), None);
        assert_eq!(ArchiveFormat::from_path(Path::new("zip")), None);
        assert_eq!(ArchiveFormat::from_path(Path::new(".zip")), None);
        assert!(!is_archive(Path::new("notes.txt")));
    }
}
