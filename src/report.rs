use std::path::PathBuf;
use std::time::Duration;

use crate::error::FailureKind;

/// An archive that could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFailure {
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

/// An entry left out of an archive that otherwise extracted fine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryWarning {
    pub archive: PathBuf,
    pub entry: String,
    pub reason: String,
}

/// Summary of one recursive run.
///
/// Always produced for a run that got past input validation, however many
/// archives failed along the way.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Archives found, top-level and nested.
    pub archives_discovered: usize,
    /// Archives extracted successfully.
    pub archives_extracted: usize,
    /// Files written out of archives.
    pub files_extracted: usize,
    /// Non-archive input files mirrored into the output.
    pub files_copied: usize,
    /// Input files skipped by exclude patterns.
    pub files_excluded: usize,
    pub bytes_written: u64,
    /// Per-archive failures, including depth-limited branches.
    pub failures: Vec<ArchiveFailure>,
    pub warnings: Vec<EntryWarning>,
    /// True if the run was stopped through a [`CancelToken`](crate::CancelToken).
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn success_count(&self) -> usize {
        self.archives_extracted
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Failures of one kind.
    pub fn failures_of(&self, kind: FailureKind) -> impl Iterator<Item = &ArchiveFailure> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }
}
