//! Entry policies applied before anything is written.
//!
//! Each policy returns a [`Verdict`]. Unsafe names are *skipped* so the
//! rest of the archive still extracts; quota violations are *errors* and
//! abort the archive they occur in.

use std::path::{Component, Path, PathBuf};

use path_jail::Jail;

use crate::entry::{EntryInfo, EntryKind};
use crate::error::Error;

/// Running totals for the archive currently being extracted.
#[derive(Debug, Clone, Default)]
pub struct ExtractionState {
    pub files_extracted: usize,
    pub dirs_created: usize,
    pub bytes_written: u64,
    /// Entries skipped (traversal, invalid names, symlinks).
    pub entries_skipped: usize,
}

/// Outcome of checking one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Extract,
    /// Leave this entry out and record why.
    Skip(String),
}

pub trait Policy: Send + Sync {
    fn check(&self, entry: &EntryInfo, state: &ExtractionState) -> Result<Verdict, Error>;
}

/// Policies evaluated in order; the first skip or error wins.
#[derive(Default)]
pub struct PolicyChain {
    policies: Vec<Box<dyn Policy>>,
}

impl PolicyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<P: Policy + 'static>(mut self, policy: P) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    pub fn check_all(&self, entry: &EntryInfo, state: &ExtractionState) -> Result<Verdict, Error> {
        for policy in &self.policies {
            if let Verdict::Skip(reason) = policy.check(entry, state)? {
                return Ok(Verdict::Skip(reason));
            }
        }
        Ok(Verdict::Extract)
    }
}

// ============================================================================
// Path Policy
// ============================================================================

/// Device names Windows refuses to create, with or without an extension.
#[cfg(windows)]
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Keeps every entry inside the destination (Zip Slip) and rejects names
/// that are unsafe on common filesystems.
pub struct PathPolicy {
    jail: Jail,
}

impl PathPolicy {
    pub fn new(destination: &Path) -> Result<Self, Error> {
        let jail = Jail::new(destination).map_err(|e| Error::PathEscape {
            entry: destination.display().to_string(),
            detail: e.to_string(),
        })?;
        Ok(Self { jail })
    }

    /// Returns the reason a name is unusable, if any.
    pub fn validate_filename(name: &str) -> Option<&'static str> {
        if name.is_empty() {
            return Some("empty filename");
        }
        if name.chars().any(char::is_control) {
            return Some("contains control characters");
        }
        // A backslash would act as a separator on Windows and dodge the checks below.
        if name.contains('\\') {
            return Some("contains backslash");
        }
        if name.len() > 1024 {
            return Some("path too long (>1024 bytes)");
        }
        if name.split('/').any(|component| component.len() > 255) {
            return Some("path component too long (>255 bytes)");
        }

        #[cfg(windows)]
        if is_reserved(name) {
            return Some("Windows reserved name");
        }

        None
    }
}

/// `aux.c` or `CON` can't be created on Windows; elsewhere they are ordinary names.
#[cfg(windows)]
fn is_reserved(name: &str) -> bool {
    Path::new(name).components().any(|c| match c {
        Component::Normal(s) => s.to_str().is_some_and(|s| {
            let stem = s.split('.').next().unwrap_or(s);
            RESERVED_NAMES
                .iter()
                .any(|r| r.eq_ignore_ascii_case(stem))
        }),
        _ => false,
    })
}

impl Policy for PathPolicy {
    fn check(&self, entry: &EntryInfo, _state: &ExtractionState) -> Result<Verdict, Error> {
        if let Some(reason) = Self::validate_filename(&entry.name) {
            let err = Error::InvalidFilename {
                entry: entry.name.clone(),
                reason: reason.to_string(),
            };
            return Ok(Verdict::Skip(err.to_string()));
        }

        if let Err(e) = self.jail.join(&entry.name) {
            let err = Error::PathEscape {
                entry: entry.name.clone(),
                detail: e.to_string(),
            };
            return Ok(Verdict::Skip(err.to_string()));
        }

        Ok(Verdict::Extract)
    }
}

// ============================================================================
// Quota Policies
// ============================================================================

/// Per-file and per-archive byte budgets.
pub struct SizePolicy {
    pub max_single_file: u64,
    pub max_total: u64,
}

impl SizePolicy {
    pub fn new(max_single_file: u64, max_total: u64) -> Self {
        Self {
            max_single_file,
            max_total,
        }
    }
}

impl Policy for SizePolicy {
    fn check(&self, entry: &EntryInfo, state: &ExtractionState) -> Result<Verdict, Error> {
        if !entry.is_file() {
            return Ok(Verdict::Extract);
        }

        if entry.size > self.max_single_file {
            return Err(Error::FileTooLarge {
                entry: entry.name.clone(),
                limit: self.max_single_file,
                size: entry.size,
            });
        }

        let would_be = state.bytes_written.saturating_add(entry.size);
        if would_be > self.max_total {
            return Err(Error::TotalSizeExceeded {
                limit: self.max_total,
                would_be,
            });
        }

        Ok(Verdict::Extract)
    }
}

pub struct CountPolicy {
    pub max_files: usize,
}

impl CountPolicy {
    pub fn new(max_files: usize) -> Self {
        Self { max_files }
    }
}

impl Policy for CountPolicy {
    fn check(&self, entry: &EntryInfo, state: &ExtractionState) -> Result<Verdict, Error> {
        if entry.is_file() && state.files_extracted >= self.max_files {
            return Err(Error::FileCountExceeded {
                limit: self.max_files,
                attempted: state.files_extracted + 1,
            });
        }
        Ok(Verdict::Extract)
    }
}

/// Limits directory levels inside one entry name.
pub struct DepthPolicy {
    pub max_depth: usize,
}

impl DepthPolicy {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

impl Policy for DepthPolicy {
    fn check(&self, entry: &EntryInfo, _state: &ExtractionState) -> Result<Verdict, Error> {
        let depth = Path::new(&entry.name)
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count();
        if depth > self.max_depth {
            return Err(Error::PathTooDeep {
                entry: entry.name.clone(),
                depth,
                limit: self.max_depth,
            });
        }
        Ok(Verdict::Extract)
    }
}

// ============================================================================
// Symlink Policy
// ============================================================================

/// What to do when encountering a symlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymlinkBehavior {
    /// Skip symlinks and record them as skipped entries.
    #[default]
    Skip,
    /// Fail the archive if it contains a symlink.
    Error,
}

pub struct SymlinkPolicy {
    pub behavior: SymlinkBehavior,
}

impl SymlinkPolicy {
    pub fn new(behavior: SymlinkBehavior) -> Self {
        Self { behavior }
    }
}

impl Policy for SymlinkPolicy {
    fn check(&self, entry: &EntryInfo, _state: &ExtractionState) -> Result<Verdict, Error> {
        let EntryKind::Symlink { target } = &entry.kind else {
            return Ok(Verdict::Extract);
        };
        match self.behavior {
            SymlinkBehavior::Skip => Ok(Verdict::Skip("symbolic link not extracted".into())),
            SymlinkBehavior::Error => Err(Error::SymlinkNotAllowed {
                entry: entry.name.clone(),
                target: target.clone(),
            }),
        }
    }
}

// ============================================================================
// Default Policy Chain Builder
// ============================================================================

/// Everything needed to build the standard chain for one destination.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub destination: PathBuf,
    pub max_single_file: u64,
    pub max_total: u64,
    pub max_files: usize,
    pub max_depth: usize,
    pub symlink_behavior: SymlinkBehavior,
}

impl PolicyConfig {
    pub fn build(&self) -> Result<PolicyChain, Error> {
        Ok(PolicyChain::new()
            .with(PathPolicy::new(&self.destination)?)
            .with(SymlinkPolicy::new(self.symlink_behavior))
            .with(SizePolicy::new(self.max_single_file, self.max_total))
            .with(CountPolicy::new(self.max_files))
            .with(DepthPolicy::new(self.max_depth)))
    }
}
