//! Recursively extract nested `.zip` and `.7z` archives.
//!
//! Point [`ripple_unzip`] (or a configured [`Engine`]) at a directory or an
//! archive and it writes a fully decompressed copy to the output directory:
//! plain files are mirrored, every archive is unpacked into a directory
//! named after it, and archives found inside archives are unpacked in turn
//! until none are left.
//!
//! ```no_run
//! let report = ripple_unzip::ripple_unzip("incoming", "unpacked", None)?;
//! for failure in &report.failures {
//!     eprintln!("{}: {}", failure.path.display(), failure.message);
//! }
//! # Ok::<(), ripple_unzip::Error>(())
//! ```

pub mod adapter;
mod driver;
pub mod entry;
mod engine;
mod error;
mod format;
mod limits;
mod logger;
mod planner;
pub mod policy;
mod report;

#[cfg(feature = "async")]
#[path = "async_extractor.rs"]
pub mod r#async;

use std::path::Path;

pub use adapter::{SevenZAdapter, ZipAdapter};
pub use driver::{Driver, ExtractionReport, OverwriteMode, SkippedEntry};
pub use engine::{CancelToken, Engine, MirrorMode};
pub use entry::{EntryInfo, EntryKind};
pub use error::{Error, FailureKind};
pub use format::{is_archive, ArchiveFormat};
pub use limits::Limits;
pub use logger::{Event, Level, Observer, RunLogger};
pub use planner::PathPlanner;
pub use policy::SymlinkBehavior;
pub use report::{ArchiveFailure, EntryWarning, RunReport};

/// Extract `input` into `output` with default settings, optionally
/// appending run events to `log_path`.
pub fn ripple_unzip<I: AsRef<Path>, O: AsRef<Path>>(
    input: I,
    output: O,
    log_path: Option<&Path>,
) -> Result<RunReport, Error> {
    let mut engine = Engine::new();
    if let Some(path) = log_path {
        engine = engine.log_file(path);
    }
    engine.run(input, output)
}
