//! Recursive extraction engine.
//!
//! The engine walks the input, mirrors plain files, queues every archive it
//! finds and keeps extracting until the queue is empty. Each extracted
//! archive is scanned for further archives, which are queued one level
//! deeper. A failing archive is recorded and skipped; only problems with the
//! input or output roots end a run early.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::driver::{Driver, OverwriteMode};
use crate::error::{Error, FailureKind};
use crate::format::ArchiveFormat;
use crate::limits::Limits;
use crate::logger::{Event, Observer, RunLogger};
use crate::planner::PathPlanner;
use crate::report::{ArchiveFailure, EntryWarning, RunReport};

/// What happens to non-archive files of a directory input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MirrorMode {
    /// Copy them, so the output is a complete decompressed rendering of the input.
    #[default]
    Full,
    /// Leave them out; the output only holds extracted archive contents.
    ArchivesOnly,
}

/// Cooperative stop flag, checked between archives.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where a work item extracts to.
enum Target {
    /// Straight into this directory (an archive given as the input itself).
    Into(PathBuf),
    /// A fresh directory under `base`, named after the archive.
    Planned { base: PathBuf, name: String },
}

/// Where the archive file itself lives.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Part of the input tree; never modified.
    Input,
    /// Written by an earlier extraction; removed once extracted.
    Extracted,
}

struct WorkItem {
    source: PathBuf,
    format: ArchiveFormat,
    depth: usize,
    target: Target,
    origin: Origin,
}

/// Recursive extractor configuration.
///
/// # Example
///
/// ```no_run
/// use ripple_unzip::{Engine, MirrorMode};
///
/// let report = Engine::new()
///     .max_nesting_depth(10)
///     .mirror(MirrorMode::ArchivesOnly)
///     .log_file("unzip.log")
///     .run("downloads", "unpacked")?;
/// println!("{} archives, {} failed", report.success_count(), report.failure_count());
/// # Ok::<(), ripple_unzip::Error>(())
/// ```
#[derive(Clone)]
pub struct Engine {
    limits: Limits,
    mirror: MirrorMode,
    overwrite: OverwriteMode,
    exclude: Vec<String>,
    log_path: Option<PathBuf>,
    cancel: Option<CancelToken>,
    observer: Option<Observer>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
            mirror: MirrorMode::default(),
            overwrite: OverwriteMode::Overwrite,
            exclude: Vec::new(),
            log_path: None,
            cancel: None,
            observer: None,
        }
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.limits.max_nesting_depth = depth;
        self
    }

    pub fn mirror(mut self, mode: MirrorMode) -> Self {
        self.mirror = mode;
        self
    }

    /// How entries treat files already present in a destination.
    ///
    /// Planned destinations are always fresh, so this only matters for
    /// duplicate entry names and for an archive input extracted straight
    /// into a non-empty output.
    pub fn overwrite(mut self, mode: OverwriteMode) -> Self {
        self.overwrite = mode;
        self
    }

    /// Skip input files whose `/`-separated relative path matches any of
    /// these glob patterns. Also applies to nested archives, relative to the
    /// output root.
    pub fn exclude<S: AsRef<str>>(mut self, patterns: &[S]) -> Self {
        self.exclude
            .extend(patterns.iter().map(|p| p.as_ref().to_string()));
        self
    }

    /// Append run events to this file.
    pub fn log_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.log_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Call `f` for every event, in the order events are recorded.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(f));
        self
    }

    /// Extract everything under `input` into `output`.
    ///
    /// # Errors
    ///
    /// Only [`Error::InvalidInput`] and [`Error::OutputNotCreatable`] (plus a
    /// jail failure on the output root) are returned. Per-archive problems
    /// end up in [`RunReport::failures`].
    pub fn run<I: AsRef<Path>, O: AsRef<Path>>(
        &self,
        input: I,
        output: O,
    ) -> Result<RunReport, Error> {
        let started = Instant::now();
        let mut logger = match &self.log_path {
            Some(path) => RunLogger::to_file(path),
            None => RunLogger::disabled(),
        };
        if let Some(observer) = &self.observer {
            logger = logger.with_observer(Arc::clone(observer));
        }

        let mut run = match Run::prepare(self, input.as_ref(), output.as_ref(), logger) {
            Ok(run) => run,
            Err((mut logger, e)) => {
                logger.record(&Event::Aborted {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        run.drain();

        run.report.elapsed = started.elapsed();
        run.logger.record(&Event::Finished {
            archives_extracted: run.report.archives_extracted,
            failures: run.report.failures.len(),
        });
        Ok(run.report)
    }

    fn is_excluded(&self, relative: &Path) -> bool {
        if self.exclude.is_empty() {
            return false;
        }
        let text = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        self.exclude
            .iter()
            .any(|pattern| glob_match::glob_match(pattern, &text))
    }
}

/// State for one invocation of [`Engine::run`].
struct Run<'a> {
    engine: &'a Engine,
    root: PathBuf,
    planner: PathPlanner,
    logger: RunLogger,
    report: RunReport,
    queue: VecDeque<WorkItem>,
    seen: HashSet<PathBuf>,
}

impl<'a> Run<'a> {
    /// Validate the roots and seed the queue. On error the logger is handed
    /// back so the failure can still be logged.
    fn prepare(
        engine: &'a Engine,
        input: &Path,
        output: &Path,
        logger: RunLogger,
    ) -> Result<Self, (RunLogger, Error)> {
        let input_meta = match fs::metadata(input) {
            Ok(meta) => meta,
            Err(e) => {
                let err = Error::InvalidInput {
                    path: input.display().to_string(),
                    reason: e.to_string(),
                };
                return Err((logger, err));
            }
        };

        let format = ArchiveFormat::from_path(input);
        if input_meta.is_file() && format.is_none() {
            let err = Error::InvalidInput {
                path: input.display().to_string(),
                reason: "not a directory or a .zip/.7z archive".into(),
            };
            return Err((logger, err));
        }

        let root = match fs::create_dir_all(output).and_then(|()| output.canonicalize()) {
            Ok(root) => root,
            Err(source) => {
                let err = Error::OutputNotCreatable {
                    path: output.display().to_string(),
                    source,
                };
                return Err((logger, err));
            }
        };

        let planner = match PathPlanner::new(&root) {
            Ok(planner) => planner,
            Err(e) => return Err((logger, e)),
        };

        let mut run = Run {
            engine,
            root,
            planner,
            logger,
            report: RunReport::default(),
            queue: VecDeque::new(),
            seen: HashSet::new(),
        };

        let input = match input.canonicalize() {
            Ok(path) => path,
            Err(e) => {
                let err = Error::InvalidInput {
                    path: input.display().to_string(),
                    reason: e.to_string(),
                };
                return Err((run.logger, err));
            }
        };

        match format {
            Some(format) if input_meta.is_file() => {
                let target = Target::Into(run.root.clone());
                run.enqueue(input, format, 1, target, Origin::Input);
            }
            _ => run.scan_input(&input),
        }

        Ok(run)
    }

    /// Mirror the input tree and queue its archives, in file-name order.
    fn scan_input(&mut self, input: &Path) {
        let root = self.root.clone();
        let engine = self.engine;
        let walker = WalkDir::new(input)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                // Never descend into the output when it lives inside the input.
                if e.path() == root.as_path() {
                    return false;
                }
                let pruned = e.depth() > 0
                    && e.file_type().is_dir()
                    && e.path()
                        .strip_prefix(input)
                        .is_ok_and(|relative| engine.is_excluded(relative));
                !pruned
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(input).to_path_buf();
                    self.fail(path, FailureKind::Io, e.to_string());
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(input) else {
                continue;
            };
            let relative = relative.to_path_buf();
            let mirrored = self.root.join(&relative);
            let file_type = entry.file_type();

            if file_type.is_file() && self.engine.is_excluded(&relative) {
                self.report.files_excluded += 1;
                self.logger.record(&Event::Excluded {
                    path: entry.path().to_path_buf(),
                });
                continue;
            }

            if file_type.is_dir() {
                if self.engine.mirror == MirrorMode::Full {
                    if let Err(e) = fs::create_dir_all(&mirrored) {
                        self.fail(mirrored, FailureKind::Io, e.to_string());
                    }
                }
            } else if file_type.is_file() {
                if let Some(format) = ArchiveFormat::from_path(entry.path()) {
                    let base = mirrored.parent().unwrap_or(&self.root).to_path_buf();
                    let target = Target::Planned {
                        base,
                        name: archive_stem(entry.path()),
                    };
                    self.enqueue(entry.path().to_path_buf(), format, 1, target, Origin::Input);
                } else if self.engine.mirror == MirrorMode::Full {
                    self.mirror_file(entry.path(), &mirrored);
                }
            } else {
                debug!(path = %entry.path().display(), "not a regular file, skipping");
            }
        }
    }

    /// Process the queue until it is empty or the run is cancelled.
    fn drain(&mut self) {
        while let Some(item) = self.queue.pop_front() {
            if self
                .engine
                .cancel
                .as_ref()
                .is_some_and(CancelToken::is_cancelled)
            {
                self.report.cancelled = true;
                self.logger.record(&Event::Cancelled {
                    pending: self.queue.len() + 1,
                });
                break;
            }

            let key = item
                .source
                .canonicalize()
                .unwrap_or_else(|_| item.source.clone());
            if !self.seen.insert(key) {
                debug!(path = %item.source.display(), "already processed, skipping");
                continue;
            }

            let limit = self.engine.limits.max_nesting_depth;
            if item.depth > limit {
                self.logger.record(&Event::MaxDepthExceeded {
                    path: item.source.clone(),
                    depth: item.depth,
                    limit,
                });
                let err = Error::MaxDepthExceeded {
                    archive: item.source.display().to_string(),
                    depth: item.depth,
                    limit,
                };
                self.report.failures.push(ArchiveFailure {
                    path: item.source.clone(),
                    kind: err.kind(),
                    message: err.to_string(),
                });
                self.keep_for_manual_extraction(&item);
                continue;
            }

            self.process(item);
        }
    }

    fn process(&mut self, item: WorkItem) {
        let destination = match self.destination_for(&item.target) {
            Ok(path) => path,
            Err(e) => {
                self.fail(item.source.clone(), e.kind(), e.to_string());
                self.keep_for_manual_extraction(&item);
                return;
            }
        };

        self.logger.record(&Event::ExtractionStarted {
            path: item.source.clone(),
            destination: destination.clone(),
        });

        let limits = self.engine.limits;
        let overwrite = self.engine.overwrite;
        let result = Driver::new_or_create(&destination)
            .and_then(|d| d.limits(limits).overwrite(overwrite).extract(&item.source, item.format));

        let extracted = match result {
            Ok(report) => report,
            Err(e) => {
                if matches!(item.target, Target::Planned { .. }) {
                    // The directory was created for this archive; don't leave half of it behind.
                    if let Err(cleanup) = fs::remove_dir_all(&destination) {
                        warn!(path = %destination.display(), error = %cleanup, "could not remove partial extraction");
                    }
                }
                self.fail(item.source.clone(), e.kind(), e.to_string());
                self.keep_for_manual_extraction(&item);
                return;
            }
        };

        for skipped in &extracted.skipped {
            self.logger.record(&Event::EntrySkipped {
                archive: item.source.clone(),
                entry: skipped.entry.clone(),
                reason: skipped.reason.clone(),
            });
            self.report.warnings.push(EntryWarning {
                archive: item.source.clone(),
                entry: skipped.entry.clone(),
                reason: skipped.reason.clone(),
            });
        }

        self.report.archives_extracted += 1;
        self.report.files_extracted += extracted.files_extracted;
        self.report.bytes_written += extracted.bytes_written;
        self.logger.record(&Event::ExtractionSucceeded {
            path: item.source.clone(),
            produced: extracted.files_extracted,
        });

        if item.origin == Origin::Extracted {
            if let Err(e) = fs::remove_file(&item.source) {
                warn!(path = %item.source.display(), error = %e, "could not remove extracted archive");
            }
        }

        let mut produced = extracted.produced;
        produced.sort();
        for produced in produced {
            let Some(format) = ArchiveFormat::from_path(&produced) else {
                continue;
            };
            if let Ok(relative) = produced.strip_prefix(&self.root) {
                if self.engine.is_excluded(relative) {
                    continue;
                }
            }
            let base = produced.parent().unwrap_or(&destination).to_path_buf();
            let target = Target::Planned {
                base,
                name: archive_stem(&produced),
            };
            self.enqueue(produced, format, item.depth + 1, target, Origin::Extracted);
        }
    }

    fn destination_for(&self, target: &Target) -> Result<PathBuf, Error> {
        match target {
            Target::Into(dir) => Ok(dir.clone()),
            Target::Planned { base, name } => {
                fs::create_dir_all(base)?;
                self.planner.resolve(base, name)
            }
        }
    }

    fn enqueue(
        &mut self,
        source: PathBuf,
        format: ArchiveFormat,
        depth: usize,
        target: Target,
        origin: Origin,
    ) {
        self.report.archives_discovered += 1;
        self.logger.record(&Event::Discovered {
            path: source.clone(),
            depth,
        });
        self.queue.push_back(WorkItem {
            source,
            format,
            depth,
            target,
            origin,
        });
    }

    fn mirror_file(&mut self, source: &Path, destination: &Path) {
        let copied = destination
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::copy(source, destination));
        match copied {
            Ok(_) => {
                self.report.files_copied += 1;
                self.logger.record(&Event::Copied {
                    path: source.to_path_buf(),
                });
            }
            Err(e) => self.fail(source.to_path_buf(), FailureKind::Io, e.to_string()),
        }
    }

    /// A top-level archive that could not be extracted is copied into the
    /// mirrored output as-is so it can be dealt with by hand. Nested ones
    /// are already there.
    fn keep_for_manual_extraction(&mut self, item: &WorkItem) {
        if item.origin != Origin::Input || self.engine.mirror != MirrorMode::Full {
            return;
        }
        let Target::Planned { base, .. } = &item.target else {
            return;
        };
        let Some(file_name) = item.source.file_name() else {
            return;
        };
        let destination = base.join(file_name);
        let copied = fs::create_dir_all(base).and_then(|()| fs::copy(&item.source, &destination));
        if let Err(e) = copied {
            warn!(path = %item.source.display(), error = %e, "could not copy failed archive to output");
        }
    }

    fn fail(&mut self, path: PathBuf, kind: FailureKind, message: String) {
        self.logger.record(&Event::ExtractionFailed {
            path: path.clone(),
            kind,
            message: message.clone(),
        });
        self.report.failures.push(ArchiveFailure {
            path,
            kind,
            message,
        });
    }
}

/// Directory name for an archive's contents: the file name minus its extension.
///
/// `..zip` would leave `.`, so names made only of dots use the whole file
/// name with its dots replaced instead.
fn archive_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !stem.is_empty() && !stem.chars().all(|c| c == '.') {
        return stem;
    }
    path.file_name()
        .map(|name| name.to_string_lossy().replace('.', "_"))
        .unwrap_or_else(|| "archive".to_string())
}
