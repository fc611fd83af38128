//! Run events and the optional append-only log sink.
//!
//! Every event goes to `tracing`. When a sink is configured each event is
//! also written as one line and flushed right away, so a crash mid-run
//! still leaves a usable log:
//!
//! ```text
//! 19/10/2026 14:03:11 [INFO] extracted input/a.zip (3 files)
//! ```

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::FailureKind;

/// Something that happened during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An archive was found and queued.
    Discovered { path: PathBuf, depth: usize },
    ExtractionStarted { path: PathBuf, destination: PathBuf },
    ExtractionSucceeded { path: PathBuf, produced: usize },
    ExtractionFailed {
        path: PathBuf,
        kind: FailureKind,
        message: String,
    },
    /// The archive was left unextracted because it is nested too deep.
    MaxDepthExceeded {
        path: PathBuf,
        depth: usize,
        limit: usize,
    },
    /// One entry of an archive was left out.
    EntrySkipped {
        archive: PathBuf,
        entry: String,
        reason: String,
    },
    /// A non-archive input file was mirrored into the output.
    Copied { path: PathBuf },
    /// An input file matched an exclude pattern.
    Excluded { path: PathBuf },
    /// The run stopped early with work still queued.
    Cancelled { pending: usize },
    /// A fatal error ended the run.
    Aborted { message: String },
    Finished {
        archives_extracted: usize,
        failures: usize,
    },
}

/// Severity tag written in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        })
    }
}

impl Event {
    pub fn level(&self) -> Level {
        match self {
            Self::Discovered { .. }
            | Self::ExtractionStarted { .. }
            | Self::ExtractionSucceeded { .. }
            | Self::Copied { .. }
            | Self::Excluded { .. }
            | Self::Finished { .. } => Level::Info,
            Self::EntrySkipped { .. } | Self::Cancelled { .. } => Level::Warning,
            Self::ExtractionFailed { .. }
            | Self::MaxDepthExceeded { .. }
            | Self::Aborted { .. } => Level::Error,
        }
    }

    /// The archive or file this event is about, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Discovered { path, .. }
            | Self::ExtractionStarted { path, .. }
            | Self::ExtractionSucceeded { path, .. }
            | Self::ExtractionFailed { path, .. }
            | Self::MaxDepthExceeded { path, .. }
            | Self::Copied { path }
            | Self::Excluded { path } => Some(path),
            Self::EntrySkipped { archive, .. } => Some(archive),
            Self::Cancelled { .. } | Self::Aborted { .. } | Self::Finished { .. } => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovered { path, depth } => {
                write!(f, "discovered {} (depth {})", path.display(), depth)
            }
            Self::ExtractionStarted { path, destination } => write!(
                f,
                "extracting {} into {}",
                path.display(),
                destination.display()
            ),
            Self::ExtractionSucceeded { path, produced } => {
                write!(f, "extracted {} ({} files)", path.display(), produced)
            }
            Self::ExtractionFailed {
                path,
                kind,
                message,
            } => write!(f, "{}: {} with ({})", kind, message, path.display()),
            Self::MaxDepthExceeded { path, depth, limit } => write!(
                f,
                "MaxDepthExceededError: {} is nested {} levels deep (limit {}), left unextracted",
                path.display(),
                depth,
                limit
            ),
            Self::EntrySkipped {
                archive,
                entry,
                reason,
            } => write!(
                f,
                "skipped entry '{}' in {}: {}",
                entry,
                archive.display(),
                reason
            ),
            Self::Copied { path } => write!(f, "copied {}", path.display()),
            Self::Excluded { path } => write!(f, "excluded {}", path.display()),
            Self::Cancelled { pending } => {
                write!(f, "run cancelled with {} archives pending", pending)
            }
            Self::Aborted { message } => write!(f, "{}", message),
            Self::Finished {
                archives_extracted,
                failures,
            } => write!(
                f,
                "finished: {} archives extracted, {} failed",
                archives_extracted, failures
            ),
        }
    }
}

/// Callback invoked for every recorded event.
pub type Observer = Arc<dyn Fn(&Event) + Send + Sync>;

/// Records run events to `tracing`, an optional line sink and an optional observer.
///
/// Recording never fails. If the sink returns an error it is dropped after
/// one warning and the run carries on without it.
#[derive(Default)]
pub struct RunLogger {
    sink: Option<Box<dyn Write + Send>>,
    observer: Option<Observer>,
}

impl RunLogger {
    /// A logger with no sink; events only reach `tracing` and the observer.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Append to the file at `path`, creating it if needed.
    ///
    /// A file that cannot be opened leaves the logger without a sink.
    pub fn to_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Self::to_writer(file),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot open log file, continuing without it");
                Self::disabled()
            }
        }
    }

    pub fn to_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            sink: Some(Box::new(writer)),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    pub fn record(&mut self, event: &Event) {
        match event.level() {
            Level::Info => info!("{}", event),
            Level::Warning => warn!("{}", event),
            Level::Error => error!("{}", event),
        }

        if let Some(observer) = &self.observer {
            observer(event);
        }

        if let Some(sink) = self.sink.as_mut() {
            let line = format_line(event);
            let written = sink
                .write_all(line.as_bytes())
                .and_then(|()| sink.flush());
            if let Err(e) = written {
                warn!(error = %e, "log sink failed, further events will not be written to it");
                self.sink = None;
            }
        }
    }
}

fn format_line(event: &Event) -> String {
    format!(
        "{} [{}] {}\n",
        chrono::Local::now().format("%d/%m/%Y %H:%M:%S"),
        event.level(),
        event
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_line_format() {
        let buf = SharedBuf::default();
        let mut logger = RunLogger::to_writer(buf.clone());
        logger.record(&Event::ExtractionSucceeded {
            path: PathBuf::from("in/a.zip"),
            produced: 3,
        });

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(text.ends_with("[INFO] extracted in/a.zip (3 files)\n"), "{}", text);
        // dd/mm/YYYY HH:MM:SS
        assert_eq!(text.find(" ["), Some(19));
    }

    #[test]
    fn test_failure_lines_are_errors() {
        let event = Event::ExtractionFailed {
            path: PathBuf::from("bad.7z"),
            kind: FailureKind::CorruptArchive,
            message: "bad signature".into(),
        };
        assert_eq!(event.level(), Level::Error);
        assert!(event.to_string().starts_with("CorruptArchiveError"));
    }

    #[test]
    fn test_broken_sink_degrades_to_noop() {
        let mut logger = RunLogger::to_writer(BrokenSink);
        assert!(logger.has_sink());
        logger.record(&Event::Copied {
            path: PathBuf::from("x"),
        });
        assert!(!logger.has_sink());
        // Still safe to keep recording.
        logger.record(&Event::Cancelled { pending: 1 });
    }

    #[test]
    fn test_observer_sees_every_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut logger = RunLogger::disabled().with_observer(Arc::new(move |e: &Event| {
            sink.lock().unwrap().push(e.clone());
        }));
        logger.record(&Event::Discovered {
            path: PathBuf::from("a.zip"),
            depth: 1,
        });
        logger.record(&Event::Cancelled { pending: 0 });
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
