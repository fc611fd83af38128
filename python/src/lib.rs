use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use std::path::PathBuf;

// ============================================================================
// Error Types
// ============================================================================

pyo3::create_exception!(ripple_unzip, RippleUnzipError, pyo3::exceptions::PyException);
pyo3::create_exception!(ripple_unzip, InvalidInputError, RippleUnzipError);
pyo3::create_exception!(ripple_unzip, OutputError, RippleUnzipError);

fn to_py_err(err: ripple_unzip_core::Error) -> PyErr {
    match err {
        ripple_unzip_core::Error::InvalidInput { path, reason } => {
            InvalidInputError::new_err(format!("invalid input '{}': {}", path, reason))
        }
        ripple_unzip_core::Error::OutputNotCreatable { path, source } => OutputError::new_err(format!(
            "cannot create output directory '{}': {}",
            path, source
        )),
        ripple_unzip_core::Error::Io(e) => PyIOError::new_err(format!("I/O error: {}", e)),
        // Catch-all for future error variants (Error is #[non_exhaustive])
        _ => RippleUnzipError::new_err(format!("{}", err)),
    }
}

// ============================================================================
// Report
// ============================================================================

#[pyclass(name = "Report")]
#[derive(Clone)]
struct PyReport {
    #[pyo3(get)]
    archives_discovered: usize,
    #[pyo3(get)]
    archives_extracted: usize,
    #[pyo3(get)]
    files_extracted: usize,
    #[pyo3(get)]
    files_copied: usize,
    #[pyo3(get)]
    bytes_written: u64,
    /// `(path, kind, message)` per failed archive.
    #[pyo3(get)]
    failures: Vec<(String, String, String)>,
    /// `(archive, entry, reason)` per skipped entry.
    #[pyo3(get)]
    warnings: Vec<(String, String, String)>,
    #[pyo3(get)]
    cancelled: bool,
    #[pyo3(get)]
    elapsed_seconds: f64,
}

#[pymethods]
impl PyReport {
    #[getter]
    fn success_count(&self) -> usize {
        self.archives_extracted
    }

    #[getter]
    fn failure_count(&self) -> usize {
        self.failures.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "Report(archives_extracted={}, files_extracted={}, files_copied={}, failures={})",
            self.archives_extracted,
            self.files_extracted,
            self.files_copied,
            self.failures.len()
        )
    }
}

impl From<ripple_unzip_core::RunReport> for PyReport {
    fn from(r: ripple_unzip_core::RunReport) -> Self {
        PyReport {
            archives_discovered: r.archives_discovered,
            archives_extracted: r.archives_extracted,
            files_extracted: r.files_extracted,
            files_copied: r.files_copied,
            bytes_written: r.bytes_written,
            failures: r
                .failures
                .into_iter()
                .map(|f| (f.path.display().to_string(), f.kind.to_string(), f.message))
                .collect(),
            warnings: r
                .warnings
                .into_iter()
                .map(|w| (w.archive.display().to_string(), w.entry, w.reason))
                .collect(),
            cancelled: r.cancelled,
            elapsed_seconds: r.elapsed.as_secs_f64(),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Recursively extract every .zip and .7z under `input_path` into `output_path`.
#[pyfunction]
#[pyo3(signature = (input_path, output_path, log_path=None, max_depth=None, archives_only=false, exclude=None))]
fn ripple_unzip(
    py: Python<'_>,
    input_path: PathBuf,
    output_path: PathBuf,
    log_path: Option<PathBuf>,
    max_depth: Option<usize>,
    archives_only: bool,
    exclude: Option<Vec<String>>,
) -> PyResult<PyReport> {
    if max_depth == Some(0) {
        return Err(PyValueError::new_err("max_depth must be at least 1"));
    }

    let mut engine = ripple_unzip_core::Engine::new();
    if let Some(depth) = max_depth {
        engine = engine.max_nesting_depth(depth);
    }
    if archives_only {
        engine = engine.mirror(ripple_unzip_core::MirrorMode::ArchivesOnly);
    }
    if let Some(patterns) = exclude {
        engine = engine.exclude(&patterns);
    }
    if let Some(path) = log_path {
        engine = engine.log_file(path);
    }

    let report = py
        .allow_threads(|| engine.run(&input_path, &output_path))
        .map_err(to_py_err)?;
    Ok(report.into())
}

// ============================================================================
// Module
// ============================================================================

#[pymodule]
fn _ripple_unzip(py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyReport>()?;
    m.add_function(wrap_pyfunction!(ripple_unzip, m)?)?;

    m.add("RippleUnzipError", py.get_type::<RippleUnzipError>())?;
    m.add("InvalidInputError", py.get_type::<InvalidInputError>())?;
    m.add("OutputError", py.get_type::<OutputError>())?;

    Ok(())
}
