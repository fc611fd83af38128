//! Async API (requires the `async` feature).
//!
//! Extraction is synchronous file I/O, so these functions run the regular
//! [`Engine`] on tokio's blocking pool via [`tokio::task::spawn_blocking`].
//! Event order and the run report are exactly what the sync API produces.
//!
//! # Example
//!
//! ```no_run
//! use ripple_unzip::r#async::{ripple_unzip, AsyncEngine};
//! use ripple_unzip::Engine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ripple_unzip::Error> {
//!     let report = ripple_unzip("incoming", "unpacked", None).await?;
//!
//!     let report = AsyncEngine::new(Engine::new().max_nesting_depth(5))
//!         .run("incoming", "unpacked-shallow")
//!         .await?;
//!
//!     println!("Extracted {} archives", report.archives_extracted);
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use tokio::task::spawn_blocking;

use crate::{CancelToken, Engine, Error, RunReport};

/// Runs an [`Engine`] off the async executor.
#[derive(Clone)]
pub struct AsyncEngine {
    engine: Engine,
}

impl AsyncEngine {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Attach a cancel token; cancelling it stops the run between archives.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.engine = self.engine.cancel_token(token);
        self
    }

    pub async fn run<I: AsRef<Path>, O: AsRef<Path>>(
        &self,
        input: I,
        output: O,
    ) -> Result<RunReport, Error> {
        let engine = self.engine.clone();
        let input = input.as_ref().to_path_buf();
        let output = output.as_ref().to_path_buf();
        spawn_blocking(move || engine.run(input, output))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }
}

/// Async counterpart of [`crate::ripple_unzip`].
pub async fn ripple_unzip<I: AsRef<Path>, O: AsRef<Path>>(
    input: I,
    output: O,
    log_path: Option<PathBuf>,
) -> Result<RunReport, Error> {
    let mut engine = Engine::new();
    if let Some(path) = log_path {
        engine = engine.log_file(path);
    }
    AsyncEngine::new(engine).run(input, output).await
}
