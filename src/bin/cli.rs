//! ripple_unzip CLI - recursive archive extraction
//!
//! # Examples
//!
//! ```bash
//! # Unpack a directory tree, nested archives included
//! ripple_unzip ./incoming ./unpacked
//!
//! # Same, appending events to a log file
//! ripple_unzip ./incoming ./unpacked ./unzip.log
//!
//! # A single archive, shallow, with a per-archive size cap
//! ripple_unzip bundle.zip ./out --max-depth 3 --max-size 500M
//!
//! # Fail the process when any archive could not be extracted
//! ripple_unzip ./incoming ./unpacked --strict
//!
//! # Generate shell completions
//! ripple_unzip --completions bash > ~/.bash_completion.d/ripple_unzip
//! ```

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use ripple_unzip::{Engine, Error, Limits, MirrorMode, RunReport};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ripple_unzip",
    about = "Recursively extract nested zip and 7z archives",
    version,
    after_help = "EXAMPLES:
    ripple_unzip ./incoming ./unpacked
    ripple_unzip ./incoming ./unpacked ./unzip.log
    ripple_unzip bundle.7z ./out --max-depth 3"
)]
struct Cli {
    /// Directory or archive (.zip, .7z) to extract
    #[arg(required_unless_present = "completions")]
    input: Option<PathBuf>,

    /// Output directory (created if missing)
    #[arg(required_unless_present = "completions")]
    output: Option<PathBuf>,

    /// Append a timestamped line per event to this file
    log: Option<PathBuf>,

    /// Generate shell completions for the specified shell
    #[arg(long, value_enum)]
    completions: Option<Shell>,

    /// Maximum archive nesting depth
    #[arg(long)]
    max_depth: Option<usize>,

    /// Maximum bytes extracted from one archive (e.g., 100M, 1G)
    #[arg(long, value_parser = parse_size)]
    max_size: Option<u64>,

    /// Maximum number of files extracted from one archive
    #[arg(long)]
    max_files: Option<usize>,

    /// Maximum size of a single extracted file (e.g., 50M)
    #[arg(long, value_parser = parse_size)]
    max_single_file: Option<u64>,

    /// Skip input files matching glob patterns (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN")]
    exclude_patterns: Vec<String>,

    /// Only write extracted archive contents; don't copy other input files
    #[arg(long)]
    archives_only: bool,

    /// Exit with status 2 if any archive failed
    #[arg(long)]
    strict: bool,

    /// Quiet mode - only show errors
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - show every extracted file
    #[arg(short, long)]
    verbose: bool,
}

fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim().to_uppercase();
    let (num, multiplier) = if s.ends_with('G') || s.ends_with("GB") {
        (s.trim_end_matches("GB").trim_end_matches('G'), 1024 * 1024 * 1024)
    } else if s.ends_with('M') || s.ends_with("MB") {
        (s.trim_end_matches("MB").trim_end_matches('M'), 1024 * 1024)
    } else if s.ends_with('K') || s.ends_with("KB") {
        (s.trim_end_matches("KB").trim_end_matches('K'), 1024)
    } else {
        (s.as_str(), 1)
    };

    num.parse::<u64>()
        .map(|n| n * multiplier)
        .map_err(|_| format!("Invalid size: {}", s))
}

fn init_tracing(quiet: bool, verbose: bool) {
    let default = if quiet {
        "error"
    } else if verbose {
        "ripple_unzip=debug"
    } else {
        "ripple_unzip=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        generate(shell, &mut Cli::command(), "ripple_unzip", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    init_tracing(cli.quiet, cli.verbose);

    match run(&cli) {
        Ok(report) => {
            if !cli.quiet {
                print_summary(&cli, &report);
            }
            if cli.strict && report.failure_count() > 0 {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {}", format_error(&e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<RunReport, Error> {
    let input = cli.input.as_ref().expect("input is required");
    let output = cli.output.as_ref().expect("output is required");

    let defaults = Limits::default();
    let limits = Limits {
        max_total_bytes: cli.max_size.unwrap_or(defaults.max_total_bytes),
        max_file_count: cli.max_files.unwrap_or(defaults.max_file_count),
        max_single_file: cli.max_single_file.unwrap_or(defaults.max_single_file),
        max_nesting_depth: cli.max_depth.unwrap_or(defaults.max_nesting_depth),
        ..defaults
    };

    let mut engine = Engine::new()
        .limits(limits)
        .exclude(&cli.exclude_patterns);
    if cli.archives_only {
        engine = engine.mirror(MirrorMode::ArchivesOnly);
    }
    if let Some(log) = &cli.log {
        engine = engine.log_file(log);
    }

    engine.run(input, output)
}

fn print_summary(cli: &Cli, report: &RunReport) {
    let output = cli.output.as_deref().unwrap_or_else(|| std::path::Path::new("."));
    println!(
        "Extracted {} archives ({} files, {}) into {}",
        report.archives_extracted,
        report.files_extracted,
        format_bytes(report.bytes_written),
        output.display()
    );
    if report.files_copied > 0 {
        println!("Copied {} other files", report.files_copied);
    }
    if !report.warnings.is_empty() {
        println!("Skipped {} unsafe entries", report.warnings.len());
    }
    if !report.failures.is_empty() {
        println!("Failed {} archives:", report.failures.len());
        for failure in &report.failures {
            println!(
                "  [{}] {}: {}",
                failure.kind,
                failure.path.display(),
                failure.message
            );
        }
    }
    if report.cancelled {
        println!("Run was cancelled before all archives were processed");
    }
    println!("Elapsed time: {:.2} seconds", report.elapsed.as_secs_f64());
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.1}G", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.1}M", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1}K", bytes as f64 / 1024.0)
    } else {
        format!("{}B", bytes)
    }
}

fn format_error(e: &Error) -> String {
    match e {
        Error::InvalidInput { path, reason } => {
            format!("Cannot use input '{}': {}", path, reason)
        }
        Error::OutputNotCreatable { path, source } => {
            format!("Cannot create output directory '{}': {}", path, source)
        }
        _ => e.to_string(),
    }
}
