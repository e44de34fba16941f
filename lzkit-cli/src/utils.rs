//! Utility functions for the CLI.

use dialoguer::Confirm;
use filetime::FileTime;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use lzkit_core::{CodecError, ErrorKind, LimitedAllocator, ScratchAllocator, SystemAllocator};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A codec error tied to the file it happened on.
#[derive(Debug, Error)]
#[error("{}: {kind}: {source}", .path.display())]
pub struct FileError {
    /// The file being read or written.
    pub path: PathBuf,
    /// Failure category.
    pub kind: ErrorKind,
    /// The underlying error.
    pub source: CodecError,
}

impl FileError {
    /// Attach `err` to whichever of `input`/`output` it concerns.
    pub fn new(input: &Path, output: Option<&Path>, err: CodecError) -> Self {
        let path = match (err.kind(), output) {
            (ErrorKind::WriteFailure, Some(output)) => output,
            _ => input,
        };

        Self {
            path: path.to_path_buf(),
            kind: err.kind(),
            source: err,
        }
    }
}

/// Log level for a `-v` count: warn, info, debug, then trace.
pub fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the stderr logger. `RUST_LOG` overrides the `-v` level.
pub fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::new();

    builder.filter_level(level_for(verbose));
    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(buf, "[{}] {}", record.level(), record.args())
    });
    builder.parse_default_env();

    let _ = builder.try_init();
}

/// Create a byte-count progress bar with standard styling.
pub fn create_progress_bar(len: u64, enable: bool) -> ProgressBar {
    if !enable {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
    {
        pb.set_style(style.progress_chars("█▓▒░ "));
    }
    pb
}

/// The allocator for a session: capped if `limit` is given.
pub fn make_allocator(limit: Option<usize>) -> Box<dyn ScratchAllocator> {
    match limit {
        Some(limit) => Box::new(LimitedAllocator::new(limit)),
        None => Box::new(SystemAllocator),
    }
}

/// Decide whether `path` may be written.
///
/// A missing file or `force` is fine. Otherwise ask on a terminal, and
/// refuse when stdin is not one.
pub fn confirm_overwrite(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if force || !path.exists() {
        return Ok(());
    }

    if !std::io::stdin().is_terminal() {
        return Err(format!(
            "{}: output file exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }

    let overwrite = Confirm::new()
        .with_prompt(format!("{} already exists. Overwrite?", path.display()))
        .default(false)
        .interact()?;

    if overwrite {
        Ok(())
    } else {
        Err(format!("{}: not overwritten", path.display()).into())
    }
}

/// Give `to` the modification time of `from`.
pub fn copy_mtime(from: &Path, to: &Path) -> std::io::Result<()> {
    let metadata = std::fs::metadata(from)?;
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_mtime(to, mtime)
}

/// Delete a partially written output file.
pub fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("removed partial output {}", path.display()),
        Err(e) => log::warn!("could not remove {}: {}", path.display(), e),
    }
}

/// Percentage of the input saved by compression.
pub fn space_savings(input: u64, output: u64) -> f64 {
    if input == 0 {
        return 0.0;
    }
    (1.0 - output as f64 / input as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_level_for() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(9), LevelFilter::Trace);
    }

    #[test]
    fn test_file_error_names_output_on_write_failure() {
        let input = Path::new("in.txt");
        let output = Path::new("out.lzma");

        let err = FileError::new(
            input,
            Some(output),
            CodecError::WriteFailure(io::Error::new(io::ErrorKind::WriteZero, "disk full")),
        );
        assert_eq!(err.path, output);
        assert!(err.to_string().starts_with("out.lzma: write failure: "));

        let err = FileError::new(input, Some(output), CodecError::truncated(Some(4)));
        assert_eq!(err.path, input);
        assert_eq!(err.kind, ErrorKind::TruncatedInput);
        assert!(err.to_string().starts_with("in.txt: truncated input: "));
    }

    #[test]
    fn test_confirm_overwrite_missing_or_forced() {
        let missing = std::env::temp_dir().join("lzkit-no-such-file-for-confirm");
        assert!(confirm_overwrite(&missing, false).is_ok());

        let existing = std::env::temp_dir();
        assert!(confirm_overwrite(&existing, true).is_ok());
    }

    #[test]
    fn test_make_allocator_limit() {
        let limited = make_allocator(Some(100));
        assert!(limited.alloc(101).is_none());
        let buffer = limited.alloc(100).unwrap();
        limited.free(buffer);

        assert!(make_allocator(None).alloc(1000).is_some());
    }

    #[test]
    fn test_space_savings() {
        assert_eq!(space_savings(0, 18), 0.0);
        assert!((space_savings(200, 50) - 75.0).abs() < 1e-9);
    }
}
