//! Command implementations.

mod compress;
mod decompress;
mod info;

pub use compress::cmd_compress;
pub use decompress::cmd_decompress;
pub use info::{InfoReport, cmd_info, read_info, render_text};
pub use test::cmd_test;

use crate::utils::confirm_overwrite;
use lzkit_container::Config;
use std::error::Error;
use std::fs::File;
use std::path::Path;

/// Settings shared by the compress, decompress and test commands.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Session configuration.
    pub config: Config,
    /// Cap on scratch memory, in bytes.
    pub memory_limit: Option<usize>,
    /// Overwrite existing output without asking.
    pub force: bool,
    /// Show a progress bar.
    pub progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            config: Config::DEFAULT,
            memory_limit: None,
            force: false,
            progress: false,
        }
    }
}

/// Open `path` for reading and return it with its length.
fn open_input(path: &Path) -> Result<(File, u64), Box<dyn Error>> {
    let file = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

/// Create `path` for writing, asking first if it already exists.
///
/// Fails if `path` names the same file as `input`, which would be truncated
/// before it is read.
fn create_output(input: &Path, path: &Path, force: bool) -> Result<File, Box<dyn Error>> {
    if same_file(input, path) {
        return Err(format!(
            "{}: output is the input file ({})",
            path.display(),
            input.display()
        )
        .into());
    }

    confirm_overwrite(path, force)?;
    let file = File::create(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(file)
}

/// Whether both paths resolve to the same existing file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
