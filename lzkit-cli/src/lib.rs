//! Shared pieces of the `lzkit` and `lzkit-info` binaries.

pub mod commands;
pub mod utils;

pub use commands::RunOptions;
pub use utils::init_logging;
