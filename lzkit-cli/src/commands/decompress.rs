//! Decompress command.

use super::{RunOptions, create_output, open_input};
use crate::utils::{FileError, copy_mtime, create_progress_bar, make_allocator, remove_partial};
use lzkit_container::decompress;
use lzkit_core::{IoSink, IoSource};
use std::error::Error;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Decompress the container file `input` into `output`.
pub fn cmd_decompress(
    input: &Path,
    output: &Path,
    options: &RunOptions,
) -> Result<(), Box<dyn Error>> {
    let (file, len) = open_input(input)?;
    let out_file = create_output(input, output, options.force)?;

    let pb = create_progress_bar(len, options.progress);
    pb.set_message("decompressing");

    let mut source = IoSource::with_len(pb.wrap_read(BufReader::new(file)), len);
    let mut sink = IoSink::new(BufWriter::new(out_file));
    let allocator = make_allocator(options.memory_limit);

    let result = decompress(&mut source, &mut sink, &options.config, &*allocator);
    drop(sink);
    pb.finish_and_clear();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            remove_partial(output);
            return Err(FileError::new(input, Some(output), e).into());
        }
    };

    copy_mtime(input, output)?;

    log::info!(
        "{}: {} -> {} bytes{}",
        input.display(),
        summary.input_size,
        summary.output_size,
        if summary.end_marker {
            " (end marker)"
        } else {
            ""
        }
    );

    Ok(())
}
