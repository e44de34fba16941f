//! Compress command.

use super::{RunOptions, create_output, open_input};
use crate::utils::{
    FileError, copy_mtime, create_progress_bar, make_allocator, remove_partial, space_savings,
};
use lzkit_container::compress;
use lzkit_core::{IoSink, IoSource};
use std::error::Error;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Compress `input` into the container file `output`.
pub fn cmd_compress(
    input: &Path,
    output: &Path,
    options: &RunOptions,
) -> Result<(), Box<dyn Error>> {
    let (file, len) = open_input(input)?;
    let out_file = create_output(input, output, options.force)?;

    let pb = create_progress_bar(len, options.progress);
    pb.set_message("compressing");

    let mut source = IoSource::with_len(pb.wrap_read(BufReader::new(file)), len);
    let mut sink = IoSink::new(BufWriter::new(out_file));
    let allocator = make_allocator(options.memory_limit);

    let result = compress(&mut source, &mut sink, &options.config, &*allocator);
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
        "{}: {} -> {} bytes ({:.1}% saved)",
        input.display(),
        summary.input_size,
        summary.output_size,
        space_savings(summary.input_size, summary.output_size)
    );

    Ok(())
}
