//! lzkit - compress, decompress and test `.lzma` container files.

use clap::{ArgAction, ArgGroup, Parser};
use lzkit_cli::commands::{RunOptions, cmd_compress, cmd_decompress, cmd_test};
use lzkit_cli::init_logging;
use lzkit_container::{Config, DEFAULT_BUFFER_SIZE};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lzkit")]
#[command(author, version, about = "LZMA container compression tool", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["compress", "decompress", "test"])
))]
struct Cli {
    /// Compress INPUT into OUTPUT
    #[arg(short, long)]
    compress: bool,

    /// Decompress INPUT into OUTPUT
    #[arg(short, long)]
    decompress: bool,

    /// Test the integrity of INPUT
    #[arg(short, long)]
    test: bool,

    /// Input file
    input: PathBuf,

    /// Output file
    #[arg(required_unless_present = "test", conflicts_with = "test")]
    output: Option<PathBuf>,

    /// Dictionary size in bytes when compressing
    #[arg(long, value_name = "BYTES", default_value_t = 65536)]
    dict_size: u32,

    /// Omit the end-of-stream marker when compressing
    #[arg(long)]
    no_end_marker: bool,

    /// Staging buffer size in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Cap on scratch memory in bytes
    #[arg(long, value_name = "BYTES")]
    memory_limit: Option<usize>,

    /// Overwrite the output file without asking
    #[arg(short, long)]
    force: bool,

    /// Show a progress bar
    #[arg(short = 'P', long)]
    progress: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        let config = Config::DEFAULT
            .with_dictionary_size(self.dict_size)
            .with_end_marker(!self.no_end_marker)
            .with_buffer_size(self.buffer_size);

        RunOptions {
            config,
            memory_limit: self.memory_limit,
            force: self.force,
            progress: self.progress,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = cli.run_options();

    let result = match (&cli.output, cli.test) {
        (_, true) => cmd_test(&cli.input, &options),
        (Some(output), false) if cli.compress => cmd_compress(&cli.input, output, &options),
        (Some(output), false) => cmd_decompress(&cli.input, output, &options),
        (None, false) => Err("an output file is required".into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
