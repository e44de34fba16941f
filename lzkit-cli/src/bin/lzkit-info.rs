//! lzkit-info - show the header of `.lzma` container files.

use clap::{ArgAction, Parser};
use lzkit_cli::commands::cmd_info;
use lzkit_cli::init_logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lzkit-info")]
#[command(author, version, about = "Show information stored in .lzma file headers", long_about = None)]
struct Cli {
    /// Container files to inspect
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = cmd_info(&cli.files, cli.json) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
