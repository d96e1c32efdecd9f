use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

use clap::{CommandFactory, Parser};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, DecompileModeCli, TopLevel};

mod cli;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(path: &Path, offset: u64, options: soldec_lib::DecompileOptions) -> Result<String, soldec_lib::SoldecError> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut reader = BufReader::new(file);
    soldec_lib::decompile_with_options(&mut reader, offset, options)
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Some(TopLevel::Decompile {
            path,
            offset,
            mode,
            annotate,
        }) => {
            let mode = match mode {
                DecompileModeCli::Pseudo => soldec_lib::DecompileMode::Pseudo,
                DecompileModeCli::Tree => soldec_lib::DecompileMode::Tree,
            };
            debug!("decompiling {} at 0x{:X}", path.display(), offset);
            match run(
                &path,
                offset,
                soldec_lib::DecompileOptions {
                    mode,
                    annotate_addresses: annotate,
                },
            ) {
                Ok(out) => {
                    print!("{out}");
                }
                Err(e) => {
                    error!("failed to decompile {path:?} at 0x{offset:X}: {e}");
                    std::process::exit(1);
                }
            }
        }
        Some(TopLevel::Completion { shell }) => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        }
        None => {
            if let Err(e) = Cli::command().print_help() {
                error!("failed to print help: {e}");
            }
        }
    }
}
