use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, builder::{Styles, styling::{AnsiColor, Effects}}, crate_description, crate_name, crate_version};
use clap_complete::Shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DecompileModeCli {
    Pseudo,
    Tree,
}

#[derive(Parser)]
#[command(name = crate_name!(),
    version = crate_version!(),
    about = crate_description!(),
    styles = Styles::styled()
        .header(AnsiColor::BrightGreen.on_default() | Effects::BOLD | Effects::UNDERLINE)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default()))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<TopLevel>,
}

#[derive(Subcommand)]
pub enum TopLevel {
    /// Decompiles the script starting at OFFSET in a bytecode file
    Decompile {
        /// Path to the file holding the bytecode
        path: PathBuf,

        /// Offset of the script's first instruction, in hex (e.g. 0x1A40)
        #[arg(value_parser = parse_offset)]
        offset: u64,

        /// Output mode
        #[arg(long, value_enum, default_value_t = DecompileModeCli::Pseudo)]
        mode: DecompileModeCli,

        /// Prefix each top-level statement with its offset
        #[arg(long, default_value_t = false)]
        annotate: bool,
    },
    /// Generate shell completion
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_offset(s: &str) -> Result<u64, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid hex offset {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn offsets_are_hex() {
        assert_eq!(parse_offset("0x1A40"), Ok(0x1A40));
        assert_eq!(parse_offset("0X10"), Ok(0x10));
        assert_eq!(parse_offset("ff"), Ok(0xFF));
        assert!(parse_offset("0xZZ").is_err());
        assert!(parse_offset("").is_err());
    }

    #[test]
    fn parses_decompile() {
        let cli = Cli::try_parse_from(["soldec", "decompile", "rom.bin", "0x200", "--mode", "tree", "--annotate"]).unwrap();
        match cli.command {
            Some(TopLevel::Decompile { path, offset, mode, annotate }) => {
                assert_eq!(path, PathBuf::from("rom.bin"));
                assert_eq!(offset, 0x200);
                assert_eq!(mode, DecompileModeCli::Tree);
                assert!(annotate);
            }
            _ => panic!("expected decompile"),
        }
    }

    #[test]
    fn rejects_bad_offset() {
        assert!(Cli::try_parse_from(["soldec", "decompile", "rom.bin", "0xnope"]).is_err());
    }
}
