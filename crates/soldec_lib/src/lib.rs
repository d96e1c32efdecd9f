use std::io::Read;

use serde::{Deserialize, Serialize};

mod cursor;
mod decoder;
mod error;
mod instruction;
mod render;

pub use cursor::ByteCursor;
pub use decoder::{Decoder, MAX_NESTING};
pub use error::SoldecError;
pub use instruction::{ControlType, DataType, Instruction, InstructionKind, KeywordType, Node, Operator};
pub use render::{render, render_at};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecompileMode {
    /// Pseudo-C text.
    Pseudo,
    /// The decoded instruction trees as pretty JSON.
    Tree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecompileOptions {
    pub mode: DecompileMode,
    /// Prefix every top-level statement with a `// 0x...` offset comment.
    pub annotate_addresses: bool,
}

impl Default for DecompileOptions {
    fn default() -> Self {
        Self {
            mode: DecompileMode::Pseudo,
            annotate_addresses: false,
        }
    }
}

/// Decode the top-level statements of one script.
///
/// Stops at the first terminator, or right after the first top-level block,
/// which closes the script body.
pub fn decode_script<R: Read + ?Sized>(decoder: &mut Decoder<'_, R>) -> Result<Vec<Instruction>, SoldecError> {
    let mut out = Vec::new();
    loop {
        let ins = decoder.decode_one()?;
        if ins.is_terminal() {
            break;
        }
        let is_block = ins.kind() == InstructionKind::Block;
        out.push(ins);
        if is_block {
            break;
        }
    }
    Ok(out)
}

/// Decompile the script starting at the reader's current position.
///
/// `start` is the offset the reader was positioned at; it is only used for
/// the addresses reported in the output and in errors.
pub fn decompile_with_options<R: Read + ?Sized>(
    reader: &mut R,
    start: u64,
    options: DecompileOptions,
) -> Result<String, SoldecError> {
    let mut decoder = Decoder::new(reader, start);
    let script = decode_script(&mut decoder)?;

    match options.mode {
        DecompileMode::Pseudo => {
            let mut out = String::new();
            for ins in &script {
                if options.annotate_addresses {
                    out.push_str(&format!("// 0x{:X}\n", ins.address));
                }
                out.push_str(&render(ins)?);
                out.push('\n');
            }
            Ok(out)
        }
        DecompileMode::Tree => {
            let mut out = serde_json::to_string_pretty(&script)?;
            out.push('\n');
            Ok(out)
        }
    }
}

pub fn decompile<R: Read + ?Sized>(reader: &mut R, start: u64) -> Result<String, SoldecError> {
    decompile_with_options(reader, start, DecompileOptions::default())
}
