use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SoldecError {
    /// Raised by the cursor. The decoder turns it into an `Invalid` terminal
    /// at instruction boundaries and into `TruncatedStream` everywhere else.
    #[error("unexpected end of input at offset 0x{offset:X}")]
    EndOfStream { offset: u64 },

    #[error("truncated stream at offset 0x{offset:X} (opcode 0x{opcode:02X} needs more bytes)")]
    TruncatedStream { offset: u64, opcode: u8 },

    #[error("unsupported constant encoding 0x{code:02X} at offset 0x{offset:X} (string/byte array)")]
    UnsupportedEncoding { offset: u64, code: u8 },

    #[error("unrecognized {what} 0x{code:X} at offset 0x{offset:X}")]
    UnrecognizedCode { offset: u64, what: &'static str, code: u32 },

    #[error("nesting deeper than {limit} levels at offset 0x{offset:X}")]
    NestingTooDeep { offset: u64, limit: usize },

    #[error("structural violation: {0}")]
    StructuralViolation(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("failed to serialize instruction tree: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SoldecError {
    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        SoldecError::StructuralViolation(msg.into())
    }
}
