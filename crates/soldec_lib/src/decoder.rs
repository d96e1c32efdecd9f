use std::io::Read;

use crate::cursor::ByteCursor;
use crate::error::SoldecError;
use crate::instruction::{ControlType, DataType, Instruction, KeywordType, Node, Operator};

// Memory bank bases, selected by the high nibble of the selector byte.
const MEMORY_BANK_80: i32 = 0x0203_D800;
const MEMORY_BANK_10: i32 = 0x0203_F000;
const MEMORY_BANK_DEFAULT: i32 = 0x0203_E800;

/// Deepest instruction nesting accepted. Every node counts as one level.
pub const MAX_NESTING: usize = 256;

/// Recursive decoder over a borrowed, externally positioned byte source.
///
/// Each call consumes exactly the bytes of one instruction (with all of its
/// children) and never looks ahead.
pub struct Decoder<'a, R: Read + ?Sized> {
    cursor: ByteCursor<'a, R>,
    depth: usize,
}

impl<'a, R: Read + ?Sized> Decoder<'a, R> {
    pub fn new(reader: &'a mut R, start: u64) -> Self {
        Self {
            cursor: ByteCursor::new(reader, start),
            depth: 0,
        }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Decode one instruction tree.
    ///
    /// Running out of input before the opcode byte yields an `Invalid` node,
    /// which callers treat like `End`. Running out after it is an error.
    pub fn decode_one(&mut self) -> Result<Instruction, SoldecError> {
        let address = self.cursor.position();
        let opcode = match self.cursor.read_u8() {
            Ok(b) => b,
            Err(SoldecError::EndOfStream { .. }) => return Ok(Instruction::new(address, Node::Invalid)),
            Err(e) => return Err(e),
        };

        self.enter(address)?;
        let node = self.decode_body(address, opcode).map_err(|e| match e {
            SoldecError::EndOfStream { offset } => SoldecError::TruncatedStream { offset, opcode },
            e => e,
        });
        self.depth -= 1;
        Ok(Instruction::new(address, node?))
    }

    /// Decode a sibling run up to (and consuming) its terminator.
    pub fn decode_block(&mut self) -> Result<Instruction, SoldecError> {
        let address = self.cursor.position();
        self.enter(address)?;
        let children = self.decode_run();
        self.depth -= 1;
        Ok(Instruction::new(address, Node::Block(children?)))
    }

    fn enter(&mut self, address: u64) -> Result<(), SoldecError> {
        if self.depth >= MAX_NESTING {
            return Err(SoldecError::NestingTooDeep {
                offset: address,
                limit: MAX_NESTING,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn decode_run(&mut self) -> Result<Vec<Instruction>, SoldecError> {
        let mut out = Vec::new();
        loop {
            let ins = self.decode_one()?;
            if ins.is_terminal() {
                return Ok(out);
            }
            out.push(ins);
        }
    }

    fn decode_body(&mut self, address: u64, opcode: u8) -> Result<Node, SoldecError> {
        match opcode & 0xF0 {
            0x10 | 0x20 => self.decode_memory(opcode),
            0x30 => {
                self.skip_script_offset(opcode)?;
                let mut children = Vec::new();
                loop {
                    let ins = self.decode_one()?;
                    if ins.is_expression_end() || matches!(ins.node, Node::Invalid) {
                        break;
                    }
                    children.push(ins);
                }
                Ok(Node::Expression(children))
            }
            0x40 => {
                let id = match opcode & 0x0F {
                    0x0F => 0x0F + self.cursor.read_u8()? as u32,
                    n => n as u32,
                };
                Ok(Node::Parameter(id))
            }
            0x50 => {
                self.skip_script_offset(opcode)?;
                self.decode_keyword(address)
            }
            0x60 => {
                self.skip_script_offset(opcode)?;
                self.decode_control(address)
            }
            0x70 => {
                self.skip_script_offset(opcode)?;
                let tag = self.cursor.read_u16_le()?;
                let args = self.decode_run()?;
                Ok(Node::Call { tag, args })
            }
            0x80 => {
                self.skip_script_offset(opcode)?;
                Ok(Node::Block(self.decode_run()?))
            }
            0x90 => Ok(Node::Variable(opcode & 0x0F)),
            0xA0 | 0xB0 => {
                let id = opcode & 0x1F;
                let op = Operator::new(id).ok_or(SoldecError::UnrecognizedCode {
                    offset: address,
                    what: "operator",
                    code: id as u32,
                })?;
                Ok(Node::Operator(op))
            }
            // 0x00 and 0xC0..=0xF0
            _ => self.decode_constant(address, opcode),
        }
    }

    /// The branch target is meaningless once blocks are nested, so only its
    /// width matters.
    fn skip_script_offset(&mut self, opcode: u8) -> Result<(), SoldecError> {
        let width = match opcode & 0x0F {
            0x0D => 1,
            0x0E => 2,
            0x0F => 3,
            _ => 0,
        };
        self.cursor.skip(width)
    }

    fn decode_constant(&mut self, address: u64, opcode: u8) -> Result<Node, SoldecError> {
        if opcode & 0xF0 != 0 {
            return Ok(Node::Constant {
                data_type: DataType::Int32,
                value: (opcode & 0x3F) as i32 - 1,
            });
        }

        let (data_type, value) = match opcode {
            0 => return Ok(Node::End),
            1 => (DataType::Int16, self.cursor.read_i16_le()? as i32),
            2..=4 => (DataType::UInt8, self.cursor.read_u8()? as i32),
            6 | 8 => (DataType::UInt16, self.cursor.read_u16_le()? as i32),
            9 | 10 | 13 => (DataType::Int32, self.cursor.read_i32_le()?),
            7 | 14 => {
                return Err(SoldecError::UnsupportedEncoding {
                    offset: address,
                    code: opcode,
                });
            }
            _ => {
                return Err(SoldecError::UnrecognizedCode {
                    offset: address,
                    what: "constant encoding",
                    code: opcode as u32,
                });
            }
        };
        Ok(Node::Constant { data_type, value })
    }

    fn decode_memory(&mut self, opcode: u8) -> Result<Node, SoldecError> {
        let base = match self.cursor.read_u8()? & 0xF0 {
            0x80 => MEMORY_BANK_80,
            0x10 => MEMORY_BANK_10,
            _ => MEMORY_BANK_DEFAULT,
        };
        // High byte first, unlike every other field.
        let address = base + self.cursor.read_u16_be()? as i32;
        let data_type = DataType::from_memory_opcode(opcode);

        if opcode & 0xF0 == 0x20 {
            let first = self.decode_one()?;
            let index = self.decode_one()?;
            Ok(Node::MemoryIndexed {
                data_type,
                address,
                operands: Box::new([first, index]),
            })
        } else {
            Ok(Node::Memory { data_type, address })
        }
    }

    fn decode_keyword(&mut self, address: u64) -> Result<Node, SoldecError> {
        let code = self.cursor.read_u8()?;
        let unrecognized = || SoldecError::UnrecognizedCode {
            offset: address,
            what: "keyword",
            code: code as u32,
        };
        let keyword = KeywordType::from_code(code).ok_or_else(unrecognized)?;
        let arity = match keyword {
            KeywordType::Else | KeywordType::Keyword6D => 1,
            KeywordType::ElseIf => 2,
            // Case and Default have no encoding of their own.
            KeywordType::Case | KeywordType::Default => return Err(unrecognized()),
        };

        let mut children = Vec::with_capacity(arity);
        for _ in 0..arity {
            children.push(self.decode_one()?);
        }
        Ok(Node::Keyword { keyword, children })
    }

    fn decode_control(&mut self, address: u64) -> Result<Node, SoldecError> {
        let tag = self.cursor.read_u16_le()?;
        if self.cursor.read_u8()? & 0x80 != 0 {
            // second flag byte, unused
            self.cursor.read_u8()?;
        }

        let control = ControlType::from_tag(tag).ok_or(SoldecError::UnrecognizedCode {
            offset: address,
            what: "control tag",
            code: tag as u32,
        })?;

        let mut children = Vec::new();
        match control {
            ControlType::If => {
                children.push(self.decode_one()?);
                children.push(self.decode_one()?);
                children.extend(self.decode_run()?);
            }
            ControlType::Return => {
                children.push(self.decode_one()?);
            }
            ControlType::CtrlB745 => {
                children.push(self.decode_one()?);
                loop {
                    let ins = self.decode_one()?;
                    if ins.is_terminal() {
                        break;
                    }
                    // Only 0x6D arms are kept, and only their body.
                    if let Node::Keyword {
                        keyword: KeywordType::Keyword6D,
                        children: arm,
                    } = ins.node
                    {
                        children.extend(arm.into_iter().take(1));
                    }
                }
            }
        }
        Ok(Node::Control { control, children })
    }
}
