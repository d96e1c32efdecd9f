use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Void,
    Bool,
    UInt8,
    Int16,
    UInt16,
    UInt24,
    Int32,
}

impl DataType {
    /// Element type of a memory reference, from the opcode's low nibble.
    pub fn from_memory_opcode(opcode: u8) -> Self {
        match opcode & 0x0F {
            1 | 6 => DataType::Int16,
            2 | 3 => DataType::UInt8,
            4 => DataType::Bool,
            8 => DataType::UInt24,
            9 => DataType::Int32,
            _ => DataType::Void,
        }
    }

    pub fn c_name(self) -> &'static str {
        match self {
            DataType::Void => "void",
            DataType::Bool => "bool",
            DataType::UInt8 => "uint8_t",
            DataType::Int16 => "int16_t",
            DataType::UInt16 => "uint16_t",
            DataType::UInt24 => "uint24_t",
            DataType::Int32 => "int32_t",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

/// Flat discriminant of [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionKind {
    Invalid,
    Constant,
    Memory,
    MemoryIndexed,
    Expression,
    Parameter,
    Keyword,
    Control,
    Call,
    Block,
    Variable,
    Operator,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeywordType {
    Case,
    Default,
    Else,
    ElseIf,
    Keyword6D,
}

impl KeywordType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x63 => Some(KeywordType::Case),
            0x64 => Some(KeywordType::Default),
            0x65 => Some(KeywordType::Else),
            0x69 => Some(KeywordType::ElseIf),
            0x6D => Some(KeywordType::Keyword6D),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            KeywordType::Case => 0x63,
            KeywordType::Default => 0x64,
            KeywordType::Else => 0x65,
            KeywordType::ElseIf => 0x69,
            KeywordType::Keyword6D => 0x6D,
        }
    }

    /// Keywords printed on the same line as the statement they follow.
    pub fn continues_line(self) -> bool {
        matches!(self, KeywordType::Else | KeywordType::ElseIf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlType {
    If,
    Return,
    CtrlB745,
}

impl ControlType {
    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            0x0D86 => Some(ControlType::If),
            0xCD3A => Some(ControlType::Return),
            0xB745 => Some(ControlType::CtrlB745),
            _ => None,
        }
    }

    pub fn tag(self) -> u16 {
        match self {
            ControlType::If => 0x0D86,
            ControlType::Return => 0xCD3A,
            ControlType::CtrlB745 => 0xB745,
        }
    }
}

const OPERATOR_SYMBOLS: [&str; 24] = [
    ";", "-", "!", "~", "+", "-", "*", "/", //
    "%", "<<", ">>", "==", "!=", "<", "<=", ">", //
    ">=", "|", "&", "^", "||", "&&", "=", "",
];

// Lower binds tighter.
const OPERATOR_PRECEDENCE: [u8; 24] = [
    0, 2, 2, 2, 4, 4, 3, 3, //
    3, 5, 5, 7, 7, 6, 6, 6, //
    6, 10, 8, 9, 12, 11, 14, 16,
];

/// Operator id, always an index into the 24-entry operator tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Operator(u8);

impl Operator {
    pub const TERMINATOR: Operator = Operator(0);
    pub const ASSIGN: Operator = Operator(22);

    pub fn new(id: u8) -> Option<Self> {
        ((id as usize) < OPERATOR_SYMBOLS.len()).then_some(Operator(id))
    }

    pub fn id(self) -> u8 {
        self.0
    }

    pub fn symbol(self) -> &'static str {
        OPERATOR_SYMBOLS[self.0 as usize]
    }

    pub fn precedence(self) -> u8 {
        OPERATOR_PRECEDENCE[self.0 as usize]
    }

    pub fn is_terminator(self) -> bool {
        self.0 == 0
    }

    /// Unary minus, logical not, bitwise not, and the unnamed prefix operator 23.
    pub fn is_unary(self) -> bool {
        matches!(self.0, 1 | 2 | 3 | 23)
    }
}

impl TryFrom<u8> for Operator {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Operator::new(id).ok_or_else(|| format!("operator id {id} out of range"))
    }
}

impl From<Operator> for u8 {
    fn from(op: Operator) -> u8 {
        op.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    /// Produced when the source runs dry at an instruction boundary.
    Invalid,
    /// List terminator. Consumed by the decoder, never stored in a list.
    End,
    Constant {
        data_type: DataType,
        value: i32,
    },
    Memory {
        data_type: DataType,
        address: i32,
    },
    /// `operands[1]` is the runtime index expression.
    MemoryIndexed {
        data_type: DataType,
        address: i32,
        operands: Box<[Instruction; 2]>,
    },
    /// Operands and operators in stack order, without the terminator.
    Expression(Vec<Instruction>),
    Parameter(u32),
    Keyword {
        keyword: KeywordType,
        children: Vec<Instruction>,
    },
    Control {
        control: ControlType,
        children: Vec<Instruction>,
    },
    Call {
        tag: u16,
        args: Vec<Instruction>,
    },
    Block(Vec<Instruction>),
    Variable(u8),
    Operator(Operator),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Offset of the opcode that produced this node. Diagnostics only.
    pub address: u64,
    pub node: Node,
}

impl Instruction {
    pub fn new(address: u64, node: Node) -> Self {
        Self { address, node }
    }

    pub fn kind(&self) -> InstructionKind {
        match &self.node {
            Node::Invalid => InstructionKind::Invalid,
            Node::End => InstructionKind::End,
            Node::Constant { .. } => InstructionKind::Constant,
            Node::Memory { .. } => InstructionKind::Memory,
            Node::MemoryIndexed { .. } => InstructionKind::MemoryIndexed,
            Node::Expression(_) => InstructionKind::Expression,
            Node::Parameter(_) => InstructionKind::Parameter,
            Node::Keyword { .. } => InstructionKind::Keyword,
            Node::Control { .. } => InstructionKind::Control,
            Node::Call { .. } => InstructionKind::Call,
            Node::Block(_) => InstructionKind::Block,
            Node::Variable(_) => InstructionKind::Variable,
            Node::Operator(_) => InstructionKind::Operator,
        }
    }

    /// The kind-dependent payload, as the VM's flat record would carry it.
    pub fn value(&self) -> i32 {
        match &self.node {
            Node::Invalid | Node::End | Node::Expression(_) | Node::Block(_) => 0,
            Node::Constant { value, .. } => *value,
            Node::Memory { address, .. } | Node::MemoryIndexed { address, .. } => *address,
            Node::Parameter(id) => *id as i32,
            Node::Keyword { keyword, .. } => keyword.code() as i32,
            Node::Control { control, .. } => control.tag() as i32,
            Node::Call { tag, .. } => *tag as i32,
            Node::Variable(id) => *id as i32,
            Node::Operator(op) => op.id() as i32,
        }
    }

    /// `Void` for every kind that carries no element type.
    pub fn data_type(&self) -> DataType {
        match &self.node {
            Node::Constant { data_type, .. }
            | Node::Memory { data_type, .. }
            | Node::MemoryIndexed { data_type, .. } => *data_type,
            _ => DataType::Void,
        }
    }

    pub fn children(&self) -> &[Instruction] {
        match &self.node {
            Node::MemoryIndexed { operands, .. } => operands.as_slice(),
            Node::Expression(children)
            | Node::Block(children)
            | Node::Keyword { children, .. }
            | Node::Control { children, .. }
            | Node::Call { args: children, .. } => children,
            _ => &[],
        }
    }

    /// True for `End` and for the end-of-input `Invalid` node; both close a
    /// sibling run.
    pub fn is_terminal(&self) -> bool {
        matches!(self.node, Node::End | Node::Invalid)
    }

    pub fn is_expression_end(&self) -> bool {
        matches!(self.node, Node::Operator(op) if op.is_terminator())
    }
}
