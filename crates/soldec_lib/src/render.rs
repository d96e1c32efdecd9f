//! Pseudo-C rendering of decoded instruction trees.
//!
//! The tree is never mutated: the indent level is threaded through the
//! calls by value, so a tree can be rendered any number of times.

use crate::error::SoldecError;
use crate::instruction::{ControlType, DataType, Instruction, InstructionKind, KeywordType, Node};

pub fn render(ins: &Instruction) -> Result<String, SoldecError> {
    render_at(ins, 0)
}

/// Render `ins` as if it started a line indented by `indent` tabs.
pub fn render_at(ins: &Instruction, indent: usize) -> Result<String, SoldecError> {
    render_node(ins, Level { indent, depth: 0 })
}

/// Trees nested deeper than this fail with `NestingTooDeep` instead of
/// exhausting the stack. Matches the decoder's bound.
const MAX_RENDER_DEPTH: usize = crate::decoder::MAX_NESTING;

#[derive(Debug, Clone, Copy)]
struct Level {
    indent: usize,
    depth: usize,
}

impl Level {
    fn with_indent(self, indent: usize) -> Self {
        Self { indent, ..self }
    }
}

fn render_node(ins: &Instruction, at: Level) -> Result<String, SoldecError> {
    if at.depth >= MAX_RENDER_DEPTH {
        return Err(SoldecError::NestingTooDeep {
            offset: ins.address,
            limit: MAX_RENDER_DEPTH,
        });
    }
    let at = Level {
        depth: at.depth + 1,
        ..at
    };

    let s = match &ins.node {
        Node::Invalid => "?".to_string(),
        Node::End => "}".to_string(),
        Node::Constant { value, .. } => value.to_string(),
        Node::Memory {
            data_type: DataType::Bool,
            address,
        } => format!("BIT(0x{:08X}, {})", address / 8, address % 8),
        Node::Memory { data_type, address } => format!("*(({data_type} *)0x{address:X})"),
        Node::MemoryIndexed {
            data_type: DataType::Bool,
            address,
            operands,
        } => format!(
            "BIT(0x{:08X}, {}, {})",
            address / 8,
            address % 8,
            render_node(&operands[1], at)?
        ),
        Node::MemoryIndexed {
            data_type,
            address,
            operands,
        } => format!(
            "(({data_type} *)0x{address:X})[{}]",
            render_node(&operands[1], at)?
        ),
        Node::Expression(children) => render_expression(children, at)?,
        Node::Parameter(0) => "r".to_string(),
        Node::Parameter(id) => format!("p{}", id - 1),
        Node::Keyword { keyword, children } => render_keyword(*keyword, children, at)?,
        Node::Control { control, children } => render_control(*control, children, at)?,
        Node::Call { tag, args } => format!("func_0x{tag:X}({})", render_params(args, at)?),
        Node::Block(children) => format!(
            "{{\n{}{}\n{}}}",
            tabs(at.indent + 1),
            render_statements(children, at, false)?,
            tabs(at.indent)
        ),
        Node::Variable(id) => format!("v{id}"),
        Node::Operator(op) => {
            if op.is_terminator() {
                return Err(SoldecError::structural(format!(
                    "expression terminator in rendered position at 0x{:X}",
                    ins.address
                )));
            }
            op.symbol().to_string()
        }
    };
    Ok(s)
}

fn tabs(n: usize) -> String {
    "\t".repeat(n)
}

fn child<'a>(children: &'a [Instruction], idx: usize, owner: &str) -> Result<&'a Instruction, SoldecError> {
    children
        .get(idx)
        .ok_or_else(|| SoldecError::structural(format!("{owner} has no child #{idx}")))
}

/// Replay the operand stack to rebuild infix text with minimal parentheses.
fn render_expression(children: &[Instruction], at: Level) -> Result<String, SoldecError> {
    fn pop(stack: &mut Vec<(String, u8)>) -> Result<(String, u8), SoldecError> {
        stack
            .pop()
            .ok_or_else(|| SoldecError::structural("operator without enough operands"))
    }

    fn wrap(text: String, prec: u8, op_prec: u8) -> String {
        if prec > op_prec { format!("({text})") } else { text }
    }

    let mut stack: Vec<(String, u8)> = Vec::with_capacity(8);
    for ins in children {
        match &ins.node {
            Node::Operator(op) if op.is_terminator() => break,
            Node::Operator(op) => {
                let op_prec = op.precedence();
                let (b, b_prec) = pop(&mut stack)?;
                let b = wrap(b, b_prec, op_prec);
                let text = if op.is_unary() {
                    format!("{}{b}", op.symbol())
                } else {
                    let (a, a_prec) = pop(&mut stack)?;
                    format!("{} {} {b}", wrap(a, a_prec, op_prec), op.symbol())
                };
                stack.push((text, op_prec));
            }
            // Grouping blocks around a single operand collapse to that operand.
            Node::Block(inner) if inner.len() == 1 => stack.push((render_node(&inner[0], at)?, 0)),
            _ => stack.push((render_node(ins, at)?, 0)),
        }
    }

    stack
        .pop()
        .map(|(text, _)| text)
        .ok_or_else(|| SoldecError::structural("empty expression"))
}

fn render_keyword(keyword: KeywordType, children: &[Instruction], at: Level) -> Result<String, SoldecError> {
    let s = match keyword {
        KeywordType::Case => format!(
            "case {}:\n{}break;",
            render_node(child(children, 0, "case")?, at)?,
            render_statements(children.get(1..).unwrap_or_default(), at, true)?
        ),
        KeywordType::Default => format!("default:\n{}break;", render_statements(children, at, true)?),
        KeywordType::Else => format!("else {}", render_node(child(children, 0, "else")?, at)?),
        KeywordType::ElseIf => format!(
            "else if ({}) {}",
            render_node(child(children, 0, "else if")?, at)?,
            render_node(child(children, 1, "else if")?, at)?
        ),
        KeywordType::Keyword6D => {
            return Err(SoldecError::structural("keyword 0x6D outside of a ctrl_0xB745 dispatch"));
        }
    };
    Ok(s)
}

fn render_control(control: ControlType, children: &[Instruction], at: Level) -> Result<String, SoldecError> {
    let s = match control {
        ControlType::If => format!(
            "if ({}) {}",
            render_node(child(children, 0, "if")?, at)?,
            render_statements(children.get(1..).unwrap_or_default(), at, true)?
        ),
        ControlType::Return => format!("return {};", render_node(child(children, 0, "return")?, at)?),
        ControlType::CtrlB745 => {
            let selector = match &child(children, 0, "ctrl")?.node {
                Node::Constant { value, .. } => format!("0x{value:X}"),
                _ => render_node(&children[0], at)?,
            };
            format!(
                "ctrl_0x{:X}[{selector}]({})",
                control.tag(),
                render_params(&children[1..], at)?
            )
        }
    };
    Ok(s)
}

fn render_params(args: &[Instruction], at: Level) -> Result<String, SoldecError> {
    let parts = args
        .iter()
        .map(|a| render_node(a, at))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(", "))
}

/// Render a statement list owned by a block, an `if`, or a `case` body.
///
/// `inline_owner` is set for control and keyword owners, whose children sit
/// at the owner's own level instead of one deeper.
fn render_statements(children: &[Instruction], at: Level, inline_owner: bool) -> Result<String, SoldecError> {
    let child_at = if inline_owner { at } else { at.with_indent(at.indent + 1) };
    let mut out = String::new();
    for (i, ins) in children.iter().enumerate() {
        let continues = matches!(&ins.node, Node::Keyword { keyword, .. } if keyword.continues_line());
        if continues {
            out.push(' ');
        } else if i > 0 {
            out.push('\n');
            out.push_str(&tabs(at.indent + 1));
        }

        out.push_str(&render_node(ins, child_at)?);
        if ins.kind() == InstructionKind::Expression {
            out.push(';');
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Operator;

    fn ins(node: Node) -> Instruction {
        Instruction::new(0, node)
    }

    fn param(n: u32) -> Instruction {
        ins(Node::Parameter(n))
    }

    fn var(n: u8) -> Instruction {
        ins(Node::Variable(n))
    }

    fn int(v: i32) -> Instruction {
        ins(Node::Constant {
            data_type: DataType::Int32,
            value: v,
        })
    }

    fn op(id: u8) -> Instruction {
        ins(Node::Operator(Operator::new(id).unwrap()))
    }

    fn expr(children: Vec<Instruction>) -> Instruction {
        ins(Node::Expression(children))
    }

    fn block(children: Vec<Instruction>) -> Instruction {
        ins(Node::Block(children))
    }

    fn text(i: &Instruction) -> String {
        render(i).unwrap()
    }

    #[test]
    fn leaves() {
        assert_eq!(text(&ins(Node::Invalid)), "?");
        assert_eq!(text(&ins(Node::End)), "}");
        assert_eq!(text(&int(-5)), "-5");
        assert_eq!(text(&param(0)), "r");
        assert_eq!(text(&param(1)), "p0");
        assert_eq!(text(&param(20)), "p19");
        assert_eq!(text(&var(3)), "v3");
        assert_eq!(text(&op(10)), ">>");
    }

    #[test]
    fn terminator_operator_is_not_renderable() {
        assert!(matches!(
            render(&ins(Node::Operator(Operator::TERMINATOR))),
            Err(SoldecError::StructuralViolation(_))
        ));
    }

    #[test]
    fn typed_memory() {
        let m = ins(Node::Memory {
            data_type: DataType::Int16,
            address: 0x0203_D902,
        });
        assert_eq!(text(&m), "*((int16_t *)0x203D902)");

        let m = ins(Node::MemoryIndexed {
            data_type: DataType::UInt8,
            address: 0x0203_E810,
            operands: Box::new([var(0), param(2)]),
        });
        assert_eq!(text(&m), "((uint8_t *)0x203E810)[p1]");
    }

    #[test]
    fn bit_memory_splits_byte_and_bit() {
        let m = ins(Node::Memory {
            data_type: DataType::Bool,
            address: 23,
        });
        assert_eq!(text(&m), "BIT(0x00000002, 7)");

        let m = ins(Node::MemoryIndexed {
            data_type: DataType::Bool,
            address: 23,
            operands: Box::new([var(0), var(4)]),
        });
        assert_eq!(text(&m), "BIT(0x00000002, 7, v4)");
    }

    #[test]
    fn precedence_needs_no_parens_when_inner_binds_tighter() {
        // p0 + p1 * p2
        let e = expr(vec![param(1), param(2), param(3), op(6), op(4)]);
        assert_eq!(text(&e), "p0 + p1 * p2");
    }

    #[test]
    fn precedence_adds_parens_when_inner_is_looser() {
        // (p0 + p1) * p2
        let e = expr(vec![param(1), param(2), op(4), param(3), op(6)]);
        assert_eq!(text(&e), "(p0 + p1) * p2");
        // p0 * (p1 - p2)
        let e = expr(vec![param(1), param(2), param(3), op(5), op(6)]);
        assert_eq!(text(&e), "p0 * (p1 - p2)");
    }

    #[test]
    fn equal_precedence_is_left_unparenthesized() {
        // p0 - p1 + p2 and p0 - (p1 + p2) render alike; only strictly looser operands are wrapped.
        let e = expr(vec![param(1), param(2), op(5), param(3), op(4)]);
        assert_eq!(text(&e), "p0 - p1 + p2");
        let e = expr(vec![param(1), param(2), param(3), op(4), op(5)]);
        assert_eq!(text(&e), "p0 - p1 + p2");
    }

    #[test]
    fn assignment_is_loosest() {
        let e = expr(vec![var(0), param(1), int(1), op(4), op(22)]);
        assert_eq!(text(&e), "v0 = p0 + 1");
    }

    #[test]
    fn unary_operators_take_one_operand() {
        for (id, sym) in [(1, "-"), (2, "!"), (3, "~"), (23, "")] {
            let e = expr(vec![var(9), var(8), param(1), op(id)]);
            assert_eq!(text(&e), format!("{sym}p0"));
        }
        // the remaining entries stay available to later operators
        let e = expr(vec![var(0), param(1), op(2), op(21)]);
        assert_eq!(text(&e), "v0 && !p0");
        let e = expr(vec![param(1), param(2), op(4), op(1)]);
        assert_eq!(text(&e), "-(p0 + p1)");
    }

    #[test]
    fn terminator_stops_replay() {
        let e = expr(vec![param(1), param(2), op(4), op(0), op(6)]);
        assert_eq!(text(&e), "p0 + p1");
    }

    #[test]
    fn malformed_expressions() {
        assert!(matches!(
            render(&expr(vec![param(1), op(4)])),
            Err(SoldecError::StructuralViolation(_))
        ));
        assert!(matches!(render(&expr(vec![])), Err(SoldecError::StructuralViolation(_))));
    }

    #[test]
    fn single_child_block_operand_collapses() {
        let call = ins(Node::Call {
            tag: 0x20,
            args: vec![],
        });
        let e = expr(vec![var(1), block(vec![call]), op(22)]);
        assert_eq!(text(&e), "v1 = func_0x20()");
    }

    #[test]
    fn calls() {
        let c = ins(Node::Call {
            tag: 0x1A2B,
            args: vec![int(1), expr(vec![param(1), int(2), op(7)]), var(0)],
        });
        assert_eq!(text(&c), "func_0x1A2B(1, p0 / 2, v0)");
    }

    #[test]
    fn block_indents_children() {
        let b = block(vec![
            expr(vec![var(0), int(1), op(22)]),
            ins(Node::Control {
                control: ControlType::Return,
                children: vec![expr(vec![var(0)])],
            }),
        ]);
        assert_eq!(text(&b), "{\n\tv0 = 1;\n\treturn v0;\n}");
    }

    #[test]
    fn empty_block() {
        assert_eq!(text(&block(vec![])), "{\n\t\n}");
    }

    fn if_else() -> Instruction {
        ins(Node::Control {
            control: ControlType::If,
            children: vec![
                expr(vec![param(1)]),
                block(vec![expr(vec![var(0), int(1), op(22)])]),
                ins(Node::Keyword {
                    keyword: KeywordType::Else,
                    children: vec![block(vec![expr(vec![var(0), int(2), op(22)])])],
                }),
            ],
        })
    }

    #[test]
    fn else_continues_the_line() {
        assert_eq!(text(&if_else()), "if (p0) {\n\tv0 = 1;\n} else {\n\tv0 = 2;\n}");
    }

    #[test]
    fn nested_if_follows_block_indent() {
        let b = block(vec![if_else()]);
        assert_eq!(
            text(&b),
            "{\n\tif (p0) {\n\t\tv0 = 1;\n\t} else {\n\t\tv0 = 2;\n\t}\n}"
        );
    }

    #[test]
    fn else_if_chain() {
        let i = ins(Node::Control {
            control: ControlType::If,
            children: vec![
                expr(vec![param(1)]),
                block(vec![]),
                ins(Node::Keyword {
                    keyword: KeywordType::ElseIf,
                    children: vec![expr(vec![param(2)]), block(vec![])],
                }),
            ],
        });
        assert_eq!(text(&i), "if (p0) {\n\t\n} else if (p1) {\n\t\n}");
    }

    #[test]
    fn ctrl_selector_as_hex() {
        let c = ins(Node::Control {
            control: ControlType::CtrlB745,
            children: vec![int(0x2F), int(1), var(2)],
        });
        assert_eq!(text(&c), "ctrl_0xB745[0x2F](1, v2)");

        let c = ins(Node::Control {
            control: ControlType::CtrlB745,
            children: vec![var(1)],
        });
        assert_eq!(text(&c), "ctrl_0xB745[v1]()");
    }

    #[test]
    fn case_and_default() {
        let case = ins(Node::Keyword {
            keyword: KeywordType::Case,
            children: vec![int(3), expr(vec![var(0), int(1), op(22)])],
        });
        assert_eq!(text(&case), "case 3:\nv0 = 1;break;");

        let default = ins(Node::Keyword {
            keyword: KeywordType::Default,
            children: vec![],
        });
        assert_eq!(text(&default), "default:\nbreak;");
    }

    #[test]
    fn missing_children_are_structural_errors() {
        let r = ins(Node::Control {
            control: ControlType::Return,
            children: vec![],
        });
        assert!(matches!(render(&r), Err(SoldecError::StructuralViolation(_))));

        let k = ins(Node::Keyword {
            keyword: KeywordType::Keyword6D,
            children: vec![int(1)],
        });
        assert!(matches!(render(&k), Err(SoldecError::StructuralViolation(_))));
    }

    #[test]
    fn block_argument_closes_on_its_own_line_level() {
        let call = ins(Node::Call {
            tag: 0x5,
            args: vec![block(vec![var(0), expr(vec![var(1), int(1), op(22)])]), int(2)],
        });
        let b = block(vec![expr(vec![call])]);
        assert_eq!(text(&b), "{\n\tfunc_0x5({\n\t\tv0\n\t\tv1 = 1;\n\t}, 2);\n}");
    }

    fn nested_blocks(levels: usize) -> Instruction {
        let mut b = block(vec![]);
        for _ in 1..levels {
            b = block(vec![b]);
        }
        b
    }

    #[test]
    fn nesting_bound() {
        assert!(render(&nested_blocks(MAX_RENDER_DEPTH)).is_ok());
        assert!(matches!(
            render(&nested_blocks(MAX_RENDER_DEPTH + 1)),
            Err(SoldecError::NestingTooDeep { limit: MAX_RENDER_DEPTH, .. })
        ));
    }

    #[test]
    fn rendering_is_repeatable() {
        let b = block(vec![if_else()]);
        assert_eq!(render_at(&b, 2).unwrap(), render_at(&b, 2).unwrap());
        assert!(render_at(&b, 2).unwrap().ends_with("\n\t\t}"));
    }
}
