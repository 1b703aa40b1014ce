//! Expression disassembler
//!
//! Converts expression bytecode back to one instruction per line. Used by
//! tests and `tickvm disasm`.

use super::{read_f32, read_i32, read_i64, read_i8, read_u8, ConstOp, ExtOp, Opcode, Operand, StoreOp};

/// Disassemble expression bytecode
///
/// # Format
/// ```text
/// 0000  Parent -> 0011
/// 0005  Run 1
///   0000  Life
/// ```
///
/// Nested runs are listed indented with offsets relative to their own start.
pub fn disassemble(code: &[u8]) -> String {
    let mut output = String::new();
    disassemble_into(&mut output, code, 0);
    output
}

fn disassemble_into(output: &mut String, code: &[u8], depth: usize) {
    let indent = "  ".repeat(depth);
    let mut offset = 0;
    while offset < code.len() {
        let start = offset;
        let line = disassemble_instruction(code, &mut offset);
        output.push_str(&format!("{}{:04}  {}\n", indent, start, line.text));
        if let Some(nested) = line.nested {
            disassemble_into(output, nested, depth + 1);
        }
    }
}

struct Line<'a> {
    text: String,
    nested: Option<&'a [u8]>,
}

impl Line<'_> {
    fn plain(text: String) -> Self {
        Self { text, nested: None }
    }
}

/// Disassemble a single instruction at the given offset
///
/// Advances offset past the instruction and its operands. Truncated or
/// unknown input stops the listing.
fn disassemble_instruction<'a>(code: &'a [u8], offset: &mut usize) -> Line<'a> {
    let byte = code[*offset];
    *offset += 1;

    let opcode = match Opcode::try_from(byte) {
        Ok(op) => op,
        Err(_) => {
            *offset = code.len();
            return Line::plain(format!("<invalid opcode: {:#04x}>", byte));
        }
    };

    let at = *offset;
    let text = match opcode.operand() {
        Operand::None => Some(format!("{:?}", opcode)),
        Operand::U8 => read_u8(code, at).map(|v| format!("{:?} {}", opcode, v)).ok(),
        Operand::I8 => read_i8(code, at).map(|v| format!("{:?} {}", opcode, v)).ok(),
        Operand::I32 => read_i32(code, at).map(|v| format!("{:?} {}", opcode, v)).ok(),
        Operand::I64 => read_i64(code, at).map(|v| format!("{:?} {}", opcode, v)).ok(),
        Operand::F32 => read_f32(code, at).map(|v| format!("{:?} {:?}", opcode, v)).ok(),
        Operand::Jump8 => read_u8(code, at)
            .map(|v| match v {
                0 => format!("{:?} -> end", opcode),
                v => format!("{:?} -> {:04}", opcode, at + 1 + v as usize),
            })
            .ok(),
        Operand::Jump32 => read_i32(code, at)
            .map(|v| format!("{:?} -> {:04}", opcode, (at + 4) as i64 + v as i64))
            .ok(),
        Operand::Nested => {
            return match super::read_nested(code, at) {
                Ok((body, next)) => {
                    *offset = next;
                    Line {
                        text: format!("{:?} {}", opcode, body.len()),
                        nested: Some(body),
                    }
                }
                Err(_) => {
                    *offset = code.len();
                    Line::plain(format!("{:?} <truncated>", opcode))
                }
            };
        }
        Operand::Page => page_text(opcode, code, offset),
    }
    .unwrap_or_else(|| format!("{:?} <truncated>", opcode));

    if !matches!(opcode.operand(), Operand::Page) {
        *offset = (at + opcode.operand().width()).min(code.len());
    }
    Line::plain(text)
}

fn page_text(opcode: Opcode, code: &[u8], offset: &mut usize) -> Option<String> {
    let sub = read_u8(code, *offset).ok()?;
    *offset += 1;
    let (name, operand) = match opcode {
        Opcode::ConstPage => ConstOp::try_from(sub)
            .ok()
            .map(|op| (format!("{:?}", op), op.operand())),
        Opcode::StorePage => StoreOp::try_from(sub)
            .ok()
            .map(|op| (format!("{:?}", op), op.operand())),
        _ => ExtOp::try_from(sub)
            .ok()
            .map(|op| (format!("{:?}", op), op.operand())),
    }
    .unwrap_or_else(|| (format!("<invalid {:#04x}>", sub), Operand::None));

    match operand {
        Operand::I32 => {
            let v = read_i32(code, *offset).ok()?;
            *offset += 4;
            Some(format!("{:?}.{} {}", opcode, name, v))
        }
        _ => Some(format!("{:?}.{}", opcode, name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Expression;

    #[test]
    fn test_disassemble_redirect() {
        let mut body = Expression::new();
        body.emit(Opcode::Life);
        let mut e = Expression::new();
        e.push_value(crate::value::Value::int(2));
        e.emit(Opcode::Mul);
        e.emit_redirect(Opcode::Parent, &body);
        e.emit_ext(ExtOp::Max);
        e.emit_store(StoreOp::MapSet).emit_i32(4);

        insta::assert_snapshot!(disassemble(e.as_bytes()).trim_end(), @r"
        0000  Int8 2
        0002  Mul
        0003  Parent -> 0014
        0008  Run 1
          0000  Life
        0014  ExtPage.Max
        0016  StorePage.MapSet 4
        ");
    }

    #[test]
    fn test_disassemble_invalid_opcode() {
        let text = disassemble(&[0x00, 0x01]);
        assert_eq!(text, "0000  <invalid opcode: 0x00>\n");
    }

    #[test]
    fn test_disassemble_short_jump_to_end() {
        let text = disassemble(&[Opcode::Jump8 as u8, 0]);
        assert_eq!(text, "0000  Jump8 -> end\n");
    }
}
