//! Compiled expression programs
//!
//! An [`Expression`] is an immutable byte sequence of opcodes with inline
//! little-endian operands. The emitter methods here are what a compiler (or a
//! test) uses to assemble one; the interpreter in [`crate::vm`] runs it.
//!
//! Strings referenced by bytecode (map keys, named constants, print templates)
//! live in a [`StringPool`] shared by every program of one library and are
//! addressed by `i32` index.

pub mod disasm;
mod opcode;

pub use disasm::disassemble;
pub use opcode::{ConstOp, ExtOp, Opcode, Operand, StoreOp};

use crate::value::{RuntimeError, Value};
use std::borrow::Cow;
use std::collections::HashMap;

/// Expression bytecode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expression {
    code: Vec<u8>,
}

impl Expression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps bytes produced elsewhere. No validation is done.
    pub fn from_bytes(code: Vec<u8>) -> Self {
        Self { code }
    }

    /// Expression pushing one integer literal
    pub fn int(v: i32) -> Self {
        let mut e = Self::new();
        e.push_value(Value::int(v));
        e
    }

    /// Expression pushing one float literal
    pub fn float(v: f32) -> Self {
        let mut e = Self::new();
        e.push_value(Value::Float(v));
        e
    }

    /// Raw text argument; controllers read these bytes as a string instead of running them.
    pub fn text(s: &str) -> Self {
        Self {
            code: s.as_bytes().to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.code
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.code)
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Offset the next emitted byte will land at
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    pub fn emit(&mut self, opcode: Opcode) -> &mut Self {
        self.code.push(opcode as u8);
        self
    }

    pub fn emit_u8(&mut self, byte: u8) -> &mut Self {
        self.code.push(byte);
        self
    }

    pub fn emit_i8(&mut self, value: i8) -> &mut Self {
        self.code.push(value as u8);
        self
    }

    pub fn emit_i32(&mut self, value: i32) -> &mut Self {
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn emit_i64(&mut self, value: i64) -> &mut Self {
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn emit_f32(&mut self, value: f32) -> &mut Self {
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn emit_const(&mut self, op: ConstOp) -> &mut Self {
        self.emit(Opcode::ConstPage).emit_u8(op as u8)
    }

    pub fn emit_store(&mut self, op: StoreOp) -> &mut Self {
        self.emit(Opcode::StorePage).emit_u8(op as u8)
    }

    pub fn emit_ext(&mut self, op: ExtOp) -> &mut Self {
        self.emit(Opcode::ExtPage).emit_u8(op as u8)
    }

    /// Appends the shortest literal push for `value`.
    ///
    /// Returns false for `None` and `SentinelFalse`, which have no literal form.
    pub fn push_value(&mut self, value: Value) -> bool {
        match value {
            Value::Int(i) => {
                if let Ok(small) = i8::try_from(i) {
                    self.emit(Opcode::Int8).emit_i8(small);
                } else if let Ok(word) = i32::try_from(i) {
                    self.emit(Opcode::Int).emit_i32(word);
                } else {
                    self.emit(Opcode::Int64).emit_i64(i);
                }
                true
            }
            Value::Bool(b) => {
                self.emit(Opcode::Int8).emit_i8(b as i8);
                true
            }
            Value::Float(f) => {
                self.emit(Opcode::Float).emit_f32(f);
                true
            }
            Value::None | Value::SentinelFalse => false,
        }
    }

    /// Appends the bytes of another expression inline.
    pub fn append(&mut self, other: &Expression) -> &mut Self {
        self.code.extend_from_slice(&other.code);
        self
    }

    /// Nested run on the current (possibly redirected) entity
    pub fn emit_run(&mut self, body: &Expression) -> &mut Self {
        self.emit(Opcode::Run)
            .emit_i32(body.len() as i32)
            .append(body)
    }

    /// Nested run on the calling entity, ignoring any active redirect
    pub fn emit_unredirected_run(&mut self, body: &Expression) -> &mut Self {
        self.emit(Opcode::UnredirectedRun)
            .emit_i32(body.len() as i32)
            .append(body)
    }

    /// Redirect followed by a nested run of `body` on the resolved entity.
    ///
    /// Selector arguments, if the redirect takes one, must already be emitted.
    /// When the target cannot be resolved the nested run is skipped and
    /// sentinel-false stands in for its result.
    pub fn emit_redirect(&mut self, redirect: Opcode, body: &Expression) -> &mut Self {
        let skip = 1 + 4 + body.len() as i32;
        self.emit(redirect).emit_i32(skip).emit_run(body)
    }

    /// Redirect bound to the single read in `read`, inlined without a nested run.
    ///
    /// The read keeps the caller as origin, so positional reads scale into
    /// the caller's coordinates. Failure skips the read and leaves
    /// sentinel-false.
    pub fn emit_redirect_inline(&mut self, redirect: Opcode, read: &Expression) -> &mut Self {
        self.emit(redirect).emit_i32(read.len() as i32).append(read)
    }

    /// Emits a 32-bit jump with a placeholder and returns the operand offset.
    pub fn emit_jump(&mut self, opcode: Opcode) -> usize {
        self.emit(opcode);
        let at = self.current_offset();
        self.emit_i32(0);
        at
    }

    /// Points a 32-bit jump emitted by [`Expression::emit_jump`] at the current end.
    pub fn patch_jump(&mut self, at: usize) {
        let jump = (self.code.len() - (at + 4)) as i32;
        self.code[at..at + 4].copy_from_slice(&jump.to_le_bytes());
    }

    /// Emits an 8-bit forward jump with a placeholder and returns the operand offset.
    pub fn emit_short_jump(&mut self, opcode: Opcode) -> usize {
        self.emit(opcode);
        let at = self.current_offset();
        self.emit_u8(0);
        at
    }

    /// Points an 8-bit jump at the current end. Returns false if it is out of reach.
    pub fn patch_short_jump(&mut self, at: usize) -> bool {
        match u8::try_from(self.code.len() - (at + 1)) {
            Ok(jump) if jump > 0 => {
                self.code[at] = jump;
                true
            }
            _ => false,
        }
    }
}

impl AsRef<[u8]> for Expression {
    fn as_ref(&self) -> &[u8] {
        &self.code
    }
}

// ===== Operand decoding =====

fn operand<const N: usize>(code: &[u8], at: usize) -> Result<[u8; N], RuntimeError> {
    code.get(at..at + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(RuntimeError::TruncatedOperand { offset: at })
}

pub fn read_u8(code: &[u8], at: usize) -> Result<u8, RuntimeError> {
    code.get(at)
        .copied()
        .ok_or(RuntimeError::TruncatedOperand { offset: at })
}

pub fn read_i8(code: &[u8], at: usize) -> Result<i8, RuntimeError> {
    Ok(read_u8(code, at)? as i8)
}

pub fn read_i32(code: &[u8], at: usize) -> Result<i32, RuntimeError> {
    operand::<4>(code, at).map(i32::from_le_bytes)
}

pub fn read_i64(code: &[u8], at: usize) -> Result<i64, RuntimeError> {
    operand::<8>(code, at).map(i64::from_le_bytes)
}

pub fn read_f32(code: &[u8], at: usize) -> Result<f32, RuntimeError> {
    operand::<4>(code, at).map(f32::from_le_bytes)
}

/// Reads an i32 length prefix at `at` and returns the nested bytes plus the
/// offset just past them.
pub fn read_nested(code: &[u8], at: usize) -> Result<(&[u8], usize), RuntimeError> {
    let len = read_i32(code, at)?;
    let start = at + 4;
    let end = usize::try_from(len)
        .ok()
        .map(|len| start + len)
        .filter(|&end| end <= code.len())
        .ok_or(RuntimeError::TruncatedOperand { offset: at })?;
    Ok((&code[start..end], end))
}

/// Interned strings addressed by bytecode
#[derive(Debug, Clone, Default)]
pub struct StringPool {
    strings: Vec<String>,
    index: HashMap<String, i32>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `s`, adding it if needed.
    pub fn intern(&mut self, s: &str) -> i32 {
        if let Some(&i) = self.index.get(s) {
            return i;
        }
        let i = self.strings.len() as i32;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), i);
        i
    }

    pub fn get(&self, index: i32) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.strings.get(i))
            .map(String::as_str)
    }

    pub fn resolve(&self, index: i32) -> Result<&str, RuntimeError> {
        self.get(index)
            .ok_or(RuntimeError::StringIndexOutOfRange { index })
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::small(Value::int(-5), vec![0x01, 0xFB])]
    #[case::word(Value::int(300), vec![0x02, 0x2C, 0x01, 0x00, 0x00])]
    #[case::wide(Value::int64(1 << 40), vec![0x03, 0, 0, 0, 0, 0, 1, 0, 0])]
    #[case::bool(Value::Bool(true), vec![0x01, 0x01])]
    #[case::float(Value::Float(1.0), vec![0x04, 0x00, 0x00, 0x80, 0x3F])]
    fn test_push_value_encoding(#[case] value: Value, #[case] bytes: Vec<u8>) {
        let mut e = Expression::new();
        assert!(e.push_value(value));
        assert_eq!(e.as_bytes(), bytes.as_slice());
    }

    #[test]
    fn test_sentinel_has_no_literal() {
        let mut e = Expression::new();
        assert!(!e.push_value(Value::SentinelFalse));
        assert!(e.is_empty());
    }

    #[test]
    fn test_redirect_layout() {
        let body = Expression::from_bytes(vec![Opcode::Life as u8]);
        let mut e = Expression::new();
        e.emit_redirect(Opcode::Parent, &body);

        assert_eq!(
            e.as_bytes(),
            &[
                Opcode::Parent as u8,
                6,
                0,
                0,
                0,
                Opcode::Run as u8,
                1,
                0,
                0,
                0,
                Opcode::Life as u8
            ]
        );
    }

    #[test]
    fn test_inline_redirect_layout() {
        let read = Expression::from_bytes(vec![Opcode::PosX as u8]);
        let mut e = Expression::new();
        e.emit_redirect_inline(Opcode::Parent, &read);

        assert_eq!(
            e.as_bytes(),
            &[Opcode::Parent as u8, 1, 0, 0, 0, Opcode::PosX as u8]
        );
    }

    #[test]
    fn test_patch_jumps() {
        let mut e = Expression::new();
        let long = e.emit_jump(Opcode::Jump);
        let short = e.emit_short_jump(Opcode::JumpIfZero8);
        e.emit(Opcode::Pop);
        assert!(e.patch_short_jump(short));
        e.patch_jump(long);

        assert_eq!(read_i32(e.as_bytes(), long).unwrap(), 3);
        assert_eq!(read_u8(e.as_bytes(), short).unwrap(), 1);
    }

    #[test]
    fn test_short_jump_out_of_reach() {
        let mut e = Expression::new();
        let at = e.emit_short_jump(Opcode::Jump8);
        for _ in 0..300 {
            e.emit(Opcode::Dup);
        }
        assert!(!e.patch_short_jump(at));
    }

    #[test]
    fn test_readers_report_truncation() {
        let code = [0x01, 0x02];
        assert_eq!(
            read_i32(&code, 0),
            Err(RuntimeError::TruncatedOperand { offset: 0 })
        );
        assert_eq!(read_u8(&code, 1).unwrap(), 0x02);
        assert!(read_nested(&[5, 0, 0, 0, 1], 0).is_err());
    }

    #[test]
    fn test_read_nested() {
        let code = [2, 0, 0, 0, 0xAA, 0xBB, 0xCC];
        let (body, next) = read_nested(&code, 0).unwrap();
        assert_eq!(body, &[0xAA, 0xBB]);
        assert_eq!(next, 6);
    }

    #[test]
    fn test_string_pool_interns() {
        let mut pool = StringPool::new();
        let a = pool.intern("combo");
        let b = pool.intern("score");
        assert_eq!(pool.intern("combo"), a);
        assert_eq!(pool.get(b), Some("score"));
        assert_eq!(pool.get(-1), None);
        assert_eq!(
            pool.resolve(9),
            Err(RuntimeError::StringIndexOutOfRange { index: 9 })
        );
    }
}
