//! Operand stack
//!
//! The only data channel between opcodes. The same type backs the variable
//! window storage in [`super::frame`].

use crate::value::{RuntimeError, Value};

/// Growable stack of tagged values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueStack {
    values: Vec<Value>,
}

impl ValueStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    #[inline]
    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Last value, for in-place folding of a right operand into the left.
    #[inline]
    pub fn top_mut(&mut self) -> Result<&mut Value, RuntimeError> {
        self.values.last_mut().ok_or(RuntimeError::StackUnderflow)
    }

    #[inline]
    pub fn top(&self) -> Result<Value, RuntimeError> {
        self.values.last().copied().ok_or(RuntimeError::StackUnderflow)
    }

    pub fn dup(&mut self) -> Result<(), RuntimeError> {
        let top = self.top()?;
        self.values.push(top);
        Ok(())
    }

    pub fn swap(&mut self) -> Result<(), RuntimeError> {
        let len = self.values.len();
        if len < 2 {
            return Err(RuntimeError::StackUnderflow);
        }
        self.values.swap(len - 1, len - 2);
        Ok(())
    }

    /// Grows the stack by `n` `None` slots and returns them.
    pub fn allocate(&mut self, n: usize) -> &mut [Value] {
        let start = self.values.len();
        self.values.resize(start + n, Value::None);
        &mut self.values[start..]
    }

    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [Value] {
        &mut self.values
    }
}
