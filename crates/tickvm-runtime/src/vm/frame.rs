//! Variable windows for programs and function calls
//!
//! All windows share one [`ValueStack`]. Each program run and each function
//! call allocates a fixed-size window on top of it and releases the window on
//! exit.
//!
//! ## Storage Layout Example
//!
//! ```text
//! State program (3 locals) called function "dist" (2 args, 1 local, 1 ret):
//!
//! [l0][l1][l2] | [a0][a1][l2][r0]
//!  ^              ^
//!  program base   dist base
//! ```
//!
//! Local slot access is window-relative: slot 1 in `dist` is `storage[base + 1]`.

use super::stack::ValueStack;
use crate::value::{RuntimeError, Value};

/// Stack of variable windows over shared storage
#[derive(Debug, Clone, Default)]
pub struct VarWindows {
    storage: ValueStack,
    /// Start index of each open window; the last entry is the current one.
    bases: Vec<usize>,
}

impl VarWindows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a window of `size` `None` slots.
    pub fn push(&mut self, size: usize) {
        self.bases.push(self.storage.len());
        self.storage.allocate(size);
    }

    /// Releases the current window.
    pub fn pop(&mut self) {
        if let Some(base) = self.bases.pop() {
            self.storage.truncate(base);
        }
    }

    /// Number of open windows.
    pub fn depth(&self) -> usize {
        self.bases.len()
    }

    pub fn current(&self) -> &[Value] {
        match self.bases.last() {
            Some(&base) => &self.storage.as_slice()[base..],
            None => &[],
        }
    }

    pub fn current_mut(&mut self) -> &mut [Value] {
        match self.bases.last() {
            Some(&base) => &mut self.storage.as_mut_slice()[base..],
            None => &mut [],
        }
    }

    pub fn get(&self, slot: usize) -> Result<Value, RuntimeError> {
        let window = self.current();
        window
            .get(slot)
            .copied()
            .ok_or(RuntimeError::LocalSlotOutOfRange {
                slot,
                len: window.len(),
            })
    }

    pub fn set(&mut self, slot: usize, value: Value) -> Result<(), RuntimeError> {
        let window = self.current_mut();
        let len = window.len();
        match window.get_mut(slot) {
            Some(v) => {
                *v = value;
                Ok(())
            }
            None => Err(RuntimeError::LocalSlotOutOfRange { slot, len }),
        }
    }

    /// Writes into the window below the current one.
    pub fn set_in_caller(&mut self, slot: usize, value: Value) -> Result<(), RuntimeError> {
        let &[.., caller, callee] = self.bases.as_slice() else {
            return Err(RuntimeError::NoActiveWindow);
        };
        let len = callee - caller;
        if slot >= len {
            return Err(RuntimeError::LocalSlotOutOfRange { slot, len });
        }
        self.storage.as_mut_slice()[caller + slot] = value;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.storage.clear();
        self.bases.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_windows_are_isolated() {
        let mut windows = VarWindows::new();
        windows.push(2);
        windows.set(0, Value::int(1)).unwrap();

        windows.push(1);
        assert_eq!(windows.get(0).unwrap(), Value::None);
        windows.set(0, Value::int(5)).unwrap();
        windows.pop();

        assert_eq!(windows.get(0).unwrap(), Value::int(1));
        assert_eq!(windows.depth(), 1);
    }

    #[test]
    fn test_out_of_window_access_is_fatal() {
        let mut windows = VarWindows::new();
        windows.push(2);
        assert_eq!(
            windows.get(2),
            Err(RuntimeError::LocalSlotOutOfRange { slot: 2, len: 2 })
        );
        assert!(windows.set(7, Value::int(0)).is_err());
    }

    #[test]
    fn test_set_in_caller() {
        let mut windows = VarWindows::new();
        windows.push(3);
        windows.push(2);
        windows.set_in_caller(2, Value::Float(1.5)).unwrap();
        assert!(windows.set_in_caller(3, Value::None).is_err());
        windows.pop();
        assert_eq!(windows.current(), &[Value::None, Value::None, Value::Float(1.5)]);
    }

    #[test]
    fn test_set_in_caller_needs_two_windows() {
        let mut windows = VarWindows::new();
        windows.push(1);
        assert_eq!(
            windows.set_in_caller(0, Value::None),
            Err(RuntimeError::NoActiveWindow)
        );
    }
}
