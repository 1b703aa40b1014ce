//! Expression virtual machine
//!
//! [`VM`] is the per-simulation execution context: the shared operand stack,
//! the variable windows of the running program and its function calls, and
//! the one-shot loop signal raised by `break`/`continue` controllers. It is
//! threaded explicitly through every controller, block and function call.
//!
//! - Each top-level program run starts and ends with an empty operand stack
//! - Windows are opened through [`VM::with_window`], which always closes them
//! - The "current entity" of an expression is a local of [`VM::eval`], never
//!   VM state

mod eval;
mod frame;
mod profiler;
mod stack;

pub use frame::VarWindows;
pub use profiler::Profiler;
pub use stack::ValueStack;

use crate::bytecode::StringPool;
use crate::value::{PowBitOrder, RuntimeError, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tickvm_config::VmConfig;

/// One-shot signal consumed by the nearest enclosing loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSignal {
    Break,
    Continue,
}

/// Virtual machine state
#[derive(Debug)]
pub struct VM {
    /// Operand stack
    stack: ValueStack,
    /// Local variable windows
    windows: VarWindows,
    loop_signal: Option<LoopSignal>,
    /// Strings of the library currently running
    strings: Arc<StringPool>,
    pow_order: PowBitOrder,
    max_loop_iterations: u32,
    save_dir: PathBuf,
    profiler: Option<Profiler>,
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

impl VM {
    pub fn new() -> Self {
        Self {
            stack: ValueStack::with_capacity(tickvm_config::DEFAULT_STACK_CAPACITY),
            windows: VarWindows::new(),
            loop_signal: None,
            strings: Arc::new(StringPool::new()),
            pow_order: PowBitOrder::Current,
            max_loop_iterations: tickvm_config::DEFAULT_MAX_LOOP_ITERATIONS,
            save_dir: PathBuf::from("saves"),
            profiler: None,
        }
    }

    pub fn from_config(config: &VmConfig) -> Self {
        Self {
            stack: ValueStack::with_capacity(config.stack_capacity()),
            max_loop_iterations: config.max_loop_iterations(),
            save_dir: config.save_dir(),
            ..Self::new()
        }
    }

    /// Create a VM that counts executed opcodes
    pub fn with_profiling() -> Self {
        let mut vm = Self::new();
        vm.enable_profiling();
        vm
    }

    /// Starts counting executed opcodes, keeping every other setting.
    pub fn enable_profiling(&mut self) {
        self.profiler = Some(Profiler::enabled());
    }

    /// Binds the string pool and pow order of the library about to run.
    pub fn bind_library(&mut self, strings: Arc<StringPool>, pow_order: PowBitOrder) {
        self.strings = strings;
        self.pow_order = pow_order;
    }

    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    pub fn pow_order(&self) -> PowBitOrder {
        self.pow_order
    }

    pub fn set_pow_order(&mut self, order: PowBitOrder) {
        self.pow_order = order;
    }

    pub fn max_loop_iterations(&self) -> u32 {
        self.max_loop_iterations
    }

    pub fn set_max_loop_iterations(&mut self, limit: u32) {
        self.max_loop_iterations = limit;
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn set_save_dir(&mut self, dir: impl Into<PathBuf>) {
        self.save_dir = dir.into();
    }

    pub fn profiler(&self) -> Option<&Profiler> {
        self.profiler.as_ref()
    }

    // ===== Operand stack =====

    pub fn stack(&self) -> &ValueStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut ValueStack {
        &mut self.stack
    }

    /// Fails with a stack dump unless the operand stack is empty.
    pub fn check_stack_balance(&self, state: i32) -> Result<(), RuntimeError> {
        if self.stack.is_empty() {
            Ok(())
        } else {
            Err(RuntimeError::StackImbalance {
                state,
                dump: self.stack.as_slice().to_vec(),
            })
        }
    }

    // ===== Variable windows =====

    pub fn windows(&self) -> &VarWindows {
        &self.windows
    }

    pub fn local(&self, slot: usize) -> Result<Value, RuntimeError> {
        self.windows.get(slot)
    }

    pub fn set_local(&mut self, slot: usize, value: Value) -> Result<(), RuntimeError> {
        self.windows.set(slot, value)
    }

    /// Writes a return value into the caller's window.
    pub fn set_caller_local(&mut self, slot: usize, value: Value) -> Result<(), RuntimeError> {
        self.windows.set_in_caller(slot, value)
    }

    /// Runs `f` inside a fresh window of `size` slots.
    ///
    /// The window is released however `f` exits.
    pub fn with_window<T>(
        &mut self,
        size: usize,
        f: impl FnOnce(&mut VM) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        self.windows.push(size);
        let result = f(self);
        self.windows.pop();
        result
    }

    // ===== Loop signals =====

    pub fn raise(&mut self, signal: LoopSignal) {
        self.loop_signal = Some(signal);
    }

    pub fn take_signal(&mut self) -> Option<LoopSignal> {
        self.loop_signal.take()
    }

    pub fn pending_signal(&self) -> Option<LoopSignal> {
        self.loop_signal
    }

    /// Drops all scratch state after a fatal error.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.windows.clear();
        self.loop_signal = None;
    }
}
