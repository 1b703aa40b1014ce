//! tickvm runtime - state controller programs for fixed-tick simulations
//!
//! This library provides:
//! - Tagged scalar values and their arithmetic
//! - The expression bytecode and its stack interpreter
//! - State controllers, control-flow blocks and callable functions
//! - Behavior programs and the per-tick executor
//! - The entity model and the directory trait the VM reaches it through
//! - Save-state files for entity variable stores

/// tickvm runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod bytecode;
pub mod controller;
pub mod entity;
pub mod executor;
pub mod program;
pub mod savestate;
pub mod value;
pub mod vm;
pub mod world;

pub use bytecode::{disassemble, Expression, Opcode, StringPool};
pub use controller::{ArgBlock, Controller};
pub use entity::{BlockMemory, Entity, EntityId, StateRequest};
pub use executor::{Abort, Executor, TickReport};
pub use program::{BehaviorProgram, Block, CallFunction, Function, ProgramLibrary};
pub use savestate::{SaveData, SaveKind, SaveStateError};
pub use value::{PowBitOrder, RuntimeError, Value};
pub use vm::VM;
pub use world::{Roster, World};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoke() {
        assert_eq!(VERSION, "0.1.0");
    }
}
