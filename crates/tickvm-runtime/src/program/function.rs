//! Callable routines
//!
//! A call evaluates its argument expressions onto the operand stack, opens a
//! fresh variable window and moves the arguments into its leading slots.
//! Return values live in the slots right after the arguments and are copied
//! into the caller's window when the routine finishes without changing state.

use crate::bytecode::Expression;
use crate::controller::Controller;
use crate::entity::{BlockMemory, EntityId};
use crate::value::RuntimeError;
use crate::vm::VM;
use crate::world::World;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct Function {
    pub name: String,
    /// Declared locals, arguments and returns included
    pub num_vars: usize,
    pub num_args: usize,
    pub num_rets: usize,
    pub controllers: Vec<Controller>,
    pub persistence_slots: usize,
    pub toggle_slots: usize,
}

impl Function {
    pub fn new(name: impl Into<String>, num_args: usize, num_rets: usize) -> Self {
        Self {
            name: name.into(),
            num_args,
            num_rets,
            num_vars: num_args + num_rets,
            ..Self::default()
        }
    }

    pub fn with_locals(mut self, num_vars: usize) -> Self {
        self.num_vars = num_vars;
        self
    }

    pub fn with_controllers(mut self, controllers: Vec<Controller>) -> Self {
        self.controllers = controllers;
        self
    }

    pub fn with_slots(mut self, persistence_slots: usize, toggle_slots: usize) -> Self {
        self.persistence_slots = persistence_slots;
        self.toggle_slots = toggle_slots;
        self
    }

    fn window_size(&self) -> usize {
        self.num_vars.max(self.num_args + self.num_rets)
    }

    /// Runs the routine with its arguments already on the operand stack.
    ///
    /// `rets` names the caller's slots receiving the return values; it is
    /// either empty or exactly `num_rets` long. Returns true on a state change.
    pub fn call(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        entity: EntityId,
        rets: &[u8],
    ) -> Result<bool, RuntimeError> {
        let found = vm.stack().len();
        if found != self.num_args {
            return Err(RuntimeError::ArgumentCountMismatch {
                function: self.name.clone(),
                expected: self.num_args,
                found,
            });
        }
        if !rets.is_empty() && rets.len() != self.num_rets {
            return Err(RuntimeError::ReturnCountMismatch {
                function: self.name.clone(),
                expected: self.num_rets,
                found: rets.len(),
            });
        }

        vm.with_window(self.window_size(), |vm| {
            for slot in (0..self.num_args).rev() {
                let v = vm.stack_mut().pop()?;
                vm.set_local(slot, v)?;
            }
            vm.stack_mut().clear();

            let mut memory = BlockMemory::sized(self.persistence_slots, self.toggle_slots);
            for c in &self.controllers {
                if !c.is_block() && world.get(entity)?.is_paused() {
                    continue;
                }
                if c.run(vm, world, entity, &mut memory)? {
                    trace!(function = %self.name, "state changed inside call");
                    return Ok(true);
                }
            }

            for (i, &slot) in rets.iter().enumerate() {
                let v = vm.local(self.num_args + i)?;
                vm.set_caller_local(slot as usize, v)?;
            }
            Ok(false)
        })
    }
}

/// Call site of a [`Function`]
#[derive(Debug, Clone)]
pub struct CallFunction {
    pub function: Arc<Function>,
    pub args: Vec<Expression>,
    /// Caller slots bound to the return values
    pub rets: Vec<u8>,
}

impl CallFunction {
    pub fn new(function: Arc<Function>, args: Vec<Expression>, rets: Vec<u8>) -> Self {
        Self {
            function,
            args,
            rets,
        }
    }

    pub fn run(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        entity: EntityId,
    ) -> Result<bool, RuntimeError> {
        for arg in &self.args {
            let v = vm.eval(world, arg.as_bytes(), entity)?;
            vm.stack_mut().push(v);
        }
        self.function.call(vm, world, entity, &self.rets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Opcode;
    use crate::controller::{tags, ArgBlock};
    use crate::program::Block;
    use crate::value::Value;
    use crate::world::Roster;
    use pretty_assertions::assert_eq;

    fn local(slot: u8) -> Expression {
        let mut e = Expression::new();
        e.emit(Opcode::LocalVar).emit_u8(slot);
        e
    }

    /// `fn sum(a, b) -> (s) { s = a + b }`
    fn sum() -> Arc<Function> {
        let mut add = local(0);
        add.append(&local(1)).emit(Opcode::Add);
        Arc::new(
            Function::new("sum", 2, 1)
                .with_controllers(vec![Controller::Assign { slot: 2, value: add }]),
        )
    }

    #[test]
    fn test_call_binds_returns_in_caller() {
        let mut roster = Roster::with_seed(0);
        let p1 = roster.add_player(1, "kfm");
        let mut vm = VM::new();
        let call = CallFunction::new(sum(), vec![Expression::int(3), Expression::int(4)], vec![1]);

        let (changed, v) = vm
            .with_window(2, |vm| {
                let changed = call.run(vm, &mut roster, p1)?;
                Ok((changed, vm.local(1)?))
            })
            .unwrap();
        assert!(!changed);
        assert_eq!(v, Value::int(7));
        assert!(vm.stack().is_empty());
        assert_eq!(vm.windows().depth(), 0);
    }

    #[test]
    fn test_argument_count_is_checked() {
        let mut roster = Roster::with_seed(0);
        let p1 = roster.add_player(1, "kfm");
        let mut vm = VM::new();
        let call = CallFunction::new(sum(), vec![Expression::int(3)], vec![]);
        let err = vm
            .with_window(1, |vm| call.run(vm, &mut roster, p1))
            .unwrap_err();
        assert_eq!(
            err,
            RuntimeError::ArgumentCountMismatch {
                function: "sum".to_string(),
                expected: 2,
                found: 1,
            }
        );
    }

    #[test]
    fn test_return_count_is_checked() {
        let mut roster = Roster::with_seed(0);
        let p1 = roster.add_player(1, "kfm");
        let call = CallFunction::new(
            sum(),
            vec![Expression::int(1), Expression::int(2)],
            vec![0, 1],
        );
        let err = VM::new()
            .with_window(2, |vm| call.run(vm, &mut roster, p1))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ReturnCountMismatch { expected: 1, found: 2, .. }));
    }

    #[test]
    fn test_state_change_skips_returns_and_closes_window() {
        let mut roster = Roster::with_seed(0);
        let p1 = roster.add_player(1, "kfm");
        let change = Controller::ChangeState(
            ArgBlock::new().with(tags::change_state::VALUE, &[Expression::int(200)]),
        );
        let function = Arc::new(Function::new("leave", 0, 1).with_controllers(vec![
            Controller::Assign {
                slot: 0,
                value: Expression::int(9),
            },
            Block::new(vec![change]).into_controller(),
        ]));
        let call = CallFunction::new(function, vec![], vec![0]);

        let mut vm = VM::new();
        let (changed, v) = vm
            .with_window(1, |vm| {
                let changed = call.run(vm, &mut roster, p1)?;
                Ok((changed, vm.local(0)?))
            })
            .unwrap();
        assert!(changed);
        assert_eq!(v, Value::None);
        assert_eq!(vm.windows().depth(), 0);
        assert_eq!(
            roster.entity(p1).unwrap().pending_state.map(|r| r.number),
            Some(200)
        );
    }

    #[test]
    fn test_recursive_windows_are_isolated() {
        let mut roster = Roster::with_seed(0);
        let p1 = roster.add_player(1, "kfm");
        let inner = sum();
        // fn twice(a) -> (r) { local t; (r) = sum(a, a) ; t = 1 }
        let outer = Arc::new(
            Function::new("twice", 1, 1).with_locals(3).with_controllers(vec![
                Controller::Call(CallFunction::new(inner, vec![local(0), local(0)], vec![1])),
                Controller::Assign {
                    slot: 2,
                    value: Expression::int(1),
                },
            ]),
        );
        let call = CallFunction::new(outer, vec![Expression::int(21)], vec![0]);
        let v = VM::new()
            .with_window(1, |vm| {
                call.run(vm, &mut roster, p1)?;
                vm.local(0)
            })
            .unwrap();
        assert_eq!(v, Value::int(42));
    }
}
