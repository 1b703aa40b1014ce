//! Control-flow blocks
//!
//! A block gates a list of controllers behind, in order: the hit-pause
//! check, the persistence counter and the guard. Loop blocks repeat their
//! body and consume the break/continue signals raised inside it.

use crate::bytecode::Expression;
use crate::controller::Controller;
use crate::entity::{BlockMemory, EntityId};
use crate::value::{RuntimeError, Value};
use crate::vm::{LoopSignal, VM};
use crate::world::World;

/// What a block does while its entity is in hit pause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PauseMode {
    /// Do nothing
    #[default]
    Skip,
    /// Run as usual
    Run,
    /// Run every other paused tick, tracked by a toggle slot
    Alternate(usize),
}

/// Fire only every `period`th activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persistence {
    pub slot: usize,
    /// 0 fires once per state entry
    pub period: i32,
}

impl Persistence {
    fn reload(&self) -> i32 {
        if self.period == 0 {
            i32::MAX
        } else {
            self.period
        }
    }
}

/// Initializer of a `for` loop
#[derive(Debug, Clone)]
pub enum ForInit {
    /// Start value only; the body cannot see the counter
    Expr(Expression),
    /// Start value stored in a local slot, re-read after every iteration
    Assign { slot: u8, value: Expression },
}

/// `for` loop over the half-open range from the initializer to `end`
#[derive(Debug, Clone)]
pub struct ForLoop {
    pub init: ForInit,
    pub end: Expression,
    pub step: Expression,
}

#[derive(Debug, Clone, Default)]
pub enum LoopKind {
    #[default]
    None,
    /// Re-evaluates the guard before every iteration
    While,
    For(ForLoop),
}

/// How a body pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Completed,
    Broke,
    Unwind,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub guard: Option<Expression>,
    pub controllers: Vec<Controller>,
    pub else_block: Option<Box<Block>>,
    pub pause: PauseMode,
    pub persistence: Option<Persistence>,
    /// Run non-block children during hit pause too
    pub body_ignores_pause: bool,
    pub kind: LoopKind,
}

impl Block {
    pub fn new(controllers: Vec<Controller>) -> Self {
        Self {
            controllers,
            ..Self::default()
        }
    }

    pub fn guarded(mut self, guard: Expression) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_else(mut self, else_block: Block) -> Self {
        self.else_block = Some(Box::new(else_block));
        self
    }

    pub fn persistent(mut self, slot: usize, period: i32) -> Self {
        self.persistence = Some(Persistence { slot, period });
        self
    }

    pub fn pause_mode(mut self, pause: PauseMode) -> Self {
        self.pause = pause;
        self
    }

    pub fn ignore_pause_in_body(mut self) -> Self {
        self.body_ignores_pause = true;
        self
    }

    pub fn while_loop(mut self) -> Self {
        self.kind = LoopKind::While;
        self
    }

    pub fn for_loop(mut self, for_loop: ForLoop) -> Self {
        self.kind = LoopKind::For(for_loop);
        self
    }

    pub fn into_controller(self) -> Controller {
        Controller::Block(Box::new(self))
    }

    /// Returns true when the block tree must unwind.
    pub fn run(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        entity: EntityId,
        memory: &mut BlockMemory,
    ) -> Result<bool, RuntimeError> {
        if world.get(entity)?.is_paused() {
            match self.pause {
                PauseMode::Skip => return Ok(false),
                PauseMode::Run => {}
                PauseMode::Alternate(slot) => {
                    if !memory.flip_toggle(slot) {
                        return Ok(false);
                    }
                }
            }
        }

        if let Some(p) = &self.persistence {
            let counter = memory.counter(p.slot);
            *counter -= 1;
            if *counter > 0 {
                return Ok(false);
            }
        }

        match &self.kind {
            LoopKind::None => {
                if !self.guard_passes(vm, world, entity)? {
                    return match &self.else_block {
                        Some(else_block) => else_block.run(vm, world, entity, memory),
                        None => Ok(false),
                    };
                }
                if self.run_body(vm, world, entity, memory, false)? == Flow::Unwind {
                    return Ok(true);
                }
            }
            LoopKind::While => {
                let mut iterations = 0;
                while self.guard_passes(vm, world, entity)? {
                    iterations = next_iteration(vm, iterations)?;
                    match self.run_body(vm, world, entity, memory, true)? {
                        Flow::Completed => {}
                        Flow::Broke => break,
                        Flow::Unwind => return Ok(true),
                    }
                }
            }
            LoopKind::For(for_loop) => {
                if self.run_for(vm, world, entity, memory, for_loop)? {
                    return Ok(true);
                }
            }
        }

        if let Some(p) = &self.persistence {
            *memory.counter(p.slot) = p.reload();
        }
        Ok(false)
    }

    fn guard_passes(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        entity: EntityId,
    ) -> Result<bool, RuntimeError> {
        match &self.guard {
            Some(guard) => vm.eval_bool(world, guard.as_bytes(), entity),
            None => Ok(true),
        }
    }

    fn run_for(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        entity: EntityId,
        memory: &mut BlockMemory,
        for_loop: &ForLoop,
    ) -> Result<bool, RuntimeError> {
        let mut i = match &for_loop.init {
            ForInit::Expr(e) => vm.eval_i32(world, e.as_bytes(), entity)?,
            ForInit::Assign { slot, value } => {
                let v = Value::int(vm.eval_i32(world, value.as_bytes(), entity)?);
                vm.set_local(*slot as usize, v)?;
                v.to_i32()
            }
        };
        let end = vm.eval_i32(world, for_loop.end.as_bytes(), entity)?;
        let step = vm.eval_i32(world, for_loop.step.as_bytes(), entity)?;

        let in_range = |i: i32| match step {
            0 => false,
            s if s > 0 => i < end,
            _ => i > end,
        };
        let mut iterations = 0;
        while in_range(i) {
            iterations = next_iteration(vm, iterations)?;
            match self.run_body(vm, world, entity, memory, true)? {
                Flow::Completed => {}
                Flow::Broke => break,
                Flow::Unwind => return Ok(true),
            }
            if let ForInit::Assign { slot, .. } = &for_loop.init {
                i = vm.local(*slot as usize)?.to_i32().wrapping_add(step);
                if in_range(i) {
                    vm.set_local(*slot as usize, Value::int(i))?;
                }
            } else {
                i = i.wrapping_add(step);
            }
        }
        Ok(false)
    }

    fn run_body(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        entity: EntityId,
        memory: &mut BlockMemory,
        in_loop: bool,
    ) -> Result<Flow, RuntimeError> {
        for c in &self.controllers {
            if !c.is_block() && !self.body_ignores_pause && world.get(entity)?.is_paused() {
                continue;
            }
            if !c.run(vm, world, entity, memory)? {
                continue;
            }
            if !in_loop {
                return Ok(Flow::Unwind);
            }
            return Ok(match vm.take_signal() {
                Some(LoopSignal::Break) => Flow::Broke,
                Some(LoopSignal::Continue) => Flow::Completed,
                None => Flow::Unwind,
            });
        }
        Ok(Flow::Completed)
    }
}

fn next_iteration(vm: &VM, done: u32) -> Result<u32, RuntimeError> {
    let limit = vm.max_loop_iterations();
    if done >= limit {
        return Err(RuntimeError::LoopLimitExceeded { limit });
    }
    Ok(done + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Opcode, StoreOp};
    use crate::controller::{tags, ArgBlock};
    use crate::world::Roster;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn solo() -> (Roster, EntityId) {
        let mut roster = Roster::with_seed(0);
        let p1 = roster.add_player(1, "kfm");
        (roster, p1)
    }

    /// `var(index) += 1`
    fn bump(index: i32) -> Controller {
        let mut e = Expression::int(index);
        e.push_value(Value::int(1));
        e.emit_store(StoreOp::AddVar);
        Controller::Expr(e)
    }

    /// `local(slot) == v`
    fn local_is(slot: u8, v: i32) -> Expression {
        let mut e = Expression::new();
        e.emit(Opcode::LocalVar).emit_u8(slot);
        e.push_value(Value::int(v));
        e.emit(Opcode::Eq);
        e
    }

    fn var0(roster: &Roster, p1: EntityId) -> i32 {
        roster.entity(p1).unwrap().ivar[0]
    }

    #[test]
    fn test_persistence_fires_every_nth_activation() {
        let (mut roster, p1) = solo();
        let mut vm = VM::new();
        let mut memory = BlockMemory::sized(1, 0);
        let block = Block::new(vec![bump(0)]).persistent(0, 3);

        let mut fired = Vec::new();
        for activation in 1..=7 {
            let before = var0(&roster, p1);
            block.run(&mut vm, &mut roster, p1, &mut memory).unwrap();
            if var0(&roster, p1) > before {
                fired.push(activation);
            }
        }
        assert_eq!(fired, vec![1, 4, 7]);

        memory = BlockMemory::sized(1, 0);
        block.run(&mut vm, &mut roster, p1, &mut memory).unwrap();
        assert_eq!(var0(&roster, p1), 4);
    }

    #[test]
    fn test_persistence_zero_fires_once() {
        let (mut roster, p1) = solo();
        let mut vm = VM::new();
        let mut memory = BlockMemory::default();
        let block = Block::new(vec![bump(0)]).persistent(0, 0);
        for _ in 0..10 {
            block.run(&mut vm, &mut roster, p1, &mut memory).unwrap();
        }
        assert_eq!(var0(&roster, p1), 1);
    }

    #[test]
    fn test_else_branch() {
        let (mut roster, p1) = solo();
        let mut vm = VM::new();
        let block = Block::new(vec![bump(0)])
            .guarded(Expression::int(0))
            .with_else(Block::new(vec![bump(1)]));
        block
            .run(&mut vm, &mut roster, p1, &mut BlockMemory::default())
            .unwrap();
        let e = roster.entity(p1).unwrap();
        assert_eq!((e.ivar[0], e.ivar[1]), (0, 1));
    }

    #[rstest]
    #[case::skip(PauseMode::Skip, 0)]
    #[case::run(PauseMode::Run, 4)]
    #[case::alternate(PauseMode::Alternate(0), 2)]
    fn test_pause_modes(#[case] mode: PauseMode, #[case] expected: i32) {
        let (mut roster, p1) = solo();
        roster.entity_mut(p1).unwrap().hit_pause_time = 10;
        let mut vm = VM::new();
        let mut memory = BlockMemory::default();
        let block = Block::new(vec![Block::new(vec![bump(0)])
            .pause_mode(PauseMode::Run)
            .ignore_pause_in_body()
            .into_controller()])
        .pause_mode(mode);
        for _ in 0..4 {
            block.run(&mut vm, &mut roster, p1, &mut memory).unwrap();
        }
        assert_eq!(var0(&roster, p1), expected);
    }

    #[test]
    fn test_paused_body_skips_plain_controllers() {
        let (mut roster, p1) = solo();
        roster.entity_mut(p1).unwrap().hit_pause_time = 1;
        let mut vm = VM::new();
        let block = Block::new(vec![bump(0)]).pause_mode(PauseMode::Run);
        block
            .run(&mut vm, &mut roster, p1, &mut BlockMemory::default())
            .unwrap();
        assert_eq!(var0(&roster, p1), 0);
    }

    #[test]
    fn test_for_loop_counts_and_breaks() {
        let (mut roster, p1) = solo();
        let mut vm = VM::new();

        // for i = 0; i < 5; i += 1 { var(0) += 1; if i == 2 { break } }
        let body = vec![
            bump(0),
            Block::new(vec![Controller::Break])
                .guarded(local_is(0, 2))
                .into_controller(),
        ];
        let for_loop = ForLoop {
            init: ForInit::Assign {
                slot: 0,
                value: Expression::int(0),
            },
            end: Expression::int(5),
            step: Expression::int(1),
        };
        let block = Block::new(body).for_loop(for_loop);
        let unwound = vm
            .with_window(1, |vm| {
                block.run(vm, &mut roster, p1, &mut BlockMemory::default())
            })
            .unwrap();
        assert!(!unwound);
        assert_eq!(var0(&roster, p1), 3);
        assert_eq!(vm.pending_signal(), None);
    }

    #[rstest]
    #[case::ascending(0, 5, 1, 5)]
    #[case::stride(0, 10, 3, 4)]
    #[case::descending(5, 0, -1, 5)]
    #[case::empty(5, 5, 1, 0)]
    #[case::wrong_direction(0, 5, -1, 0)]
    #[case::zero_step(0, 5, 0, 0)]
    fn test_for_loop_iterations(
        #[case] begin: i32,
        #[case] end: i32,
        #[case] step: i32,
        #[case] expected: i32,
    ) {
        let (mut roster, p1) = solo();
        let block = Block::new(vec![bump(0)]).for_loop(ForLoop {
            init: ForInit::Expr(Expression::int(begin)),
            end: Expression::int(end),
            step: Expression::int(step),
        });
        block
            .run(&mut VM::new(), &mut roster, p1, &mut BlockMemory::default())
            .unwrap();
        assert_eq!(var0(&roster, p1), expected);
    }

    #[test]
    fn test_while_loop_with_continue() {
        let (mut roster, p1) = solo();
        let mut vm = VM::new();

        // while var(0) < 4 { var(0) += 1; continue; var(1) += 1 }
        let mut guard = Expression::int(0);
        guard.emit(Opcode::Var);
        guard.push_value(Value::int(4));
        guard.emit(Opcode::Lt);
        let block = Block::new(vec![bump(0), Controller::Continue, bump(1)])
            .guarded(guard)
            .while_loop();
        assert!(!block
            .run(&mut vm, &mut roster, p1, &mut BlockMemory::default())
            .unwrap());
        let e = roster.entity(p1).unwrap();
        assert_eq!((e.ivar[0], e.ivar[1]), (4, 0));
    }

    #[test]
    fn test_runaway_loop_is_fatal() {
        let (mut roster, p1) = solo();
        let mut vm = VM::new();
        vm.set_max_loop_iterations(50);
        let block = Block::new(vec![bump(0)]).while_loop();
        assert_eq!(
            block.run(&mut vm, &mut roster, p1, &mut BlockMemory::default()),
            Err(RuntimeError::LoopLimitExceeded { limit: 50 })
        );
        assert_eq!(var0(&roster, p1), 50);
    }

    #[test]
    fn test_state_change_unwinds_through_loops() {
        let (mut roster, p1) = solo();
        let change = Controller::ChangeState(
            ArgBlock::new().with(tags::change_state::VALUE, &[Expression::int(10)]),
        );
        let inner = Block::new(vec![change, bump(1)]);
        let block = Block::new(vec![bump(0), inner.into_controller(), bump(1)]).while_loop();
        let mut memory = BlockMemory::sized(1, 0);
        let outer = Block::new(vec![block.into_controller()]).persistent(0, 2);

        assert!(outer
            .run(&mut VM::new(), &mut roster, p1, &mut memory)
            .unwrap());
        let e = roster.entity(p1).unwrap();
        assert_eq!((e.ivar[0], e.ivar[1]), (1, 0));
        // Unwinding skips the persistence reload.
        assert_eq!(memory.persistence[0], -1);
    }
}
