//! Behavior programs
//!
//! A [`BehaviorProgram`] is the compiled unit for one state number: the
//! state/move/physics triple it imposes on entry, an on-enter step, and the
//! root [`Block`] that runs once per tick while the state is active.
//! Programs are grouped per player in a [`ProgramLibrary`] that also owns
//! the string pool their bytecode indexes into.

mod block;
mod function;

pub use block::{Block, ForInit, ForLoop, LoopKind, PauseMode, Persistence};
pub use function::{CallFunction, Function};

use crate::bytecode::StringPool;
use crate::controller::args::nth;
use crate::controller::{tags, ArgBlock};
use crate::entity::{BlockMemory, EntityId, MoveType, Physics, StateType};
use crate::value::{PowBitOrder, RuntimeError};
use crate::vm::VM;
use crate::world::World;
use std::collections::HashMap;
use std::sync::Arc;
use tickvm_config::{PowBitOrderSetting, VmConfig};
use tracing::{debug, trace};

/// On-enter step of a program. Runs once, right after the state is entered,
/// against the entering entity.
#[derive(Debug, Clone, Default)]
pub struct StateEntry(pub ArgBlock);

impl StateEntry {
    pub fn run(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        entity: EntityId,
    ) -> Result<(), RuntimeError> {
        use tags::state_entry::*;

        self.0.walk(|tag, exprs| {
            match tag {
                VEL_SET => {
                    let x = vm.eval_f32(world, nth(tag, exprs, 0)?, entity)?;
                    let y = match exprs.get(1) {
                        Some(code) => Some(vm.eval_f32(world, code, entity)?),
                        None => None,
                    };
                    let z = match exprs.get(2) {
                        Some(code) => Some(vm.eval_f32(world, code, entity)?),
                        None => None,
                    };
                    let e = world.get_mut(entity)?;
                    e.vel[0] = x;
                    if let Some(y) = y {
                        e.vel[1] = y;
                    }
                    if let Some(z) = z {
                        e.vel[2] = z;
                    }
                }
                ANIM => {
                    let anim = vm.eval_i32(world, nth(tag, exprs, 0)?, entity)?;
                    world.get_mut(entity)?.set_anim(anim, 1);
                }
                CTRL => {
                    let ctrl = vm.eval_bool(world, nth(tag, exprs, 0)?, entity)?;
                    world.get_mut(entity)?.ctrl = ctrl;
                }
                POWER_ADD => {
                    let add = vm.eval_i32(world, nth(tag, exprs, 0)?, entity)?;
                    let e = world.get_mut(entity)?;
                    e.set_power(e.power.saturating_add(add));
                }
                FACE_P2 => {
                    if vm.eval_bool(world, nth(tag, exprs, 0)?, entity)? {
                        face_p2(world, entity)?;
                    }
                }
                JUGGLE => {
                    let juggle = vm.eval_i32(world, nth(tag, exprs, 0)?, entity)?;
                    world.get_mut(entity)?.juggle = juggle;
                }
                SPR_PRIORITY => {
                    let p = vm.eval_i32(world, nth(tag, exprs, 0)?, entity)?;
                    world.get_mut(entity)?.spr_priority = p;
                }
                HIT_COUNT_PERSIST => {
                    if !vm.eval_bool(world, nth(tag, exprs, 0)?, entity)? {
                        let e = world.get_mut(entity)?;
                        e.hit_count = 0;
                        e.unique_hit_count = 0;
                    }
                }
                MOVE_HIT_PERSIST => {
                    if !vm.eval_bool(world, nth(tag, exprs, 0)?, entity)? {
                        let e = world.get_mut(entity)?;
                        e.move_hit = false;
                        e.move_contact = false;
                    }
                }
                _ => {}
            }
            Ok(true)
        })?;
        Ok(())
    }
}

/// Turns `entity` around when its nearest opponent stands behind it.
fn face_p2(world: &mut dyn World, entity: EntityId) -> Result<(), RuntimeError> {
    let Some(p2) = world.p2(entity) else {
        return Ok(());
    };
    let p2_x = world.get(p2)?.pos[0];
    let e = world.get_mut(entity)?;
    if (p2_x - e.pos[0]) * e.facing < 0.0 {
        e.facing = -e.facing;
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct BehaviorProgram {
    pub number: i32,
    /// `None` leaves the entity's current value alone
    pub state_type: Option<StateType>,
    pub move_type: Option<MoveType>,
    pub physics: Option<Physics>,
    pub entry: StateEntry,
    pub block: Block,
    pub persistence_slots: usize,
    pub toggle_slots: usize,
    /// Size of the variable window opened for each run
    pub num_vars: usize,
}

impl BehaviorProgram {
    pub fn new(number: i32, block: Block) -> Self {
        Self {
            number,
            block,
            ..Self::default()
        }
    }

    pub fn with_types(
        mut self,
        state_type: Option<StateType>,
        move_type: Option<MoveType>,
        physics: Option<Physics>,
    ) -> Self {
        self.state_type = state_type;
        self.move_type = move_type;
        self.physics = physics;
        self
    }

    pub fn with_entry(mut self, entry: ArgBlock) -> Self {
        self.entry = StateEntry(entry);
        self
    }

    pub fn with_slots(mut self, persistence_slots: usize, toggle_slots: usize) -> Self {
        self.persistence_slots = persistence_slots;
        self.toggle_slots = toggle_slots;
        self
    }

    pub fn with_locals(mut self, num_vars: usize) -> Self {
        self.num_vars = num_vars;
        self
    }

    /// Fresh block memory for this program
    pub fn memory(&self) -> BlockMemory {
        BlockMemory::sized(self.persistence_slots, self.toggle_slots)
    }

    /// Applies the on-enter effects and resets the entity's block memory.
    pub fn enter(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        entity: EntityId,
    ) -> Result<(), RuntimeError> {
        let e = world.get_mut(entity)?;
        e.block_memory = self.memory();
        if let Some(state_type) = self.state_type {
            e.state.state_type = state_type;
        }
        if let Some(move_type) = self.move_type {
            e.set_move_type(move_type);
        }
        if let Some(physics) = self.physics {
            e.state.physics = physics;
        }
        trace!(entity = %entity, state = self.number, "entering program");
        vm.with_window(self.num_vars, |vm| self.entry.run(vm, world, entity))
    }

    /// Runs the root block once. Returns true when the entity requested a
    /// state change that stopped the run.
    ///
    /// The operand stack must be empty afterwards; anything left on it is a
    /// fatal imbalance.
    pub fn run(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        entity: EntityId,
        memory: &mut BlockMemory,
    ) -> Result<bool, RuntimeError> {
        vm.with_window(self.num_vars, |vm| {
            let changed = self.block.run(vm, world, entity, memory)?;
            // A break or continue outside any loop has nothing to stop.
            vm.take_signal();
            vm.check_stack_balance(self.number)?;
            Ok(changed)
        })
    }
}

/// The programs of one player
#[derive(Debug, Clone)]
pub struct ProgramLibrary {
    programs: HashMap<i32, Arc<BehaviorProgram>>,
    strings: Arc<StringPool>,
    /// Major version of the engine the programs were authored for
    engine_major: u32,
    pow_order: PowBitOrder,
}

impl ProgramLibrary {
    pub fn new(strings: StringPool, engine_major: u32) -> Self {
        Self {
            programs: HashMap::new(),
            strings: Arc::new(strings),
            engine_major,
            pow_order: pow_order_for(&VmConfig::default(), engine_major),
        }
    }

    /// Re-resolves the pow bit order against `config`.
    pub fn configure(&mut self, config: &VmConfig) {
        self.pow_order = pow_order_for(config, self.engine_major);
        debug!(
            engine_major = self.engine_major,
            pow_order = ?self.pow_order,
            "program library configured"
        );
    }

    pub fn insert(&mut self, program: BehaviorProgram) -> Option<Arc<BehaviorProgram>> {
        self.programs.insert(program.number, Arc::new(program))
    }

    pub fn get(&self, number: i32) -> Option<&Arc<BehaviorProgram>> {
        self.programs.get(&number)
    }

    pub fn strings(&self) -> &Arc<StringPool> {
        &self.strings
    }

    pub fn pow_order(&self) -> PowBitOrder {
        self.pow_order
    }

    pub fn engine_major(&self) -> u32 {
        self.engine_major
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

/// Chooses the integer power bit order for programs authored against
/// `engine_major`.
pub fn pow_order_for(config: &VmConfig, engine_major: u32) -> PowBitOrder {
    match config.pow_bit_order() {
        PowBitOrderSetting::Current => PowBitOrder::Current,
        PowBitOrderSetting::Legacy => PowBitOrder::Legacy,
        PowBitOrderSetting::Auto if config.is_current_pow_major(engine_major) => {
            PowBitOrder::Current
        }
        PowBitOrderSetting::Auto => PowBitOrder::Legacy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Expression;
    use crate::controller::Controller;
    use crate::world::Roster;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tickvm_config::CompatConfig;

    fn versus() -> (Roster, EntityId, EntityId) {
        let mut roster = Roster::with_seed(0);
        let p1 = roster.add_player(1, "kfm");
        let p2 = roster.add_player(2, "kfm");
        (roster, p1, p2)
    }

    #[test]
    fn test_enter_applies_types_and_entry() {
        let (mut roster, p1, p2) = versus();
        {
            let e = roster.entity_mut(p1).unwrap();
            e.facing = -1.0;
            e.hit_count = 4;
            e.move_hit = true;
            e.block_memory.persistence = vec![7, 7];
        }
        roster.entity_mut(p2).unwrap().pos[0] = 50.0;

        use tags::state_entry::*;
        let entry = ArgBlock::new()
            .with(VEL_SET, &[Expression::float(3.0), Expression::float(-6.0)])
            .with(ANIM, &[Expression::int(200)])
            .with(CTRL, &[Expression::int(0)])
            .with(POWER_ADD, &[Expression::int(50)])
            .with(FACE_P2, &[Expression::int(1)])
            .with(HIT_COUNT_PERSIST, &[Expression::int(0)])
            .with(MOVE_HIT_PERSIST, &[Expression::int(1)]);
        let program = BehaviorProgram::new(200, Block::default())
            .with_types(Some(StateType::Air), Some(MoveType::Attack), None)
            .with_entry(entry)
            .with_slots(3, 1);

        program.enter(&mut VM::new(), &mut roster, p1).unwrap();

        let e = roster.entity(p1).unwrap();
        assert_eq!(e.state.state_type, StateType::Air);
        assert_eq!(e.state.move_type, MoveType::Attack);
        assert_eq!(e.state.prev_move_type, MoveType::Idle);
        assert_eq!(e.state.physics, Physics::Standing);
        assert_eq!(e.vel[0..2], [3.0, -6.0]);
        assert_eq!(e.anim, 200);
        assert!(!e.ctrl);
        assert_eq!(e.power, 50);
        assert_eq!(e.facing, 1.0);
        assert_eq!(e.hit_count, 0);
        assert!(e.move_hit);
        assert_eq!(e.block_memory, BlockMemory::sized(3, 1));
    }

    #[test]
    fn test_run_detects_stack_imbalance() {
        let (mut roster, p1, _) = versus();
        // Pushes two values and pops one.
        let mut leaky = Expression::int(1);
        leaky.append(&Expression::int(2));
        let program = BehaviorProgram::new(5, Block::new(vec![Controller::Expr(leaky)]));
        let mut vm = VM::new();
        let err = program
            .run(&mut vm, &mut roster, p1, &mut BlockMemory::default())
            .unwrap_err();
        assert_eq!(
            err,
            RuntimeError::StackImbalance {
                state: 5,
                dump: vec![crate::value::Value::int(1)],
            }
        );
    }

    #[test]
    fn test_stray_signal_is_cleared() {
        let (mut roster, p1, _) = versus();
        let program = BehaviorProgram::new(0, Block::new(vec![Controller::Break]));
        let mut vm = VM::new();
        assert!(program
            .run(&mut vm, &mut roster, p1, &mut BlockMemory::default())
            .unwrap());
        assert_eq!(vm.pending_signal(), None);
    }

    #[rstest]
    #[case::auto_current(None, 1, PowBitOrder::Current)]
    #[case::auto_legacy(None, 0, PowBitOrder::Legacy)]
    #[case::forced_legacy(Some(PowBitOrderSetting::Legacy), 1, PowBitOrder::Legacy)]
    #[case::forced_current(Some(PowBitOrderSetting::Current), 0, PowBitOrder::Current)]
    fn test_pow_order_resolution(
        #[case] setting: Option<PowBitOrderSetting>,
        #[case] major: u32,
        #[case] expected: PowBitOrder,
    ) {
        let config = VmConfig {
            compat: Some(CompatConfig {
                pow_bit_order: setting,
                current_pow_majors: None,
            }),
            ..VmConfig::default()
        };
        let mut library = ProgramLibrary::new(StringPool::new(), major);
        library.configure(&config);
        assert_eq!(library.pow_order(), expected);
    }
}
