//! State controllers
//!
//! A controller is one instruction of a behavior program. Running it returns
//! `Ok(true)` when the enclosing block tree must unwind immediately: the
//! running entity changed state, was destroyed, or a loop signal was raised.
//!
//! Effect controllers carry an [`ArgBlock`] and are implemented by free
//! functions in the submodules, grouped by what they touch.

pub mod args;
mod io;
mod motion;
mod spawn;
mod state;
pub mod tags;
mod vars;
mod vitals;

pub use args::{ArgBlock, Target, Victims};
pub use io::format_text;

use crate::bytecode::Expression;
use crate::entity::{BlockMemory, EntityId};
use crate::program::{Block, CallFunction};
use crate::value::RuntimeError;
use crate::vm::{LoopSignal, VM};
use crate::world::World;
use motion::{Anchor, AngleOp, VectorOp};
use vitals::VitalOp;

#[derive(Debug, Clone)]
pub enum Controller {
    // ===== Structure =====
    Block(Box<Block>),
    /// Evaluate for side effects
    Expr(Expression),
    /// Store into a slot of the current variable window
    Assign {
        slot: u8,
        value: Expression,
    },
    Break,
    Continue,
    Call(CallFunction),
    Null,

    // ===== State =====
    ChangeState(ArgBlock),
    SelfState(ArgBlock),
    StateTypeSet(ArgBlock),
    ChangeAnim(ArgBlock),
    CtrlSet(ArgBlock),
    Turn(ArgBlock),
    DestroySelf(ArgBlock),
    TargetState(ArgBlock),
    TargetFacing(ArgBlock),
    TargetDrop(ArgBlock),

    // ===== Motion =====
    PosSet(ArgBlock),
    PosAdd(ArgBlock),
    VelSet(ArgBlock),
    VelAdd(ArgBlock),
    VelMul(ArgBlock),
    Gravity(ArgBlock),
    AngleSet(ArgBlock),
    AngleAdd(ArgBlock),
    AngleMul(ArgBlock),
    TargetVelSet(ArgBlock),
    TargetVelAdd(ArgBlock),
    PosFreeze(ArgBlock),
    BindToParent(ArgBlock),
    BindToRoot(ArgBlock),

    // ===== Vitals =====
    LifeAdd(ArgBlock),
    LifeSet(ArgBlock),
    PowerAdd(ArgBlock),
    PowerSet(ArgBlock),
    AttackMulSet(ArgBlock),
    TargetLifeAdd(ArgBlock),
    TargetPowerAdd(ArgBlock),
    DefenceMulSet(ArgBlock),
    HitAdd(ArgBlock),
    MoveHitReset(ArgBlock),

    // ===== Variables =====
    VarSet(ArgBlock),
    VarRangeSet(ArgBlock),
    VarRandom(ArgBlock),
    MapSet(ArgBlock),

    // ===== Spawning =====
    Helper(ArgBlock),
    Explod(ArgBlock),
    RemoveExplod(ArgBlock),
    ModifyExplod(ArgBlock),
    ExplodBindTime(ArgBlock),
    Projectile(ArgBlock),

    // ===== I/O =====
    PrintToConsole(ArgBlock),
    DisplayToClipboard(ArgBlock),
    AppendToClipboard(ArgBlock),
    ClearClipboard(ArgBlock),
    SaveFile(ArgBlock),
    LoadFile(ArgBlock),
}

impl Controller {
    /// Blocks run during hit pause and decide for themselves.
    pub fn is_block(&self) -> bool {
        matches!(self, Controller::Block(_))
    }

    pub fn run(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        entity: EntityId,
        memory: &mut BlockMemory,
    ) -> Result<bool, RuntimeError> {
        match self {
            Controller::Block(block) => block.run(vm, world, entity, memory),
            Controller::Expr(e) => {
                vm.eval(world, e.as_bytes(), entity)?;
                Ok(false)
            }
            Controller::Assign { slot, value } => {
                let v = vm.eval(world, value.as_bytes(), entity)?;
                vm.set_local(*slot as usize, v)?;
                Ok(false)
            }
            Controller::Break => {
                vm.raise(LoopSignal::Break);
                Ok(true)
            }
            Controller::Continue => {
                vm.raise(LoopSignal::Continue);
                Ok(true)
            }
            Controller::Call(call) => call.run(vm, world, entity),
            Controller::Null => Ok(false),

            Controller::ChangeState(a) => state::change_state(vm, world, entity, a, false),
            Controller::SelfState(a) => state::change_state(vm, world, entity, a, true),
            Controller::StateTypeSet(a) => state::state_type_set(vm, world, entity, a),
            Controller::ChangeAnim(a) => state::change_anim(vm, world, entity, a),
            Controller::CtrlSet(a) => state::ctrl_set(vm, world, entity, a),
            Controller::Turn(a) => state::turn(vm, world, entity, a),
            Controller::DestroySelf(a) => state::destroy_self(vm, world, entity, a),
            Controller::TargetState(a) => state::target_state(vm, world, entity, a),
            Controller::TargetFacing(a) => state::target_facing(vm, world, entity, a),
            Controller::TargetDrop(a) => state::target_drop(vm, world, entity, a),

            Controller::PosSet(a) => motion::vector(vm, world, entity, a, VectorOp::PosSet),
            Controller::PosAdd(a) => motion::vector(vm, world, entity, a, VectorOp::PosAdd),
            Controller::VelSet(a) => motion::vector(vm, world, entity, a, VectorOp::VelSet),
            Controller::VelAdd(a) => motion::vector(vm, world, entity, a, VectorOp::VelAdd),
            Controller::VelMul(a) => motion::vector(vm, world, entity, a, VectorOp::VelMul),
            Controller::Gravity(a) => motion::gravity(vm, world, entity, a),
            Controller::AngleSet(a) => motion::angle(vm, world, entity, a, AngleOp::Set),
            Controller::AngleAdd(a) => motion::angle(vm, world, entity, a, AngleOp::Add),
            Controller::AngleMul(a) => motion::angle(vm, world, entity, a, AngleOp::Mul),
            Controller::TargetVelSet(a) => {
                motion::target_vel(vm, world, entity, a, VectorOp::VelSet)
            }
            Controller::TargetVelAdd(a) => {
                motion::target_vel(vm, world, entity, a, VectorOp::VelAdd)
            }
            Controller::PosFreeze(a) => motion::pos_freeze(vm, world, entity, a),
            Controller::BindToParent(a) => motion::bind(vm, world, entity, a, Anchor::Parent),
            Controller::BindToRoot(a) => motion::bind(vm, world, entity, a, Anchor::Root),

            Controller::LifeAdd(a) => vitals::life_add(vm, world, entity, a),
            Controller::LifeSet(a) => vitals::vital(vm, world, entity, a, VitalOp::LifeSet),
            Controller::PowerAdd(a) => vitals::vital(vm, world, entity, a, VitalOp::PowerAdd),
            Controller::PowerSet(a) => vitals::vital(vm, world, entity, a, VitalOp::PowerSet),
            Controller::AttackMulSet(a) => {
                vitals::vital(vm, world, entity, a, VitalOp::AttackMulSet)
            }
            Controller::TargetLifeAdd(a) => vitals::target_life_add(vm, world, entity, a),
            Controller::TargetPowerAdd(a) => vitals::target_power_add(vm, world, entity, a),
            Controller::DefenceMulSet(a) => vitals::defence_mul_set(vm, world, entity, a),
            Controller::HitAdd(a) => vitals::hit_add(vm, world, entity, a),
            Controller::MoveHitReset(a) => vitals::move_hit_reset(vm, world, entity, a),

            Controller::VarSet(a) => vars::var_set(vm, world, entity, a),
            Controller::VarRangeSet(a) => vars::var_range_set(vm, world, entity, a),
            Controller::VarRandom(a) => vars::var_random(vm, world, entity, a),
            Controller::MapSet(a) => vars::map_set(vm, world, entity, a),

            Controller::Helper(a) => spawn::helper(vm, world, entity, a),
            Controller::Explod(a) => spawn::explod(vm, world, entity, a),
            Controller::RemoveExplod(a) => spawn::remove_explod(vm, world, entity, a),
            Controller::ModifyExplod(a) => spawn::modify_explod(vm, world, entity, a),
            Controller::ExplodBindTime(a) => spawn::explod_bind_time(vm, world, entity, a),
            Controller::Projectile(a) => spawn::projectile(vm, world, entity, a),

            Controller::PrintToConsole(a) => io::print_to_console(vm, world, entity, a),
            Controller::DisplayToClipboard(a) => io::clipboard(vm, world, entity, a, true),
            Controller::AppendToClipboard(a) => io::clipboard(vm, world, entity, a, false),
            Controller::ClearClipboard(a) => io::clear_clipboard(vm, world, entity, a),
            Controller::SaveFile(a) => io::save_file(vm, world, entity, a),
            Controller::LoadFile(a) => io::load_file(vm, world, entity, a),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::world::Roster;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_signals_unwind() {
        let mut roster = Roster::with_seed(0);
        let p1 = roster.add_player(1, "kfm");
        let mut vm = VM::new();
        let mut memory = BlockMemory::default();

        assert!(Controller::Break
            .run(&mut vm, &mut roster, p1, &mut memory)
            .unwrap());
        assert_eq!(vm.take_signal(), Some(LoopSignal::Break));
        assert!(!Controller::Null
            .run(&mut vm, &mut roster, p1, &mut memory)
            .unwrap());
    }

    #[test]
    fn test_assign_writes_window() {
        let mut roster = Roster::with_seed(0);
        let p1 = roster.add_player(1, "kfm");
        let mut vm = VM::new();
        let assign = Controller::Assign {
            slot: 1,
            value: Expression::float(0.25),
        };
        let v = vm
            .with_window(2, |vm| {
                assign.run(vm, &mut roster, p1, &mut BlockMemory::default())?;
                vm.local(1)
            })
            .unwrap();
        assert_eq!(v, Value::Float(0.25));

        // Outside any window the slot does not exist.
        assert!(assign
            .run(&mut vm, &mut roster, p1, &mut BlockMemory::default())
            .is_err());
    }
}
