//! Shared builders for runtime integration tests

#![allow(dead_code)]

use tickvm_runtime::bytecode::{Opcode, StoreOp};
use tickvm_runtime::controller::tags;
use tickvm_runtime::{ArgBlock, Controller, EntityId, Expression, Roster, Value, World};

pub use pretty_assertions::{assert_eq, assert_ne};

/// Two players facing each other, p2 at x = 100
pub fn duel() -> (Roster, EntityId, EntityId) {
    let mut roster = Roster::with_seed(7);
    let p1 = roster.add_player(1, "kfm");
    let p2 = roster.add_player(2, "kfm");
    roster.entity_mut(p2).unwrap().pos[0] = 100.0;
    (roster, p1, p2)
}

/// `var(index) += 1`
pub fn bump(index: i32) -> Controller {
    let mut e = Expression::int(index);
    e.push_value(Value::int(1));
    e.emit_store(StoreOp::AddVar);
    Controller::Expr(e)
}

/// `var(index) := v`
pub fn set_var(index: i32, v: i32) -> Controller {
    let mut e = Expression::int(index);
    e.push_value(Value::int(v));
    e.emit_store(StoreOp::SetVar);
    Controller::Expr(e)
}

/// `var(index) := local(slot)`
pub fn record_local(index: i32, slot: u8) -> Controller {
    let mut e = Expression::int(index);
    e.emit(Opcode::LocalVar).emit_u8(slot);
    e.emit_store(StoreOp::SetVar);
    Controller::Expr(e)
}

pub fn local(slot: u8) -> Expression {
    let mut e = Expression::new();
    e.emit(Opcode::LocalVar).emit_u8(slot);
    e
}

/// `local(slot) == v`
pub fn local_is(slot: u8, v: i32) -> Expression {
    let mut e = local(slot);
    e.push_value(Value::int(v));
    e.emit(Opcode::Eq);
    e
}

pub fn change_to(number: i32) -> Controller {
    Controller::ChangeState(
        ArgBlock::new().with(tags::change_state::VALUE, &[Expression::int(number)]),
    )
}

pub fn ivar(roster: &Roster, entity: EntityId, index: usize) -> i32 {
    roster.entity(entity).unwrap().ivar[index]
}
