//! Life, power, attack and defence controllers, and hit bookkeeping

use super::args::{ArgBlock, Target, Victims};
use super::tags::{self, REDIRECT_ID};
use crate::entity::{Entity, EntityId};
use crate::value::RuntimeError;
use crate::vm::VM;
use crate::world::World;
use tracing::trace;

/// Adds `amount` to `e`'s life.
///
/// Unless `absolute`, damage is divided by the defence ratio and scaled by
/// `attack_mul`. Without `kill` the result never drops below 1.
fn add_life(e: &mut Entity, amount: i32, attack_mul: f32, kill: bool, absolute: bool) {
    let mut amount = amount as f32;
    if !absolute && amount < 0.0 {
        amount *= attack_mul * 100.0 / e.effective_defence();
    }
    let mut life = e.life.saturating_add(amount as i32);
    if !kill && e.life > 0 {
        life = life.max(1);
    }
    e.set_life(life);
}

pub(super) fn life_add(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::life_add::*;

    let mut target = Target::new(entity);
    let mut absolute = false;
    let mut kill = true;
    args.walk(|tag, exprs| {
        match tag {
            ABSOLUTE => absolute = target.bool(vm, world, tag, exprs, 0)?,
            KILL => kill = target.bool(vm, world, tag, exprs, 0)?,
            VALUE => {
                let v = target.i32(vm, world, tag, exprs, 0)?;
                add_life(world.get_mut(target.id)?, v, 1.0, kill, absolute);
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

/// Adds life to the running entity's targets (all of them, or those whose
/// script id matches `id`). Scales damage by the attacker's multiplier.
pub(super) fn target_life_add(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::target_life_add::*;

    let mut victims = Victims::new(world, entity);
    let mut absolute = false;
    let mut kill = true;
    args.walk(|tag, exprs| {
        match tag {
            ID => return victims.select(vm, world, tag, exprs),
            ABSOLUTE => absolute = victims.attacker.bool(vm, world, tag, exprs, 0)?,
            KILL => kill = victims.attacker.bool(vm, world, tag, exprs, 0)?,
            VALUE => {
                if victims.is_empty() {
                    return Ok(false);
                }
                let v = victims.attacker.i32(vm, world, tag, exprs, 0)?;
                let attack_mul = world.get(victims.attacker.id)?.attack_mul;
                for &t in &victims.ids {
                    trace!(
                        attacker = %victims.attacker.id,
                        target = %t,
                        amount = v,
                        "target life add"
                    );
                    add_life(world.get_mut(t)?, v, attack_mul, kill, absolute);
                }
            }
            REDIRECT_ID => return victims.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

pub(super) fn target_power_add(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::target_value::*;

    let mut victims = Victims::new(world, entity);
    args.walk(|tag, exprs| {
        match tag {
            ID => return victims.select(vm, world, tag, exprs),
            VALUE => {
                if victims.is_empty() {
                    return Ok(false);
                }
                let v = victims.attacker.i32(vm, world, tag, exprs, 0)?;
                for &t in &victims.ids {
                    let e = world.get_mut(t)?;
                    e.set_power(e.power.saturating_add(v));
                }
            }
            REDIRECT_ID => return victims.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

/// Which single-value vital a controller writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VitalOp {
    LifeSet,
    PowerAdd,
    PowerSet,
    AttackMulSet,
}

pub(super) fn vital(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
    op: VitalOp,
) -> Result<bool, RuntimeError> {
    let mut target = Target::new(entity);
    args.walk(|tag, exprs| {
        match tag {
            tags::value::VALUE => {
                if op == VitalOp::AttackMulSet {
                    let v = target.f32(vm, world, tag, exprs, 0)?;
                    let e = world.get_mut(target.id)?;
                    e.attack_mul = e.consts.attack as f32 / 100.0 * v;
                    return Ok(true);
                }
                let v = target.i32(vm, world, tag, exprs, 0)?;
                let e = world.get_mut(target.id)?;
                match op {
                    VitalOp::LifeSet => e.set_life(v),
                    VitalOp::PowerAdd => e.set_power(e.power.saturating_add(v)),
                    VitalOp::PowerSet => e.set_power(v),
                    VitalOp::AttackMulSet => {}
                }
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

/// Sets the multiplier applied to the target's defence. `multype` 0
/// divides by `value` instead; a zero divisor leaves the multiplier alone.
pub(super) fn defence_mul_set(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::defence_mul_set::*;

    let mut target = Target::new(entity);
    let mut value = 1.0f32;
    let mut on_hit = false;
    let mut mul_type = 1;
    let finished = args.walk(|tag, exprs| {
        match tag {
            VALUE => value = target.f32(vm, world, tag, exprs, 0)?,
            ON_HIT => on_hit = target.bool(vm, world, tag, exprs, 0)?,
            MUL_TYPE => mul_type = target.i32(vm, world, tag, exprs, 0)?,
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    if !finished {
        return Ok(false);
    }

    let mul = if mul_type != 0 { value } else { 1.0 / value };
    let e = world.get_mut(target.id)?;
    if mul.is_finite() {
        e.defence_mul = mul;
    }
    e.defence_mul_on_hit = on_hit;
    Ok(false)
}

pub(super) fn hit_add(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    let mut target = Target::new(entity);
    args.walk(|tag, exprs| {
        match tag {
            tags::hit_add::VALUE => {
                let n = target.i32(vm, world, tag, exprs, 0)?;
                world.get_mut(target.id)?.add_hits(n);
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

pub(super) fn move_hit_reset(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    let mut target = Target::new(entity);
    args.walk(|tag, exprs| {
        match tag {
            tags::move_hit_reset::RESET => world.get_mut(target.id)?.clear_move_hit(),
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}
