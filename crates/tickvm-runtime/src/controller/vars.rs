//! Variable and map controllers

use super::args::{nth, text, ArgBlock, Target};
use super::tags::{self, REDIRECT_ID};
use crate::entity::{EntityId, MapOp, NUM_FVAR, NUM_VAR};
use crate::value::RuntimeError;
use crate::vm::VM;
use crate::world::World;

/// Runs a store expression on the target. Unlike other controllers the
/// expression sees the redirected entity, not the caller.
pub(super) fn var_set(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    let mut target = Target::new(entity);
    args.walk(|tag, exprs| {
        match tag {
            tags::var_set::ASSIGN => {
                vm.eval(world, nth(tag, exprs, 0)?, target.id)?;
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

/// Fills `first..=last` of the integer or float variables. Ranges reaching
/// outside the array are ignored.
pub(super) fn var_range_set(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::var_range_set::*;

    let mut target = Target::new(entity);
    let mut first = 0;
    let mut last = 0;
    args.walk(|tag, exprs| {
        match tag {
            FIRST => first = target.i32(vm, world, tag, exprs, 0)?,
            LAST => last = target.i32(vm, world, tag, exprs, 0)?,
            VALUE => {
                let v = target.i32(vm, world, tag, exprs, 0)?;
                if first >= 0 && last < NUM_VAR as i32 {
                    let e = world.get_mut(target.id)?;
                    for i in first..=last {
                        e.set_var(i, v);
                    }
                }
            }
            FVALUE => {
                let v = target.f32(vm, world, tag, exprs, 0)?;
                if first >= 0 && last < NUM_FVAR as i32 {
                    let e = world.get_mut(target.id)?;
                    for i in first..=last {
                        e.set_fvar(i, v);
                    }
                }
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

/// Stores a random integer in `var(v)`. `range` takes `max` or `min, max`
/// (inclusive); the default is `0, 1000`.
pub(super) fn var_random(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::var_random::*;

    let mut target = Target::new(entity);
    let mut index = 0;
    let (mut lo, mut hi) = (0, 1000);
    let finished = args.walk(|tag, exprs| {
        match tag {
            V => index = target.i32(vm, world, tag, exprs, 0)?,
            RANGE => {
                let a = target.i32(vm, world, tag, exprs, 0)?;
                match target.opt_i32(vm, world, exprs, 1)? {
                    Some(b) => (lo, hi) = (a, b),
                    None => (lo, hi) = (0, a),
                }
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    if finished {
        let v = world.random_range(lo, hi);
        world.get_mut(target.id)?.set_var(index, v);
    }
    Ok(false)
}

pub(super) fn map_set(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::map_set::*;

    let mut target = Target::new(entity);
    let mut name = String::new();
    let mut value = 0.0;
    let mut mode = MapOp::Set;
    let finished = args.walk(|tag, exprs| {
        match tag {
            MAP => name = text(nth(tag, exprs, 0)?).into_owned(),
            VALUE => value = target.f32(vm, world, tag, exprs, 0)?,
            TYPE => {
                mode = match target.i32(vm, world, tag, exprs, 0)? {
                    1 => MapOp::Add,
                    _ => MapOp::Set,
                }
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    if finished && !name.is_empty() {
        world.get_mut(target.id)?.map_update(&name, value, mode);
    }
    Ok(false)
}
