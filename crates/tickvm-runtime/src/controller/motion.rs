//! Position, velocity, rotation and binding controllers
//!
//! Horizontal velocity is stored relative to facing. Positional values are
//! scaled into the target's coordinates after a redirect; multipliers are not.

use super::args::{ArgBlock, Target, Victims};
use super::tags::{self, REDIRECT_ID};
use crate::entity::{Binding, Entity, EntityId};
use crate::value::RuntimeError;
use crate::vm::VM;
use crate::world::World;

/// Effect of a vector controller on one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorOp {
    PosSet,
    PosAdd,
    VelSet,
    VelAdd,
    VelMul,
}

impl VectorOp {
    fn apply(self, e: &mut Entity, axis: usize, v: f32) {
        match self {
            VectorOp::PosSet => e.pos[axis] = v,
            VectorOp::PosAdd if axis == 0 => e.pos[0] += v * e.facing,
            VectorOp::PosAdd => e.pos[axis] += v,
            VectorOp::VelSet => e.vel[axis] = v,
            VectorOp::VelAdd => e.vel[axis] += v,
            VectorOp::VelMul => e.vel[axis] *= v,
        }
    }

    fn scales(self) -> bool {
        !matches!(self, VectorOp::VelMul)
    }
}

pub(super) fn vector(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
    op: VectorOp,
) -> Result<bool, RuntimeError> {
    use tags::vector::*;

    let mut target = Target::new(entity);
    args.walk(|tag, exprs| {
        let axis = match tag {
            X => 0,
            Y => 1,
            Z => 2,
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => return Ok(true),
        };
        let mut v = target.f32(vm, world, tag, exprs, 0)?;
        if op.scales() {
            v *= target.ratio;
        }
        op.apply(world.get_mut(target.id)?, axis, v);
        Ok(true)
    })?;
    Ok(false)
}

/// VelSet or VelAdd on every selected target of the running entity
pub(super) fn target_vel(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
    op: VectorOp,
) -> Result<bool, RuntimeError> {
    use tags::target_vel::*;

    let mut victims = Victims::new(world, entity);
    args.walk(|tag, exprs| {
        let axis = match tag {
            ID => return victims.select(vm, world, tag, exprs),
            X => 0,
            Y => 1,
            REDIRECT_ID => return victims.redirect(vm, world, exprs),
            _ => return Ok(true),
        };
        if victims.is_empty() {
            return Ok(false);
        }
        let v = victims.attacker.f32(vm, world, tag, exprs, 0)? * victims.attacker.ratio;
        for &t in &victims.ids {
            op.apply(world.get_mut(t)?, axis, v);
        }
        Ok(true)
    })?;
    Ok(false)
}

pub(super) fn pos_freeze(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    let mut target = Target::new(entity);
    args.walk(|tag, exprs| {
        match tag {
            tags::pos_freeze::VALUE => {
                if target.bool(vm, world, tag, exprs, 0)? {
                    world.get_mut(target.id)?.pos_freeze = true;
                }
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

/// Which relative a bind controller locks onto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Parent,
    Root,
}

/// Binds the target to its parent or root for `time` ticks (default 1;
/// 0 releases). Without that relative the controller does nothing.
pub(super) fn bind(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
    anchor: Anchor,
) -> Result<bool, RuntimeError> {
    use tags::bind::*;

    let mut target = Target::new(entity);
    let mut time = 1;
    let mut facing = None;
    let mut offset = [0.0f32; 2];
    let finished = args.walk(|tag, exprs| {
        match tag {
            TIME => time = target.i32(vm, world, tag, exprs, 0)?,
            FACING => {
                let f = target.i32(vm, world, tag, exprs, 0)?;
                if f != 0 {
                    facing = Some(f.signum() as f32);
                }
            }
            POS => {
                offset[0] = target.f32(vm, world, tag, exprs, 0)? * target.ratio;
                if let Some(y) = target.opt_f32(vm, world, exprs, 1)? {
                    offset[1] = y * target.ratio;
                }
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    if !finished {
        return Ok(false);
    }

    let to = match anchor {
        Anchor::Parent => world.parent(target.id),
        Anchor::Root => world.root(target.id),
    };
    let Some(to) = to else {
        return Ok(false);
    };
    world.get_mut(target.id)?.binding = (time != 0).then_some(Binding {
        to,
        time,
        offset,
        facing,
    });
    Ok(false)
}

pub(super) fn gravity(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    let mut target = Target::new(entity);
    args.walk(|tag, exprs| {
        match tag {
            tags::gravity::GRAVITY => {
                let e = world.get_mut(target.id)?;
                e.vel[1] += e.consts.y_accel;
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleOp {
    Set,
    Add,
    Mul,
}

/// Rotation in degrees. A missing value counts as 0.
pub(super) fn angle(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
    op: AngleOp,
) -> Result<bool, RuntimeError> {
    let mut target = Target::new(entity);
    let mut value = 0.0;
    let finished = args.walk(|tag, exprs| {
        match tag {
            tags::angle::VALUE => value = target.f32(vm, world, tag, exprs, 0)?,
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    if finished {
        let e = world.get_mut(target.id)?;
        e.angle = match op {
            AngleOp::Set => value,
            AngleOp::Add => e.angle + value,
            AngleOp::Mul => e.angle * value,
        };
    }
    Ok(false)
}
