//! Helper, explod and projectile controllers

use super::args::{nth, text, ArgBlock, Target};
use super::tags::{self, REDIRECT_ID};
use crate::entity::{EntityId, Explod, Projectile, StateRequest};
use crate::value::RuntimeError;
use crate::vm::VM;
use crate::world::World;
use tracing::debug;

/// Spawns a helper under the running entity (or under the redirect target,
/// when the first record is a redirect).
///
/// The helper exists from the first record on, so field tags write straight
/// into it. Position and facing are resolved against the parent afterwards,
/// and the helper enters `stateno` on its first turn.
pub(super) fn helper(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::helper::*;

    let mut target = Target::new(entity);
    let mut spawned = None;
    let mut state = 0;
    let mut offset = [0.0f32; 2];
    let mut facing = 1;
    args.walk(|tag, exprs| {
        let h = match spawned {
            Some(h) => h,
            None => {
                if tag == REDIRECT_ID && !target.redirect(vm, world, exprs)? {
                    return Ok(false);
                }
                let Some(h) = world.spawn_helper(target.id, "helper") else {
                    debug!(parent = %target.id, "helper limit reached");
                    return Ok(false);
                };
                spawned = Some(h);
                if tag == REDIRECT_ID {
                    return Ok(true);
                }
                h
            }
        };
        match tag {
            NAME => world.get_mut(h)?.name = text(nth(tag, exprs, 0)?).into_owned(),
            ID => {
                let id = target.i32(vm, world, tag, exprs, 0)?;
                world.get_mut(h)?.helper_id = id;
            }
            STATENO => state = target.i32(vm, world, tag, exprs, 0)?,
            POS => {
                offset[0] = target.f32(vm, world, tag, exprs, 0)? * target.ratio;
                if let Some(y) = target.opt_f32(vm, world, exprs, 1)? {
                    offset[1] = y * target.ratio;
                }
            }
            FACING => facing = target.i32(vm, world, tag, exprs, 0)?,
            SIZE_SCALE => {
                let x = target.f32(vm, world, tag, exprs, 0)?;
                let y = target.opt_f32(vm, world, exprs, 1)?;
                let consts = &mut world.get_mut(h)?.consts;
                consts.x_scale = x;
                consts.y_scale = y.unwrap_or(x);
            }
            OWNPAL => {
                target.bool(vm, world, tag, exprs, 0)?;
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;

    let Some(h) = spawned else {
        return Ok(false);
    };
    let parent = world.get(target.id)?;
    let (pos, parent_facing) = (parent.pos, parent.facing);
    let e = world.get_mut(h)?;
    e.pos[0] = pos[0] + offset[0] * parent_facing;
    e.pos[1] = pos[1] + offset[1];
    e.facing = if facing < 0 {
        -parent_facing
    } else {
        parent_facing
    };
    e.request_state(StateRequest::to(state));
    debug!(helper = %h, parent = %target.id, state, "helper spawned");
    Ok(false)
}

/// Attaches a visual-effect record to the target.
pub(super) fn explod(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::explod::*;

    let mut target = Target::new(entity);
    let mut explod = Explod::default();
    let mut facing = 1;
    let finished = args.walk(|tag, exprs| {
        match tag {
            ANIM => explod.anim = target.i32(vm, world, tag, exprs, 0)?,
            ID => explod.id = target.i32(vm, world, tag, exprs, 0)?,
            POS => {
                explod.pos[0] = target.f32(vm, world, tag, exprs, 0)? * target.ratio;
                if let Some(y) = target.opt_f32(vm, world, exprs, 1)? {
                    explod.pos[1] = y * target.ratio;
                }
            }
            FACING => facing = target.i32(vm, world, tag, exprs, 0)?,
            REMOVE_TIME => explod.remove_time = target.i32(vm, world, tag, exprs, 0)?,
            SCALE => {
                let x = target.f32(vm, world, tag, exprs, 0)?;
                let y = target.opt_f32(vm, world, exprs, 1)?;
                explod.scale = [x, y.unwrap_or(x)];
            }
            BIND_TIME => explod.bind_time = target.i32(vm, world, tag, exprs, 0)?,
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    if finished {
        let e = world.get_mut(target.id)?;
        explod.facing = if facing < 0 { -e.facing } else { e.facing };
        e.explods.push(explod);
    }
    Ok(false)
}

/// Reads `x[, y]` into `dst`, multiplying both by `scale`. A missing `y`
/// keeps its current value.
fn read_pair(
    target: &Target,
    vm: &mut VM,
    world: &mut dyn World,
    tag: u8,
    exprs: &[&[u8]],
    dst: &mut [f32; 2],
    scale: f32,
) -> Result<(), RuntimeError> {
    dst[0] = target.f32(vm, world, tag, exprs, 0)? * scale;
    if let Some(y) = target.opt_f32(vm, world, exprs, 1)? {
        dst[1] = y * scale;
    }
    Ok(())
}

/// Changes every explod of the target matching `id` (-1 = all). The id and
/// redirect records come first; the walk stops at the first field tag that
/// finds nothing to change.
pub(super) fn modify_explod(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::explod::*;

    let mut target = Target::new(entity);
    let mut id = -1;
    args.walk(|tag, exprs| {
        match tag {
            ID => {
                id = target.i32(vm, world, tag, exprs, 0)?;
                return Ok(true);
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        if world.get(target.id)?.explod_count(id) == 0 {
            return Ok(false);
        }
        match tag {
            ANIM => {
                let anim = target.i32(vm, world, tag, exprs, 0)?;
                world.get_mut(target.id)?.explods_mut(id).for_each(|e| e.anim = anim);
            }
            POS => {
                let x = target.f32(vm, world, tag, exprs, 0)? * target.ratio;
                let y = target.opt_f32(vm, world, exprs, 1)?.map(|y| y * target.ratio);
                for e in world.get_mut(target.id)?.explods_mut(id) {
                    e.pos[0] = x;
                    if let Some(y) = y {
                        e.pos[1] = y;
                    }
                }
            }
            FACING => {
                let f = target.i32(vm, world, tag, exprs, 0)?;
                let owner = world.get_mut(target.id)?;
                let facing = if f < 0 { -owner.facing } else { owner.facing };
                owner.explods_mut(id).for_each(|e| e.facing = facing);
            }
            SCALE => {
                let x = target.f32(vm, world, tag, exprs, 0)?;
                let y = target.opt_f32(vm, world, exprs, 1)?.unwrap_or(x);
                world.get_mut(target.id)?.explods_mut(id).for_each(|e| e.scale = [x, y]);
            }
            REMOVE_TIME => {
                let time = target.i32(vm, world, tag, exprs, 0)?;
                world.get_mut(target.id)?.explods_mut(id).for_each(|e| e.remove_time = time);
            }
            BIND_TIME => {
                let time = target.i32(vm, world, tag, exprs, 0)?;
                world.get_mut(target.id)?.explods_mut(id).for_each(|e| e.bind_time = time);
            }
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

pub(super) fn explod_bind_time(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::explod_bind_time::*;

    let mut target = Target::new(entity);
    let (mut id, mut time) = (-1, 0);
    let finished = args.walk(|tag, exprs| {
        match tag {
            ID => id = target.i32(vm, world, tag, exprs, 0)?,
            TIME => time = target.i32(vm, world, tag, exprs, 0)?,
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    if finished {
        world.get_mut(target.id)?.explods_mut(id).for_each(|e| e.bind_time = time);
    }
    Ok(false)
}

/// Fires a projectile from the running entity, or from the redirect target
/// when the first record is a redirect. Redirects after the first record
/// are ignored.
///
/// Offsets and velocities are in the owner's coordinates; multipliers and
/// scale are not. An unset removal animation falls back to the hit
/// animation, and an unset cancel animation to the removal one.
pub(super) fn projectile(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::projectile::*;

    let mut target = Target::new(entity);
    let mut p = Projectile::default();
    let mut offset = [0.0f32; 2];
    let mut first = true;
    let finished = args.walk(|tag, exprs| {
        if tag == REDIRECT_ID {
            if !std::mem::take(&mut first) {
                return Ok(true);
            }
            return target.redirect(vm, world, exprs);
        }
        first = false;
        let ratio = target.ratio;
        match tag {
            ID => p.id = target.i32(vm, world, tag, exprs, 0)?,
            ANIM => p.anim = target.i32(vm, world, tag, exprs, 0)?,
            HIT_ANIM => p.hit_anim = target.i32(vm, world, tag, exprs, 0)?,
            REM_ANIM => p.rem_anim = target.i32(vm, world, tag, exprs, 0)?,
            CANCEL_ANIM => p.cancel_anim = target.i32(vm, world, tag, exprs, 0)?,
            OFFSET => read_pair(&target, vm, world, tag, exprs, &mut offset, ratio)?,
            VELOCITY => read_pair(&target, vm, world, tag, exprs, &mut p.velocity, ratio)?,
            VEL_MUL => read_pair(&target, vm, world, tag, exprs, &mut p.vel_mul, 1.0)?,
            REM_VELOCITY => {
                read_pair(&target, vm, world, tag, exprs, &mut p.rem_velocity, ratio)?
            }
            ACCEL => read_pair(&target, vm, world, tag, exprs, &mut p.accel, ratio)?,
            SCALE => read_pair(&target, vm, world, tag, exprs, &mut p.scale, 1.0)?,
            ANGLE => p.angle = target.f32(vm, world, tag, exprs, 0)?,
            REMOVE_TIME => p.remove_time = target.i32(vm, world, tag, exprs, 0)?,
            MISS_TIME => p.miss_time = target.i32(vm, world, tag, exprs, 0)?,
            HITS => p.hits = target.i32(vm, world, tag, exprs, 0)?,
            PRIORITY => p.priority = target.i32(vm, world, tag, exprs, 0)?,
            SPR_PRIORITY => p.spr_priority = target.i32(vm, world, tag, exprs, 0)?,
            _ => {}
        }
        Ok(true)
    })?;
    if !finished {
        return Ok(false);
    }

    if p.rem_anim == -1 {
        p.rem_anim = p.hit_anim;
    }
    if p.cancel_anim == -1 {
        p.cancel_anim = p.rem_anim;
    }
    let owner = world.get_mut(target.id)?;
    p.facing = owner.facing;
    p.pos = [
        owner.pos[0] + offset[0] * owner.facing,
        owner.pos[1] + offset[1],
    ];
    debug!(owner = %target.id, id = p.id, anim = p.anim, "projectile fired");
    owner.projectiles.push(p);
    Ok(false)
}

pub(super) fn remove_explod(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    let mut target = Target::new(entity);
    let mut id = -1;
    let finished = args.walk(|tag, exprs| {
        match tag {
            tags::remove_explod::ID => id = target.i32(vm, world, tag, exprs, 0)?,
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    if finished {
        world.get_mut(target.id)?.remove_explods(id);
    }
    Ok(false)
}
