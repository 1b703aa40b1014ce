//! State, animation and control controllers, including those applied to
//! the running entity's targets

use super::args::{targets_of, ArgBlock, Target, Victims};
use super::tags::{self, REDIRECT_ID};
use crate::entity::{EntityId, MoveType, Physics, StateRequest, StateType};
use crate::value::RuntimeError;
use crate::vm::VM;
use crate::world::World;
use tracing::debug;

/// Requests a state change. With `reset_owner` the state is taken from the
/// target's own library (or the one named by `readplayerid`).
///
/// Returns true when the running entity must stop executing its current
/// state: always, unless the change went to another entity or `continue`
/// says otherwise.
pub(super) fn change_state(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
    reset_owner: bool,
) -> Result<bool, RuntimeError> {
    use tags::change_state::*;

    let mut target = Target::new(entity);
    let mut number = None;
    let mut anim = None;
    let mut ctrl = None;
    let mut owner = None;
    let mut stop = true;
    let finished = args.walk(|tag, exprs| {
        match tag {
            VALUE => number = Some(target.i32(vm, world, tag, exprs, 0)?),
            CTRL => ctrl = Some(target.bool(vm, world, tag, exprs, 0)?),
            ANIM => anim = Some(target.i32(vm, world, tag, exprs, 0)?),
            CONTINUE => stop = !target.bool(vm, world, tag, exprs, 0)?,
            READ_PLAYER_ID if reset_owner => {
                let script_id = target.i32(vm, world, tag, exprs, 0)?;
                match world.player_id(script_id) {
                    Some(id) => owner = Some(world.get(id)?.player_no),
                    None => return Ok(false),
                }
            }
            REDIRECT_ID => {
                if !target.redirect(vm, world, exprs)? {
                    return Ok(false);
                }
                stop = false;
            }
            _ => {}
        }
        Ok(true)
    })?;
    let Some(number) = number.filter(|_| finished) else {
        return Ok(false);
    };

    let e = world.get_mut(target.id)?;
    if reset_owner && owner.is_none() {
        owner = Some(e.player_no);
    }
    debug!(entity = %target.id, from = e.state.number, to = number, "state change requested");
    e.request_state(StateRequest {
        number,
        anim,
        ctrl,
        owner,
    });
    Ok(stop)
}

pub(super) fn state_type_set(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::state_type_set::*;

    let mut target = Target::new(entity);
    args.walk(|tag, exprs| {
        match tag {
            STATE_TYPE => {
                let code = target.i32(vm, world, tag, exprs, 0)?;
                if let Some(t) = StateType::from_code(code as u8) {
                    world.get_mut(target.id)?.state.state_type = t;
                }
            }
            MOVE_TYPE => {
                let code = target.i32(vm, world, tag, exprs, 0)?;
                if let Some(t) = MoveType::from_code(code as u8) {
                    world.get_mut(target.id)?.set_move_type(t);
                }
            }
            PHYSICS => {
                let code = target.i32(vm, world, tag, exprs, 0)?;
                if let Some(p) = Physics::from_code(code as u8) {
                    world.get_mut(target.id)?.state.physics = p;
                }
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

/// Switches animation. `elem` must come before `value` to take effect.
pub(super) fn change_anim(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::change_anim::*;

    let mut target = Target::new(entity);
    let mut elem = None;
    args.walk(|tag, exprs| {
        match tag {
            ELEM => elem = Some(target.i32(vm, world, tag, exprs, 0)?),
            VALUE => {
                let anim = target.i32(vm, world, tag, exprs, 0)?;
                world.get_mut(target.id)?.set_anim(anim, elem.unwrap_or(1));
            }
            // Animations are not loaded here, so the source library is moot;
            // an unknown player still aborts the controller.
            READ_PLAYER_ID => {
                let script_id = target.i32(vm, world, tag, exprs, 0)?;
                if world.player_id(script_id).is_none() {
                    return Ok(false);
                }
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

pub(super) fn ctrl_set(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    let mut target = Target::new(entity);
    args.walk(|tag, exprs| {
        match tag {
            tags::ctrl_set::VALUE => {
                let ctrl = target.bool(vm, world, tag, exprs, 0)?;
                world.get_mut(target.id)?.ctrl = ctrl;
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

pub(super) fn turn(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    let mut target = Target::new(entity);
    args.walk(|tag, exprs| {
        match tag {
            tags::turn::TURN => {
                let e = world.get_mut(target.id)?;
                e.facing = -e.facing;
            }
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

/// Puts the targets into a state of the attacker's library.
pub(super) fn target_state(
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
                let number = victims.attacker.i32(vm, world, tag, exprs, 0)?;
                let owner = world.get(victims.attacker.id)?.player_no;
                for &t in &victims.ids {
                    debug!(
                        attacker = %victims.attacker.id,
                        target = %t,
                        to = number,
                        "target state change"
                    );
                    world.get_mut(t)?.request_state(StateRequest {
                        owner: Some(owner),
                        ..StateRequest::to(number)
                    });
                }
            }
            REDIRECT_ID => return victims.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

/// Turns the targets like the attacker (positive value) or away from it
/// (negative value).
pub(super) fn target_facing(
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
                let dir = victims.attacker.i32(vm, world, tag, exprs, 0)?;
                let facing = world.get(victims.attacker.id)?.facing;
                if dir != 0 {
                    for &t in &victims.ids {
                        world.get_mut(t)?.facing = facing * dir.signum() as f32;
                    }
                }
            }
            REDIRECT_ID => return victims.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    Ok(false)
}

/// Forgets targets. Only those whose script id is `excludeid` are kept
/// (-1 keeps all); with `keepone` a single random survivor remains.
pub(super) fn target_drop(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::target_drop::*;

    let mut victims = Victims::new(world, entity);
    let mut exclude = -1;
    let mut keep_one = true;
    let finished = args.walk(|tag, exprs| {
        match tag {
            EXCLUDE_ID => exclude = victims.attacker.i32(vm, world, tag, exprs, 0)?,
            KEEP_ONE => keep_one = victims.attacker.bool(vm, world, tag, exprs, 0)?,
            REDIRECT_ID => return victims.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    if !finished || victims.is_empty() {
        return Ok(false);
    }

    let mut kept = targets_of(world, victims.attacker.id, exclude);
    if keep_one && kept.len() > 1 {
        let pick = world.random_range(0, kept.len() as i32 - 1) as usize;
        kept = vec![kept[pick]];
    }
    debug!(attacker = %victims.attacker.id, kept = kept.len(), "targets dropped");
    world.get_mut(victims.attacker.id)?.targets = kept;
    Ok(false)
}

/// Removes a helper. Returns true when the running entity is the one removed.
pub(super) fn destroy_self(
    vm: &mut VM,
    world: &mut dyn World,
    entity: EntityId,
    args: &ArgBlock,
) -> Result<bool, RuntimeError> {
    use tags::destroy_self::*;

    let mut target = Target::new(entity);
    let mut recursive = false;
    let mut remove_explods = false;
    let finished = args.walk(|tag, exprs| {
        match tag {
            RECURSIVE => recursive = target.bool(vm, world, tag, exprs, 0)?,
            REMOVE_EXPLODS => remove_explods = target.bool(vm, world, tag, exprs, 0)?,
            REDIRECT_ID => return target.redirect(vm, world, exprs),
            _ => {}
        }
        Ok(true)
    })?;
    if !finished {
        return Ok(false);
    }

    let e = world.get_mut(target.id)?;
    if !e.is_helper {
        return Ok(false);
    }
    if remove_explods {
        e.remove_explods(-1);
    }
    debug!(entity = %target.id, recursive, "helper destroyed");
    let destroyed = world.destroy(target.id, recursive);
    Ok(destroyed && !target.is_redirected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Expression;
    use crate::controller::Controller;
    use crate::entity::BlockMemory;
    use crate::world::Roster;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn duel() -> (Roster, EntityId, EntityId) {
        let mut roster = Roster::with_seed(0);
        let p1 = roster.add_player(1, "kfm");
        let p2 = roster.add_player(2, "kfm");
        (roster, p1, p2)
    }

    fn run(c: &Controller, roster: &mut Roster, entity: EntityId) -> bool {
        c.run(&mut VM::new(), roster, entity, &mut BlockMemory::default())
            .unwrap()
    }

    #[test]
    fn test_change_state_stops_the_running_state() {
        let (mut roster, p1, _) = duel();
        let c = Controller::ChangeState(
            ArgBlock::new()
                .with(tags::change_state::VALUE, &[Expression::int(200)])
                .with(tags::change_state::CTRL, &[Expression::int(0)]),
        );
        assert!(run(&c, &mut roster, p1));
        let request = roster.entity(p1).unwrap().pending_state.unwrap();
        assert_eq!(request.number, 200);
        assert_eq!(request.ctrl, Some(false));
        assert_eq!(request.owner, None);
    }

    #[test]
    fn test_change_state_continue() {
        let (mut roster, p1, _) = duel();
        let c = Controller::ChangeState(
            ArgBlock::new()
                .with(tags::change_state::VALUE, &[Expression::int(5)])
                .with(tags::change_state::CONTINUE, &[Expression::int(1)]),
        );
        assert!(!run(&c, &mut roster, p1));
        assert!(roster.entity(p1).unwrap().pending_state.is_some());
    }

    #[test]
    fn test_redirected_change_state_keeps_running() {
        let (mut roster, p1, p2) = duel();
        let p2_id = roster.entity(p2).unwrap().id;
        let c = Controller::ChangeState(
            ArgBlock::new()
                .redirect(Expression::int(p2_id))
                .with(tags::change_state::VALUE, &[Expression::int(5050)]),
        );
        assert!(!run(&c, &mut roster, p1));
        assert!(roster.entity(p1).unwrap().pending_state.is_none());
        assert_eq!(roster.entity(p2).unwrap().pending_state.unwrap().number, 5050);
    }

    #[test]
    fn test_failed_redirect_skips_remaining_tags() {
        let (mut roster, p1, _) = duel();
        let c = Controller::ChangeState(
            ArgBlock::new()
                .redirect(Expression::int(9999))
                .with(tags::change_state::VALUE, &[Expression::int(5)]),
        );
        assert!(!run(&c, &mut roster, p1));
        assert!(roster.entity(p1).unwrap().pending_state.is_none());
    }

    #[test]
    fn test_self_state_resets_owner() {
        let (mut roster, p1, p2) = duel();
        let c = Controller::SelfState(
            ArgBlock::new().with(tags::self_state::VALUE, &[Expression::int(0)]),
        );
        roster.entity_mut(p2).unwrap().state.owner = 1;
        assert!(run(&c, &mut roster, p2));
        assert_eq!(roster.entity(p2).unwrap().pending_state.unwrap().owner, Some(2));

        let p2_id = roster.entity(p2).unwrap().id;
        let c = Controller::SelfState(
            ArgBlock::new()
                .with(tags::self_state::READ_PLAYER_ID, &[Expression::int(p2_id)])
                .with(tags::self_state::VALUE, &[Expression::int(0)]),
        );
        assert!(run(&c, &mut roster, p1));
        assert_eq!(roster.entity(p1).unwrap().pending_state.unwrap().owner, Some(2));
    }

    #[test]
    fn test_state_type_set_records_previous_move_type() {
        let (mut roster, p1, _) = duel();
        let c = Controller::StateTypeSet(
            ArgBlock::new()
                .with(tags::state_type_set::STATE_TYPE, &[Expression::int(4)])
                .with(tags::state_type_set::MOVE_TYPE, &[Expression::int(2)])
                .with(tags::state_type_set::PHYSICS, &[Expression::int(99)]),
        );
        assert!(!run(&c, &mut roster, p1));
        let state = &roster.entity(p1).unwrap().state;
        assert_eq!(state.state_type, StateType::Air);
        assert_eq!(state.move_type, MoveType::Attack);
        assert_eq!(state.prev_move_type, MoveType::Idle);
        assert_eq!(state.physics, Physics::Standing);
    }

    #[test]
    fn test_change_anim_with_elem() {
        let (mut roster, p1, _) = duel();
        let c = Controller::ChangeAnim(
            ArgBlock::new()
                .with(tags::change_anim::ELEM, &[Expression::int(3)])
                .with(tags::change_anim::VALUE, &[Expression::int(120)]),
        );
        run(&c, &mut roster, p1);
        let e = roster.entity(p1).unwrap();
        assert_eq!((e.anim, e.anim_elem), (120, 3));
    }

    #[test]
    fn test_turn_and_ctrl() {
        let (mut roster, p1, _) = duel();
        run(
            &Controller::Turn(ArgBlock::new().with(tags::turn::TURN, &[])),
            &mut roster,
            p1,
        );
        run(
            &Controller::CtrlSet(ArgBlock::new().with(tags::ctrl_set::VALUE, &[Expression::int(0)])),
            &mut roster,
            p1,
        );
        let e = roster.entity(p1).unwrap();
        assert_eq!(e.facing, -1.0);
        assert!(!e.ctrl);
    }

    fn versus_with_targets() -> (Roster, EntityId, EntityId, EntityId) {
        let (mut roster, p1, p2) = duel();
        let h = roster.spawn_helper(p2, "fx").unwrap();
        roster.entity_mut(p1).unwrap().targets = vec![p2, h];
        (roster, p1, p2, h)
    }

    #[test]
    fn test_target_state_uses_attacker_library() {
        let (mut roster, p1, p2, h) = versus_with_targets();
        let h_id = roster.entity(h).unwrap().id;
        let c = Controller::TargetState(
            ArgBlock::new()
                .with(tags::target_value::ID, &[Expression::int(h_id)])
                .with(tags::target_value::VALUE, &[Expression::int(888)]),
        );
        assert!(!run(&c, &mut roster, p1));
        assert!(roster.entity(p2).unwrap().pending_state.is_none());
        let request = roster.entity(h).unwrap().pending_state.unwrap();
        assert_eq!(request.number, 888);
        assert_eq!(request.owner, Some(1));
        assert!(roster.entity(p1).unwrap().pending_state.is_none());
    }

    #[test]
    fn test_target_state_without_targets() {
        let (mut roster, p1, p2) = duel();
        let c = Controller::TargetState(
            ArgBlock::new().with(tags::target_value::VALUE, &[Expression::int(888)]),
        );
        assert!(!run(&c, &mut roster, p1));
        assert!(roster.entity(p2).unwrap().pending_state.is_none());
    }

    #[rstest]
    #[case::same_way(1, 1.0)]
    #[case::away(-5, -1.0)]
    #[case::unchanged(0, -1.0)]
    fn test_target_facing(#[case] value: i32, #[case] expected: f32) {
        let (mut roster, p1, p2, _) = versus_with_targets();
        roster.entity_mut(p2).unwrap().facing = -1.0;
        let c = Controller::TargetFacing(
            ArgBlock::new().with(tags::target_value::VALUE, &[Expression::int(value)]),
        );
        run(&c, &mut roster, p1);
        assert_eq!(roster.entity(p2).unwrap().facing, expected);
    }

    #[test]
    fn test_target_drop_exclude_id() {
        let (mut roster, p1, _, h) = versus_with_targets();
        let h_id = roster.entity(h).unwrap().id;
        let c = Controller::TargetDrop(
            ArgBlock::new()
                .with(tags::target_drop::EXCLUDE_ID, &[Expression::int(h_id)])
                .with(tags::target_drop::KEEP_ONE, &[Expression::int(0)]),
        );
        run(&c, &mut roster, p1);
        assert_eq!(roster.entity(p1).unwrap().targets, vec![h]);
    }

    #[test]
    fn test_target_drop_keeps_one() {
        let (mut roster, p1, p2, h) = versus_with_targets();
        run(&Controller::TargetDrop(ArgBlock::new()), &mut roster, p1);
        let targets = &roster.entity(p1).unwrap().targets;
        assert_eq!(targets.len(), 1);
        assert!(targets[0] == p2 || targets[0] == h);
    }

    #[test]
    fn test_target_drop_redirected() {
        let (mut roster, p1, p2, _) = versus_with_targets();
        let p1_id = roster.entity(p1).unwrap().id;
        let c = Controller::TargetDrop(
            ArgBlock::new()
                .redirect(Expression::int(p1_id))
                .with(tags::target_drop::EXCLUDE_ID, &[Expression::int(9999)]),
        );
        run(&c, &mut roster, p2);
        assert!(roster.entity(p1).unwrap().targets.is_empty());
    }

    #[test]
    fn test_destroy_self_only_removes_helpers() {
        let (mut roster, p1, _) = duel();
        let c = Controller::DestroySelf(ArgBlock::new());
        assert!(!run(&c, &mut roster, p1));
        assert!(roster.entity(p1).is_some());

        let helper = roster.spawn_helper(p1, "fx").unwrap();
        let grandchild = roster.spawn_helper(helper, "spark").unwrap();
        let c = Controller::DestroySelf(
            ArgBlock::new().with(tags::destroy_self::RECURSIVE, &[Expression::int(1)]),
        );
        assert!(run(&c, &mut roster, helper));
        assert!(roster.entity(helper).is_none());
        assert!(roster.entity(grandchild).is_none());
    }
}
