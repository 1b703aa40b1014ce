//! Opcode dispatcher
//!
//! Two entity bindings are live while an expression runs:
//!
//! - `cur`, the entity reads and writes apply to. A successful redirect
//!   rebinds it for exactly the next opcode, which is normally a `Run` of the
//!   redirected sub-range.
//! - `origin`, the entity the top-level expression was started for. Positional
//!   reads are scaled into its coordinates and `UnredirectedRun` runs on it.

use super::VM;
use crate::bytecode::{
    read_f32, read_i32, read_i64, read_i8, read_nested, read_u8, ConstOp, ExtOp, Opcode, StoreOp,
};
use crate::entity::{Entity, EntityId, MapOp, MoveType, StateType};
use crate::value::{RuntimeError, Value};
use crate::world::World;

impl VM {
    /// Evaluates `code` for `entity` and returns its single result.
    pub fn eval(
        &mut self,
        world: &mut dyn World,
        code: &[u8],
        entity: EntityId,
    ) -> Result<Value, RuntimeError> {
        self.run_code(world, code, entity, entity)?;
        self.stack.pop()
    }

    pub fn eval_i32(
        &mut self,
        world: &mut dyn World,
        code: &[u8],
        entity: EntityId,
    ) -> Result<i32, RuntimeError> {
        Ok(self.eval(world, code, entity)?.to_i32())
    }

    pub fn eval_f32(
        &mut self,
        world: &mut dyn World,
        code: &[u8],
        entity: EntityId,
    ) -> Result<f32, RuntimeError> {
        Ok(self.eval(world, code, entity)?.to_f32())
    }

    pub fn eval_bool(
        &mut self,
        world: &mut dyn World,
        code: &[u8],
        entity: EntityId,
    ) -> Result<bool, RuntimeError> {
        Ok(self.eval(world, code, entity)?.to_bool())
    }

    fn run_code(
        &mut self,
        world: &mut dyn World,
        code: &[u8],
        start: EntityId,
        origin: EntityId,
    ) -> Result<(), RuntimeError> {
        let mut cur = start;
        let mut i = 0;
        while i < code.len() {
            let at = i;
            let byte = code[i];
            i += 1;
            let opcode = Opcode::try_from(byte)
                .map_err(|_| RuntimeError::UnknownOpcode { opcode: byte, offset: at })?;

            if let Some(profiler) = self.profiler.as_mut() {
                profiler.record(opcode, self.stack.len());
            }

            match opcode {
                // ===== Literals =====
                Opcode::Int8 => {
                    self.stack.push(Value::int(read_i8(code, i)? as i32));
                    i += 1;
                }
                Opcode::Int => {
                    self.stack.push(Value::int(read_i32(code, i)?));
                    i += 4;
                }
                Opcode::Int64 => {
                    self.stack.push(Value::int64(read_i64(code, i)?));
                    i += 8;
                }
                Opcode::Float => {
                    self.stack.push(Value::float(read_f32(code, i)?));
                    i += 4;
                }

                // ===== Stack =====
                Opcode::Pop => {
                    self.stack.pop()?;
                }
                Opcode::Dup => self.stack.dup()?,
                Opcode::Swap => self.stack.swap()?,

                // ===== Variables =====
                Opcode::Var => {
                    let e = world.get(cur)?;
                    let top = self.stack.top_mut()?;
                    *top = e.var(top.to_i32());
                }
                Opcode::SysVar => {
                    let e = world.get(cur)?;
                    let top = self.stack.top_mut()?;
                    *top = e.sys_var(top.to_i32());
                }
                Opcode::FVar => {
                    let e = world.get(cur)?;
                    let top = self.stack.top_mut()?;
                    *top = e.fvar(top.to_i32());
                }
                Opcode::SysFVar => {
                    let e = world.get(cur)?;
                    let top = self.stack.top_mut()?;
                    *top = e.sys_fvar(top.to_i32());
                }
                Opcode::LocalVar => {
                    let slot = read_u8(code, i)?;
                    i += 1;
                    let v = self.windows.get(slot as usize)?;
                    self.stack.push(v);
                }

                // ===== Arithmetic =====
                Opcode::Add => self.fold(Value::add)?,
                Opcode::Sub => self.fold(Value::sub)?,
                Opcode::Mul => self.fold(Value::mul)?,
                Opcode::Div => self.fold(Value::div)?,
                Opcode::Mod => self.fold(Value::rem)?,
                Opcode::Pow => {
                    let rhs = self.stack.pop()?;
                    let order = self.pow_order;
                    self.stack.top_mut()?.pow(rhs, order);
                }
                Opcode::Neg => self.stack.top_mut()?.neg(),

                // ===== Comparison =====
                Opcode::Eq => self.fold(Value::equals)?,
                Opcode::Ne => self.fold(Value::not_equals)?,
                Opcode::Gt => self.fold(Value::gt)?,
                Opcode::Ge => self.fold(Value::ge)?,
                Opcode::Lt => self.fold(Value::lt)?,
                Opcode::Le => self.fold(Value::le)?,

                // ===== Logic =====
                Opcode::BoolNot => self.stack.top_mut()?.bool_not(),
                Opcode::BoolAnd => self.fold(Value::bool_and)?,
                Opcode::BoolOr => self.fold(Value::bool_or)?,
                Opcode::BoolXor => self.fold(Value::bool_xor)?,
                Opcode::BitNot => self.stack.top_mut()?.bit_not(),
                Opcode::BitAnd => self.fold(Value::bit_and)?,
                Opcode::BitOr => self.fold(Value::bit_or)?,
                Opcode::BitXor => self.fold(Value::bit_xor)?,
                Opcode::IfElse => {
                    let otherwise = self.stack.pop()?;
                    let then = self.stack.pop()?;
                    let top = self.stack.top_mut()?;
                    *top = if top.to_bool() { then } else { otherwise };
                }

                // ===== Control flow =====
                Opcode::Jump8 => i = short_target(code, i)?,
                Opcode::JumpIfZero8 | Opcode::JumpIfNonZero8 => {
                    let cond = self.stack.pop()?.to_bool();
                    if cond == (opcode == Opcode::JumpIfNonZero8) {
                        i = short_target(code, i)?;
                    } else {
                        i += 1;
                    }
                }
                Opcode::JumpIfSentinel8 => {
                    if self.stack.top()?.is_sentinel() {
                        i = short_target(code, i)?;
                    } else {
                        i += 1;
                    }
                }
                Opcode::Jump => i = long_target(code, i)?,
                Opcode::JumpIfZero | Opcode::JumpIfNonZero => {
                    let cond = self.stack.pop()?.to_bool();
                    if cond == (opcode == Opcode::JumpIfNonZero) {
                        i = long_target(code, i)?;
                    } else {
                        i += 4;
                    }
                }
                Opcode::Run => {
                    let (body, next) = read_nested(code, i)?;
                    // The nested body treats its entry entity as the origin.
                    self.run_code(world, body, cur, cur)?;
                    i = next;
                }
                Opcode::UnredirectedRun => {
                    let (body, next) = read_nested(code, i)?;
                    self.run_code(world, body, origin, origin)?;
                    i = next;
                    // The redirect stays bound for the next opcode.
                    continue;
                }

                // ===== Math =====
                Opcode::Abs => self.stack.top_mut()?.abs(),
                Opcode::Exp => self.stack.top_mut()?.exp(),
                Opcode::Ln => self.stack.top_mut()?.ln(),
                Opcode::Log => self.fold(Value::log)?,
                Opcode::Cos => self.stack.top_mut()?.cos(),
                Opcode::Sin => self.stack.top_mut()?.sin(),
                Opcode::Tan => self.stack.top_mut()?.tan(),
                Opcode::Acos => self.stack.top_mut()?.acos(),
                Opcode::Asin => self.stack.top_mut()?.asin(),
                Opcode::Atan => self.stack.top_mut()?.atan(),
                Opcode::Floor => self.stack.top_mut()?.floor(),
                Opcode::Ceil => self.stack.top_mut()?.ceil(),
                Opcode::Random => {
                    let r = world.random_range(0, 999);
                    self.stack.push(Value::int(r));
                }

                // ===== Redirection =====
                Opcode::Player
                | Opcode::Parent
                | Opcode::Root
                | Opcode::Helper
                | Opcode::Target
                | Opcode::Partner
                | Opcode::Enemy
                | Opcode::EnemyNear
                | Opcode::PlayerId
                | Opcode::PlayerIndex
                | Opcode::HelperIndex
                | Opcode::P2
                | Opcode::StateOwner => match self.resolve_redirect(world, opcode, cur)? {
                    Some(target) => {
                        cur = target;
                        i += 4;
                        continue;
                    }
                    None => {
                        if let Some(profiler) = self.profiler.as_mut() {
                            profiler.record_failed_redirect();
                        }
                        self.stack.push(Value::SentinelFalse);
                        i = long_target(code, i)?;
                    }
                },
                Opcode::RedirectReset => {}

                // ===== Entity reads =====
                Opcode::StateTypeIs => {
                    let expected = StateType::from_code(read_u8(code, i)?);
                    i += 1;
                    let e = world.get(cur)?;
                    self.stack
                        .push(Value::Bool(expected == Some(e.state.state_type)));
                }
                Opcode::MoveTypeIs | Opcode::PrevMoveTypeIs => {
                    let expected = MoveType::from_code(read_u8(code, i)?);
                    i += 1;
                    let e = world.get(cur)?;
                    let actual = if opcode == Opcode::MoveTypeIs {
                        e.state.move_type
                    } else {
                        e.state.prev_move_type
                    };
                    self.stack.push(Value::Bool(expected == Some(actual)));
                }
                Opcode::PosX | Opcode::PosY | Opcode::VelX | Opcode::VelY => {
                    let ratio = scale_ratio(world, cur, origin)?;
                    let e = world.get(cur)?;
                    let raw = match opcode {
                        Opcode::PosX => e.pos[0],
                        Opcode::PosY => e.pos[1],
                        Opcode::VelX => e.vel[0],
                        _ => e.vel[1],
                    };
                    self.stack.push(Value::float(raw * ratio));
                }
                Opcode::IsHelper => {
                    let e = world.get(cur)?;
                    let top = self.stack.top_mut()?;
                    let id = top.to_i32();
                    *top = Value::Bool(e.is_helper && (id <= 0 || e.helper_id == id));
                }
                Opcode::NumHelper => {
                    let id = self.stack.top()?.to_i32();
                    let n = world.num_helpers(cur, id);
                    *self.stack.top_mut()? = Value::int(n);
                }
                Opcode::NumTarget => {
                    let id = self.stack.top()?.to_i32();
                    let e = world.get(cur)?;
                    let n = e
                        .targets
                        .iter()
                        .filter_map(|t| world.entity(*t))
                        .filter(|t| id < 0 || t.id == id)
                        .count();
                    *self.stack.top_mut()? = Value::int(n as i32);
                }
                Opcode::NumExplod => {
                    let e = world.get(cur)?;
                    let top = self.stack.top_mut()?;
                    *top = Value::int(e.explod_count(top.to_i32()) as i32);
                }
                Opcode::NumEnemy => {
                    world.get(cur)?;
                    self.stack.push(Value::int(world.num_enemies(cur)));
                }
                Opcode::NumPartner => {
                    world.get(cur)?;
                    self.stack.push(Value::int(world.num_partners(cur)));
                }
                Opcode::GameTime => self.stack.push(Value::int(world.game_time())),
                Opcode::RoundState => self.stack.push(Value::int(world.round_state())),
                Opcode::PlayerIdExist => {
                    let top = self.stack.top_mut()?;
                    *top = Value::Bool(world.player_id(top.to_i32()).is_some());
                }
                Opcode::Time
                | Opcode::StateNo
                | Opcode::PrevStateNo
                | Opcode::Ctrl
                | Opcode::Anim
                | Opcode::AnimElem
                | Opcode::Facing
                | Opcode::Alive
                | Opcode::Life
                | Opcode::LifeMax
                | Opcode::Power
                | Opcode::PowerMax
                | Opcode::Id
                | Opcode::HitPauseTime
                | Opcode::HitCount
                | Opcode::MoveHit
                | Opcode::MoveContact
                | Opcode::TeamSide
                | Opcode::PlayerNo => {
                    let v = entity_field(world.get(cur)?, opcode);
                    self.stack.push(v);
                }

                // ===== Pages =====
                Opcode::ConstPage => {
                    i = self.run_const(world, code, i, cur, origin)?;
                }
                Opcode::StorePage => {
                    i = self.run_store(world, code, i, cur)?;
                }
                Opcode::ExtPage => {
                    i = self.run_ext(world, code, i, cur, origin)?;
                }

            }
            cur = start;
        }
        Ok(())
    }

    /// Pops `b` and folds it into the new top.
    fn fold(&mut self, op: fn(&mut Value, Value)) -> Result<(), RuntimeError> {
        let rhs = self.stack.pop()?;
        op(self.stack.top_mut()?, rhs);
        Ok(())
    }

    /// Pops the selector, if any, and resolves the redirect target.
    fn resolve_redirect(
        &mut self,
        world: &dyn World,
        opcode: Opcode,
        cur: EntityId,
    ) -> Result<Option<EntityId>, RuntimeError> {
        let selector = if opcode.takes_selector() {
            self.stack.pop()?.to_i32()
        } else {
            0
        };
        world.get(cur)?;
        Ok(match opcode {
            Opcode::Player => world.player(selector),
            Opcode::Parent => world.parent(cur),
            Opcode::Root => world.root(cur),
            Opcode::Helper => world.helper(cur, selector),
            Opcode::Target => world.target(cur, selector),
            Opcode::Partner => world.partner(cur, selector),
            Opcode::Enemy => world.enemy(cur, selector),
            Opcode::EnemyNear => world.enemy_near(cur, selector),
            Opcode::PlayerId => world.player_id(selector),
            Opcode::PlayerIndex => world.player_index(selector),
            Opcode::HelperIndex => world.helper_index(cur, selector),
            Opcode::P2 => world.p2(cur),
            Opcode::StateOwner => world.state_owner(cur),
            _ => None,
        })
    }

    fn run_const(
        &mut self,
        world: &dyn World,
        code: &[u8],
        at: usize,
        cur: EntityId,
        origin: EntityId,
    ) -> Result<usize, RuntimeError> {
        let sub = read_u8(code, at)?;
        let op = ConstOp::try_from(sub)
            .map_err(|_| RuntimeError::UnknownOpcode { opcode: sub, offset: at })?;
        let mut next = at + 1;
        let ratio = scale_ratio(world, cur, origin)?;
        let c = &world.get(cur)?.consts;
        let v = match op {
            ConstOp::DataLife => Value::int(c.life),
            ConstOp::DataPower => Value::int(c.power),
            ConstOp::DataAttack => Value::int(c.attack),
            ConstOp::DataDefence => Value::int(c.defence),
            ConstOp::SizeXScale => Value::float(c.x_scale),
            ConstOp::SizeYScale => Value::float(c.y_scale),
            ConstOp::MovementYAccel => Value::float(c.y_accel * ratio),
            ConstOp::VelocityWalkFwdX => Value::float(c.walk_fwd_x * ratio),
            ConstOp::VelocityWalkBackX => Value::float(c.walk_back_x * ratio),
            ConstOp::VelocityJumpY => Value::float(c.jump_y * ratio),
            ConstOp::Named => {
                let name = self.strings.resolve(read_i32(code, next)?)?;
                next += 4;
                c.named
                    .get(&name.to_lowercase())
                    .map_or(Value::SentinelFalse, |&f| Value::float(f))
            }
        };
        self.stack.push(v);
        Ok(next)
    }

    fn run_store(
        &mut self,
        world: &mut dyn World,
        code: &[u8],
        at: usize,
        cur: EntityId,
    ) -> Result<usize, RuntimeError> {
        let sub = read_u8(code, at)?;
        let op = StoreOp::try_from(sub)
            .map_err(|_| RuntimeError::UnknownOpcode { opcode: sub, offset: at })?;
        let mut next = at + 1;
        let value = self.stack.pop()?;
        let e = world.get_mut(cur)?;

        let result = match op {
            StoreOp::MapSet | StoreOp::MapAdd => {
                let name = self.strings.resolve(read_i32(code, next)?)?;
                next += 4;
                let mode = if op == StoreOp::MapSet {
                    MapOp::Set
                } else {
                    MapOp::Add
                };
                Value::float(e.map_update(name, value.to_f32(), mode))
            }
            _ => {
                let index = self.stack.pop()?.to_i32();
                match op {
                    StoreOp::SetVar => e.set_var(index, value.to_i32()),
                    StoreOp::SetSysVar => e.set_sys_var(index, value.to_i32()),
                    StoreOp::SetFVar => e.set_fvar(index, value.to_f32()),
                    StoreOp::SetSysFVar => e.set_sys_fvar(index, value.to_f32()),
                    StoreOp::AddVar => e.add_var(index, value.to_i32()),
                    StoreOp::AddSysVar => e.add_sys_var(index, value.to_i32()),
                    StoreOp::AddFVar => e.add_fvar(index, value.to_f32()),
                    _ => e.add_sys_fvar(index, value.to_f32()),
                }
            }
        };
        self.stack.push(result);
        Ok(next)
    }

    fn run_ext(
        &mut self,
        world: &mut dyn World,
        code: &[u8],
        at: usize,
        cur: EntityId,
        origin: EntityId,
    ) -> Result<usize, RuntimeError> {
        let sub = read_u8(code, at)?;
        let op = ExtOp::try_from(sub)
            .map_err(|_| RuntimeError::UnknownOpcode { opcode: sub, offset: at })?;
        let mut next = at + 1;

        match op {
            ExtOp::Max => self.fold(Value::max)?,
            ExtOp::Min => self.fold(Value::min)?,
            ExtOp::Clamp => {
                let hi = self.stack.pop()?;
                let lo = self.stack.pop()?;
                self.stack.top_mut()?.clamp(lo, hi);
            }
            ExtOp::Sign => self.stack.top_mut()?.sign(),
            ExtOp::Atan2 => self.fold(Value::atan2)?,
            ExtOp::Rad => self.stack.top_mut()?.rad(),
            ExtOp::Deg => self.stack.top_mut()?.deg(),
            ExtOp::Lerp => {
                let amount = self.stack.pop()?;
                let to = self.stack.pop()?;
                self.stack.top_mut()?.lerp(to, amount);
            }
            ExtOp::Round => self.fold(Value::round)?,
            ExtOp::RandomRange => {
                let hi = self.stack.pop()?.to_i32();
                let lo = self.stack.top()?.to_i32();
                let r = world.random_range(lo, hi);
                *self.stack.top_mut()? = Value::int(r);
            }
            ExtOp::ParentDistX | ExtOp::ParentDistY => {
                let other = world.parent(cur);
                let v = distance(world, cur, other, origin, op == ExtOp::ParentDistX)?;
                self.stack.push(v);
            }
            ExtOp::RootDistX | ExtOp::RootDistY => {
                let other = world.root(cur);
                let v = distance(world, cur, other, origin, op == ExtOp::RootDistX)?;
                self.stack.push(v);
            }
            ExtOp::P2DistX | ExtOp::P2DistY => {
                let other = world.p2(cur);
                let v = distance(world, cur, other, origin, op == ExtOp::P2DistX)?;
                self.stack.push(v);
            }
            ExtOp::MapGet => {
                let name = self.strings.resolve(read_i32(code, next)?)?;
                next += 4;
                let v = world.get(cur)?.map_get(name);
                self.stack.push(Value::float(v));
            }
            ExtOp::PosZ | ExtOp::VelZ => {
                let ratio = scale_ratio(world, cur, origin)?;
                let e = world.get(cur)?;
                let raw = if op == ExtOp::PosZ { e.pos[2] } else { e.vel[2] };
                self.stack.push(Value::float(raw * ratio));
            }
            ExtOp::Angle => {
                let v = world.get(cur)?.angle;
                self.stack.push(Value::float(v));
            }
            ExtOp::LocalScale => {
                let v = world.get(cur)?.local_scale;
                self.stack.push(Value::float(v));
            }
            ExtOp::AttackMul => {
                let v = world.get(cur)?.attack_mul;
                self.stack.push(Value::float(v));
            }
            ExtOp::SprPriority => {
                let v = world.get(cur)?.spr_priority;
                self.stack.push(Value::int(v));
            }
        }
        Ok(next)
    }
}

/// Factor converting `cur`'s coordinates into `origin`'s
pub(crate) fn scale_ratio(
    world: &dyn World,
    cur: EntityId,
    origin: EntityId,
) -> Result<f32, RuntimeError> {
    if cur == origin {
        return Ok(1.0);
    }
    let c = world.get(cur)?.local_scale;
    let o = world.get(origin)?.local_scale;
    Ok(c / o)
}

/// Distance from `cur` to `other` along `cur`'s facing (x) or downwards (y).
/// A missing `other` yields sentinel-false.
fn distance(
    world: &dyn World,
    cur: EntityId,
    other: Option<EntityId>,
    origin: EntityId,
    horizontal: bool,
) -> Result<Value, RuntimeError> {
    let Some(other) = other else {
        return Ok(Value::SentinelFalse);
    };
    let ratio = scale_ratio(world, cur, origin)?;
    let e = world.get(cur)?;
    let o = world.get(other)?;
    let d = if horizontal {
        (o.pos[0] - e.pos[0]) * e.facing
    } else {
        o.pos[1] - e.pos[1]
    };
    Ok(Value::float(d * ratio))
}

fn entity_field(e: &Entity, opcode: Opcode) -> Value {
    match opcode {
        Opcode::Time => Value::int(e.state.time),
        Opcode::StateNo => Value::int(e.state.number),
        Opcode::PrevStateNo => Value::int(e.state.prev_number),
        Opcode::Ctrl => Value::Bool(e.ctrl),
        Opcode::Anim => Value::int(e.anim),
        Opcode::AnimElem => Value::int(e.anim_elem),
        Opcode::Facing => Value::int(e.facing as i32),
        Opcode::Alive => Value::Bool(e.alive()),
        Opcode::Life => Value::int(e.life),
        Opcode::LifeMax => Value::int(e.life_max),
        Opcode::Power => Value::int(e.power),
        Opcode::PowerMax => Value::int(e.power_max),
        Opcode::Id => Value::int(e.id),
        Opcode::HitPauseTime => Value::int(e.hit_pause_time),
        Opcode::HitCount => Value::int(e.hit_count),
        Opcode::MoveHit => Value::Bool(e.move_hit),
        Opcode::MoveContact => Value::Bool(e.move_contact),
        Opcode::TeamSide => Value::int(e.team_side),
        Opcode::PlayerNo => Value::int(e.player_no as i32),
        _ => Value::SentinelFalse,
    }
}

/// Target of a u8 forward jump whose operand is at `at`
fn short_target(code: &[u8], at: usize) -> Result<usize, RuntimeError> {
    Ok(match read_u8(code, at)? {
        0 => code.len(),
        d => at + 1 + d as usize,
    })
}

/// Target of an i32 jump whose operand is at `at`
fn long_target(code: &[u8], at: usize) -> Result<usize, RuntimeError> {
    let d = read_i32(code, at)?;
    usize::try_from((at + 4) as i64 + d as i64)
        .map_err(|_| RuntimeError::TruncatedOperand { offset: at })
}
