//! Entity state read and written by programs
//!
//! An entity is one actor of the simulation: a player root or a helper
//! spawned by one. The VM never owns entities; it reaches them through a
//! [`crate::world::World`] by [`EntityId`].

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Integer variables per entity
pub const NUM_VAR: usize = 60;
/// System integer variables per entity
pub const NUM_SYS_VAR: usize = 5;
/// Float variables per entity
pub const NUM_FVAR: usize = 40;
/// System float variables per entity
pub const NUM_SYS_FVAR: usize = 5;

/// Handle into the entity directory. Never reused within one directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Body posture
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateType {
    Standing = 1,
    Crouching = 2,
    Air = 4,
    Lying = 8,
}

/// Offensive intent
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveType {
    Idle = 1,
    Attack = 2,
    BeingHit = 4,
}

/// Which physics the simulation applies between ticks
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Physics {
    Standing = 1,
    Crouching = 2,
    Air = 4,
    None = 8,
}

impl StateType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Standing),
            2 => Some(Self::Crouching),
            4 => Some(Self::Air),
            8 => Some(Self::Lying),
            _ => None,
        }
    }
}

impl MoveType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Idle),
            2 => Some(Self::Attack),
            4 => Some(Self::BeingHit),
            _ => None,
        }
    }
}

impl Physics {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Standing),
            2 => Some(Self::Crouching),
            4 => Some(Self::Air),
            8 => Some(Self::None),
            _ => None,
        }
    }
}

/// Active state bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateStatus {
    pub number: i32,
    pub prev_number: i32,
    /// Ticks since the state was entered
    pub time: i32,
    pub state_type: StateType,
    pub move_type: MoveType,
    pub prev_move_type: MoveType,
    pub physics: Physics,
    /// Player number whose program library holds the running state
    pub owner: usize,
}

/// A state change waiting to be applied by the executor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateRequest {
    pub number: i32,
    pub anim: Option<i32>,
    pub ctrl: Option<bool>,
    /// Library to take the state from; `None` keeps the current owner
    pub owner: Option<usize>,
}

impl StateRequest {
    pub fn to(number: i32) -> Self {
        Self {
            number,
            anim: None,
            ctrl: None,
            owner: None,
        }
    }
}

/// Per-block counters of the running program
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockMemory {
    pub persistence: Vec<i32>,
    pub pause_toggles: Vec<bool>,
}

impl BlockMemory {
    /// Zeroed memory for a program with the given slot counts
    pub fn sized(persistence_slots: usize, toggle_slots: usize) -> Self {
        Self {
            persistence: vec![0; persistence_slots],
            pause_toggles: vec![false; toggle_slots],
        }
    }

    /// Persistence counter of `slot`, growing the table if needed.
    pub fn counter(&mut self, slot: usize) -> &mut i32 {
        if slot >= self.persistence.len() {
            self.persistence.resize(slot + 1, 0);
        }
        &mut self.persistence[slot]
    }

    /// Flips the pause toggle of `slot` and returns its new value.
    pub fn flip_toggle(&mut self, slot: usize) -> bool {
        if slot >= self.pause_toggles.len() {
            self.pause_toggles.resize(slot + 1, false);
        }
        let t = &mut self.pause_toggles[slot];
        *t = !*t;
        *t
    }
}

/// Visual effect record owned by an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explod {
    pub id: i32,
    pub anim: i32,
    pub pos: [f32; 2],
    pub facing: f32,
    pub scale: [f32; 2],
    /// Ticks until removal; -1 = never
    pub remove_time: i32,
    /// Ticks the explod follows its owner
    pub bind_time: i32,
}

impl Default for Explod {
    fn default() -> Self {
        Self {
            id: -1,
            anim: 0,
            pos: [0.0; 2],
            facing: 1.0,
            scale: [1.0; 2],
            remove_time: -2,
            bind_time: 0,
        }
    }
}

/// Projectile record owned by an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub id: i32,
    pub anim: i32,
    /// -1 = keep `anim`
    pub hit_anim: i32,
    pub rem_anim: i32,
    pub cancel_anim: i32,
    pub pos: [f32; 2],
    pub facing: f32,
    /// Horizontal components are relative to `facing`
    pub velocity: [f32; 2],
    pub vel_mul: [f32; 2],
    pub rem_velocity: [f32; 2],
    pub accel: [f32; 2],
    pub scale: [f32; 2],
    pub angle: f32,
    /// Ticks until removal; -1 = never
    pub remove_time: i32,
    pub miss_time: i32,
    pub hits: i32,
    pub priority: i32,
    pub spr_priority: i32,
}

impl Default for Projectile {
    fn default() -> Self {
        Self {
            id: 0,
            anim: 0,
            hit_anim: -1,
            rem_anim: -1,
            cancel_anim: -1,
            pos: [0.0; 2],
            facing: 1.0,
            velocity: [0.0; 2],
            vel_mul: [1.0; 2],
            rem_velocity: [0.0; 2],
            accel: [0.0; 2],
            scale: [1.0; 2],
            angle: 0.0,
            remove_time: -1,
            miss_time: 0,
            hits: 1,
            priority: 1,
            spr_priority: 3,
        }
    }
}

/// Position lock onto another entity, applied after each of the bound
/// entity's turns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub to: EntityId,
    /// Ticks left; -1 = until replaced
    pub time: i32,
    /// x runs along the anchor's facing
    pub offset: [f32; 2],
    /// 1 faces like the anchor, -1 faces away, `None` keeps the current facing
    pub facing: Option<f32>,
}

/// Constants from the entity's definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConstants {
    pub life: i32,
    pub power: i32,
    pub attack: i32,
    pub defence: i32,
    pub x_scale: f32,
    pub y_scale: f32,
    pub y_accel: f32,
    pub walk_fwd_x: f32,
    pub walk_back_x: f32,
    pub jump_y: f32,
    /// Free-form constants looked up by lowercase name
    pub named: BTreeMap<String, f32>,
}

impl Default for EntityConstants {
    fn default() -> Self {
        Self {
            life: 1000,
            power: 3000,
            attack: 100,
            defence: 100,
            x_scale: 1.0,
            y_scale: 1.0,
            y_accel: 0.44,
            walk_fwd_x: 2.4,
            walk_back_x: -2.2,
            jump_y: -8.4,
            named: BTreeMap::new(),
        }
    }
}

/// Map update mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapOp {
    Set,
    Add,
}

/// Actor state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Script-visible id
    pub id: i32,
    pub player_no: usize,
    pub name: String,
    pub is_helper: bool,
    /// Id given by the spawning helper controller
    pub helper_id: i32,
    pub parent: Option<EntityId>,
    pub root: Option<EntityId>,
    pub team_side: i32,
    /// Coordinate scale relative to the simulation's unit
    pub local_scale: f32,

    pub pos: [f32; 3],
    pub vel: [f32; 3],
    pub facing: f32,
    pub angle: f32,

    pub life: i32,
    pub life_max: i32,
    pub power: i32,
    pub power_max: i32,
    pub attack_mul: f32,
    /// Multiplier on defence against damage
    pub defence_mul: f32,
    /// Defer `defence_mul` to hits landed by attacks
    pub defence_mul_on_hit: bool,
    pub ctrl: bool,

    pub state: StateStatus,
    pub anim: i32,
    pub anim_elem: i32,
    pub spr_priority: i32,
    pub hit_pause_time: i32,
    pub hit_count: i32,
    pub unique_hit_count: i32,
    pub move_hit: bool,
    pub move_contact: bool,
    pub juggle: i32,

    pub ivar: Vec<i32>,
    pub fvar: Vec<f32>,
    pub sys_ivar: Vec<i32>,
    pub sys_fvar: Vec<f32>,
    pub map: BTreeMap<String, f32>,

    pub targets: Vec<EntityId>,
    pub explods: Vec<Explod>,
    pub projectiles: Vec<Projectile>,
    pub clipboard: Vec<String>,
    pub consts: EntityConstants,

    pub binding: Option<Binding>,
    /// Position held for the current tick
    pub pos_freeze: bool,

    pub pending_state: Option<StateRequest>,
    pub block_memory: BlockMemory,
}

impl Entity {
    pub fn new(id: i32, player_no: usize, name: impl Into<String>) -> Self {
        let consts = EntityConstants::default();
        Self {
            id,
            player_no,
            name: name.into(),
            is_helper: false,
            helper_id: 0,
            parent: None,
            root: None,
            team_side: 1,
            local_scale: 1.0,
            pos: [0.0; 3],
            vel: [0.0; 3],
            facing: 1.0,
            angle: 0.0,
            life: consts.life,
            life_max: consts.life,
            power: 0,
            power_max: consts.power,
            attack_mul: 1.0,
            defence_mul: 1.0,
            defence_mul_on_hit: false,
            ctrl: true,
            state: StateStatus {
                number: 0,
                prev_number: 0,
                time: 0,
                state_type: StateType::Standing,
                move_type: MoveType::Idle,
                prev_move_type: MoveType::Idle,
                physics: Physics::Standing,
                owner: player_no,
            },
            anim: 0,
            anim_elem: 1,
            spr_priority: 0,
            hit_pause_time: 0,
            hit_count: 0,
            unique_hit_count: 0,
            move_hit: false,
            move_contact: false,
            juggle: 0,
            ivar: vec![0; NUM_VAR],
            fvar: vec![0.0; NUM_FVAR],
            sys_ivar: vec![0; NUM_SYS_VAR],
            sys_fvar: vec![0.0; NUM_SYS_FVAR],
            map: BTreeMap::new(),
            targets: Vec::new(),
            explods: Vec::new(),
            projectiles: Vec::new(),
            clipboard: Vec::new(),
            consts,
            binding: None,
            pos_freeze: false,
            pending_state: None,
            block_memory: BlockMemory::default(),
        }
    }

    pub fn alive(&self) -> bool {
        self.life > 0
    }

    /// Hit pause holds block execution unless a block opts out.
    pub fn is_paused(&self) -> bool {
        self.hit_pause_time > 0
    }

    pub fn request_state(&mut self, request: StateRequest) {
        self.pending_state = Some(request);
    }

    pub fn set_life(&mut self, life: i32) {
        self.life = life.clamp(0, self.life_max);
    }

    pub fn set_power(&mut self, power: i32) {
        self.power = power.clamp(0, self.power_max);
    }

    pub fn set_move_type(&mut self, move_type: MoveType) {
        self.state.prev_move_type = self.state.move_type;
        self.state.move_type = move_type;
    }

    pub fn set_anim(&mut self, anim: i32, elem: i32) {
        self.anim = anim;
        self.anim_elem = elem.max(1);
    }

    // ===== Variables =====
    //
    // Out-of-range indices read and write nothing and yield sentinel-false.

    pub fn var(&self, index: i32) -> Value {
        slot(&self.ivar, index).map_or(Value::SentinelFalse, |&v| Value::int(v))
    }

    pub fn set_var(&mut self, index: i32, v: i32) -> Value {
        match slot_mut(&mut self.ivar, index) {
            Some(s) => {
                *s = v;
                Value::int(v)
            }
            None => Value::SentinelFalse,
        }
    }

    pub fn add_var(&mut self, index: i32, v: i32) -> Value {
        match slot_mut(&mut self.ivar, index) {
            Some(s) => {
                *s = s.wrapping_add(v);
                Value::int(*s)
            }
            None => Value::SentinelFalse,
        }
    }

    pub fn sys_var(&self, index: i32) -> Value {
        slot(&self.sys_ivar, index).map_or(Value::SentinelFalse, |&v| Value::int(v))
    }

    pub fn set_sys_var(&mut self, index: i32, v: i32) -> Value {
        match slot_mut(&mut self.sys_ivar, index) {
            Some(s) => {
                *s = v;
                Value::int(v)
            }
            None => Value::SentinelFalse,
        }
    }

    pub fn add_sys_var(&mut self, index: i32, v: i32) -> Value {
        match slot_mut(&mut self.sys_ivar, index) {
            Some(s) => {
                *s = s.wrapping_add(v);
                Value::int(*s)
            }
            None => Value::SentinelFalse,
        }
    }

    pub fn fvar(&self, index: i32) -> Value {
        slot(&self.fvar, index).map_or(Value::SentinelFalse, |&v| Value::float(v))
    }

    pub fn set_fvar(&mut self, index: i32, v: f32) -> Value {
        match slot_mut(&mut self.fvar, index) {
            Some(s) => {
                *s = v;
                Value::float(v)
            }
            None => Value::SentinelFalse,
        }
    }

    pub fn add_fvar(&mut self, index: i32, v: f32) -> Value {
        match slot_mut(&mut self.fvar, index) {
            Some(s) => {
                *s += v;
                Value::float(*s)
            }
            None => Value::SentinelFalse,
        }
    }

    pub fn sys_fvar(&self, index: i32) -> Value {
        slot(&self.sys_fvar, index).map_or(Value::SentinelFalse, |&v| Value::float(v))
    }

    pub fn set_sys_fvar(&mut self, index: i32, v: f32) -> Value {
        match slot_mut(&mut self.sys_fvar, index) {
            Some(s) => {
                *s = v;
                Value::float(v)
            }
            None => Value::SentinelFalse,
        }
    }

    pub fn add_sys_fvar(&mut self, index: i32, v: f32) -> Value {
        match slot_mut(&mut self.sys_fvar, index) {
            Some(s) => {
                *s += v;
                Value::float(*s)
            }
            None => Value::SentinelFalse,
        }
    }

    /// Map value by case-insensitive name; absent keys read as 0.
    pub fn map_get(&self, name: &str) -> f32 {
        self.map
            .get(&name.to_lowercase())
            .copied()
            .unwrap_or_default()
    }

    pub fn map_update(&mut self, name: &str, value: f32, op: MapOp) -> f32 {
        let entry = self.map.entry(name.to_lowercase()).or_insert(0.0);
        match op {
            MapOp::Set => *entry = value,
            MapOp::Add => *entry += value,
        }
        *entry
    }

    pub fn explod_count(&self, id: i32) -> usize {
        self.explods
            .iter()
            .filter(|e| id < 0 || e.id == id)
            .count()
    }

    /// Removes explods with `id` (-1 = all). Returns how many went.
    pub fn remove_explods(&mut self, id: i32) -> usize {
        let before = self.explods.len();
        self.explods.retain(|e| id >= 0 && e.id != id);
        before - self.explods.len()
    }

    /// Explods with `id` (-1 = all)
    pub fn explods_mut(&mut self, id: i32) -> impl Iterator<Item = &mut Explod> {
        self.explods.iter_mut().filter(move |e| id < 0 || e.id == id)
    }

    pub fn projectile_count(&self, id: i32) -> usize {
        self.projectiles
            .iter()
            .filter(|p| id < 0 || p.id == id)
            .count()
    }

    /// Defence applied to incoming damage
    pub fn effective_defence(&self) -> f32 {
        let defence = self.consts.defence.max(1) as f32;
        if self.defence_mul_on_hit {
            defence
        } else {
            defence * self.defence_mul
        }
    }

    /// Adds `n` to both hit counters.
    pub fn add_hits(&mut self, n: i32) {
        self.hit_count = self.hit_count.saturating_add(n);
        self.unique_hit_count = self.unique_hit_count.saturating_add(n);
    }

    pub fn clear_move_hit(&mut self) {
        self.move_hit = false;
        self.move_contact = false;
    }
}

fn slot<T>(values: &[T], index: i32) -> Option<&T> {
    usize::try_from(index).ok().and_then(|i| values.get(i))
}

fn slot_mut<T>(values: &mut [T], index: i32) -> Option<&mut T> {
    usize::try_from(index).ok().and_then(|i| values.get_mut(i))
}
