//! Argument tag numbers
//!
//! Each controller reads its own tag namespace. [`REDIRECT_ID`] is shared:
//! every effect controller accepts it.

/// Rebinds the controller's target to the entity with the given script id
pub const REDIRECT_ID: u8 = 0xFF;

pub mod change_state {
    pub const VALUE: u8 = 0;
    pub const CTRL: u8 = 1;
    pub const ANIM: u8 = 2;
    pub const CONTINUE: u8 = 3;
    /// Take the state from the library of the player with this script id
    pub const READ_PLAYER_ID: u8 = 4;
}

pub mod self_state {
    pub use super::change_state::*;
}

pub mod state_type_set {
    pub const STATE_TYPE: u8 = 0;
    pub const MOVE_TYPE: u8 = 1;
    pub const PHYSICS: u8 = 2;
}

pub mod change_anim {
    pub const ELEM: u8 = 0;
    pub const VALUE: u8 = 1;
    pub const READ_PLAYER_ID: u8 = 2;
}

pub mod ctrl_set {
    pub const VALUE: u8 = 0;
}

pub mod turn {
    pub const TURN: u8 = 0;
}

pub mod destroy_self {
    pub const RECURSIVE: u8 = 0;
    pub const REMOVE_EXPLODS: u8 = 1;
}

/// PosSet, PosAdd, VelSet, VelAdd and VelMul
pub mod vector {
    pub const X: u8 = 0;
    pub const Y: u8 = 1;
    pub const Z: u8 = 2;
}

pub mod gravity {
    pub const GRAVITY: u8 = 0;
}

/// AngleSet, AngleAdd and AngleMul
pub mod angle {
    pub const VALUE: u8 = 0;
}

pub mod life_add {
    pub const ABSOLUTE: u8 = 0;
    pub const KILL: u8 = 1;
    pub const VALUE: u8 = 2;
}

/// LifeSet, PowerAdd, PowerSet and AttackMulSet
pub mod value {
    pub const VALUE: u8 = 0;
}

pub mod target_life_add {
    pub const ID: u8 = 0;
    pub const ABSOLUTE: u8 = 1;
    pub const KILL: u8 = 2;
    pub const VALUE: u8 = 3;
}

/// TargetState, TargetPowerAdd and TargetFacing
pub mod target_value {
    /// Narrows the targets to this script id
    pub const ID: u8 = 0;
    pub const VALUE: u8 = 1;
}

/// TargetVelSet and TargetVelAdd
pub mod target_vel {
    pub const ID: u8 = 0;
    pub const X: u8 = 1;
    pub const Y: u8 = 2;
}

pub mod target_drop {
    /// Keep only targets with this script id; -1 keeps all
    pub const EXCLUDE_ID: u8 = 0;
    pub const KEEP_ONE: u8 = 1;
}

pub mod defence_mul_set {
    pub const VALUE: u8 = 0;
    pub const ON_HIT: u8 = 1;
    /// 0 divides by the value, anything else multiplies
    pub const MUL_TYPE: u8 = 2;
}

pub mod move_hit_reset {
    pub const RESET: u8 = 0;
}

pub mod hit_add {
    pub const VALUE: u8 = 0;
}

pub mod pos_freeze {
    pub const VALUE: u8 = 0;
}

/// BindToParent and BindToRoot
pub mod bind {
    pub const TIME: u8 = 0;
    pub const FACING: u8 = 1;
    pub const POS: u8 = 2;
}

pub mod var_set {
    /// A store expression, run on the target
    pub const ASSIGN: u8 = 0;
}

pub mod var_range_set {
    pub const FIRST: u8 = 0;
    pub const LAST: u8 = 1;
    pub const VALUE: u8 = 2;
    pub const FVALUE: u8 = 3;
}

pub mod var_random {
    pub const V: u8 = 0;
    pub const RANGE: u8 = 1;
}

pub mod map_set {
    /// Raw text key
    pub const MAP: u8 = 0;
    pub const VALUE: u8 = 1;
    /// 0 = set, 1 = add
    pub const TYPE: u8 = 2;
}

pub mod helper {
    /// Raw text
    pub const NAME: u8 = 0;
    pub const ID: u8 = 1;
    pub const STATENO: u8 = 2;
    pub const POS: u8 = 3;
    pub const FACING: u8 = 4;
    pub const SIZE_SCALE: u8 = 5;
    pub const OWNPAL: u8 = 6;
}

/// Explod and ModifyExplod
pub mod explod {
    pub const ANIM: u8 = 0;
    pub const ID: u8 = 1;
    pub const POS: u8 = 2;
    pub const FACING: u8 = 3;
    pub const REMOVE_TIME: u8 = 4;
    pub const SCALE: u8 = 5;
    pub const BIND_TIME: u8 = 6;
}

pub mod remove_explod {
    pub const ID: u8 = 0;
}

pub mod explod_bind_time {
    pub const ID: u8 = 0;
    pub const TIME: u8 = 1;
}

pub mod projectile {
    pub const ID: u8 = 0;
    pub const ANIM: u8 = 1;
    pub const HIT_ANIM: u8 = 2;
    pub const REM_ANIM: u8 = 3;
    pub const CANCEL_ANIM: u8 = 4;
    pub const OFFSET: u8 = 5;
    pub const VELOCITY: u8 = 6;
    pub const VEL_MUL: u8 = 7;
    pub const REM_VELOCITY: u8 = 8;
    pub const ACCEL: u8 = 9;
    pub const SCALE: u8 = 10;
    pub const ANGLE: u8 = 11;
    pub const REMOVE_TIME: u8 = 12;
    pub const MISS_TIME: u8 = 13;
    pub const HITS: u8 = 14;
    pub const PRIORITY: u8 = 15;
    pub const SPR_PRIORITY: u8 = 16;
}

/// PrintToConsole, DisplayToClipboard and AppendToClipboard
pub mod text {
    pub const PARAMS: u8 = 0;
    /// String pool index of the format template
    pub const TEXT: u8 = 1;
}

pub mod clear_clipboard {
    pub const CLEAR: u8 = 0;
}

/// SaveFile and LoadFile
pub mod file {
    /// Raw text, relative to the save directory
    pub const PATH: u8 = 0;
    /// 0 = map, 1 = integer vars, 2 = float vars
    pub const SAVE_DATA: u8 = 1;
}

/// On-enter step of a behavior program
pub mod state_entry {
    /// x, y and an optional z expression run for effect
    pub const VEL_SET: u8 = 0;
    pub const ANIM: u8 = 1;
    pub const CTRL: u8 = 2;
    pub const POWER_ADD: u8 = 3;
    pub const FACE_P2: u8 = 4;
    pub const JUGGLE: u8 = 5;
    pub const SPR_PRIORITY: u8 = 6;
    pub const HIT_COUNT_PERSIST: u8 = 7;
    pub const MOVE_HIT_PERSIST: u8 = 8;
}
