//! Expression instruction set
//!
//! One byte per opcode, operands inline and little-endian. Three prefix
//! opcodes select a secondary page whose sub-opcode follows as one byte.

/// Inline operand layout following an opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    U8,
    I8,
    I32,
    I64,
    F32,
    /// Unsigned forward displacement; 0 jumps to the end
    Jump8,
    /// Signed displacement from the end of the operand
    Jump32,
    /// i32 length followed by that many bytes of nested expression
    Nested,
    /// Sub-opcode byte, possibly followed by its own operand
    Page,
}

impl Operand {
    /// Fixed operand width in bytes; `Nested` and `Page` report their prefix only.
    pub fn width(self) -> usize {
        match self {
            Operand::None => 0,
            Operand::U8 | Operand::I8 | Operand::Jump8 | Operand::Page => 1,
            Operand::I32 | Operand::F32 | Operand::Jump32 | Operand::Nested => 4,
            Operand::I64 => 8,
        }
    }
}

/// Expression opcode
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    // ===== Literals (0x01-0x07) =====
    /// Push a small integer [i8]
    Int8 = 0x01,
    /// Push an integer [i32]
    Int = 0x02,
    /// Push a wide integer [i64]
    Int64 = 0x03,
    /// Push a float [f32]
    Float = 0x04,

    // ===== Stack (0x08-0x0F) =====
    /// Discard the top value
    Pop = 0x08,
    /// Duplicate the top value
    Dup = 0x09,
    /// Swap the two top values
    Swap = 0x0A,

    // ===== Variables (0x10-0x1F) =====
    /// Replace index on top with the entity's integer variable
    Var = 0x10,
    /// Replace index on top with the entity's system integer variable
    SysVar = 0x11,
    /// Replace index on top with the entity's float variable
    FVar = 0x12,
    /// Replace index on top with the entity's system float variable
    SysFVar = 0x13,
    /// Push a slot of the current variable window [u8 slot]
    LocalVar = 0x14,

    // ===== Arithmetic (0x20-0x2F) =====
    /// Pop b, fold a + b
    Add = 0x20,
    /// Pop b, fold a - b
    Sub = 0x21,
    /// Pop b, fold a * b
    Mul = 0x22,
    /// Pop b, fold a / b
    Div = 0x23,
    /// Pop b, fold a % b
    Mod = 0x24,
    /// Pop b, fold a ** b
    Pow = 0x25,
    /// Negate the top value
    Neg = 0x26,

    // ===== Comparison (0x30-0x3F) =====
    /// Pop b, fold a == b
    Eq = 0x30,
    /// Pop b, fold a != b
    Ne = 0x31,
    /// Pop b, fold a > b
    Gt = 0x32,
    /// Pop b, fold a >= b
    Ge = 0x33,
    /// Pop b, fold a < b
    Lt = 0x34,
    /// Pop b, fold a <= b
    Le = 0x35,

    // ===== Logic (0x40-0x4F) =====
    /// Logical not of the top value
    BoolNot = 0x40,
    /// Pop b, fold a && b
    BoolAnd = 0x41,
    /// Pop b, fold a || b
    BoolOr = 0x42,
    /// Pop b, fold a ^^ b
    BoolXor = 0x43,
    /// Bitwise not of the top value
    BitNot = 0x44,
    /// Pop b, fold a & b
    BitAnd = 0x45,
    /// Pop b, fold a | b
    BitOr = 0x46,
    /// Pop b, fold a ^ b
    BitXor = 0x47,
    /// Pop else, pop then, replace condition with the selected value
    IfElse = 0x48,

    // ===== Control flow (0x50-0x5F) =====
    /// Jump forward [u8 offset, 0 = end]
    Jump8 = 0x50,
    /// Pop, jump forward if falsy [u8 offset]
    JumpIfZero8 = 0x51,
    /// Pop, jump forward if truthy [u8 offset]
    JumpIfNonZero8 = 0x52,
    /// Jump forward if top is sentinel-false, without popping [u8 offset]
    JumpIfSentinel8 = 0x53,
    /// Jump [i32 offset]
    Jump = 0x54,
    /// Pop, jump if falsy [i32 offset]
    JumpIfZero = 0x55,
    /// Pop, jump if truthy [i32 offset]
    JumpIfNonZero = 0x56,
    /// Run a nested expression on the current entity [i32 len][bytes]
    Run = 0x57,
    /// Run a nested expression on the calling entity [i32 len][bytes]
    UnredirectedRun = 0x58,

    // ===== Math (0x60-0x6F) =====
    /// Absolute value
    Abs = 0x60,
    /// e ** top
    Exp = 0x61,
    /// Natural logarithm
    Ln = 0x62,
    /// Pop x, fold log base a of x
    Log = 0x63,
    /// Cosine
    Cos = 0x64,
    /// Sine
    Sin = 0x65,
    /// Tangent
    Tan = 0x66,
    /// Arc cosine
    Acos = 0x67,
    /// Arc sine
    Asin = 0x68,
    /// Arc tangent
    Atan = 0x69,
    /// Floor a float into an integer
    Floor = 0x6A,
    /// Ceil a float into an integer
    Ceil = 0x6B,
    /// Push a random integer in 0..=999
    Random = 0x6C,

    // ===== Redirection (0x70-0x7F) =====
    /// Pop player number, redirect [i32 skip]
    Player = 0x70,
    /// Redirect to parent [i32 skip]
    Parent = 0x71,
    /// Redirect to root [i32 skip]
    Root = 0x72,
    /// Pop helper id, redirect [i32 skip]
    Helper = 0x73,
    /// Pop target id, redirect [i32 skip]
    Target = 0x74,
    /// Pop partner index, redirect [i32 skip]
    Partner = 0x75,
    /// Pop enemy index, redirect [i32 skip]
    Enemy = 0x76,
    /// Pop nearness rank, redirect [i32 skip]
    EnemyNear = 0x77,
    /// Pop script id, redirect [i32 skip]
    PlayerId = 0x78,
    /// Pop run-order index, redirect [i32 skip]
    PlayerIndex = 0x79,
    /// Pop helper index, redirect [i32 skip]
    HelperIndex = 0x7A,
    /// Redirect to nearest opponent [i32 skip]
    P2 = 0x7B,
    /// Redirect to the owner of the running state [i32 skip]
    StateOwner = 0x7C,
    /// No effect; marks the end of a redirected range
    RedirectReset = 0x7D,

    // ===== Entity reads (0x80-0xAF) =====
    /// Ticks spent in the current state
    Time = 0x80,
    /// Current state number
    StateNo = 0x81,
    /// Previous state number
    PrevStateNo = 0x82,
    /// State type equals [u8 code]
    StateTypeIs = 0x83,
    /// Move type equals [u8 code]
    MoveTypeIs = 0x84,
    /// Previous move type equals [u8 code]
    PrevMoveTypeIs = 0x85,
    /// Control flag
    Ctrl = 0x86,
    /// Animation number
    Anim = 0x87,
    /// Animation element
    AnimElem = 0x88,
    /// X position, scaled to the caller
    PosX = 0x89,
    /// Y position, scaled to the caller
    PosY = 0x8A,
    /// X velocity, scaled to the caller
    VelX = 0x8B,
    /// Y velocity, scaled to the caller
    VelY = 0x8C,
    /// Facing (1 or -1)
    Facing = 0x8D,
    /// Life above zero
    Alive = 0x8E,
    /// Life
    Life = 0x8F,
    /// Maximum life
    LifeMax = 0x90,
    /// Power
    Power = 0x91,
    /// Maximum power
    PowerMax = 0x92,
    /// Script-visible id
    Id = 0x93,
    /// Pop helper id, is a helper with that id (<= 0 = any)
    IsHelper = 0x94,
    /// Pop helper id, count of the root's helpers with it (<= 0 = all)
    NumHelper = 0x95,
    /// Pop target id, count of targets with it (< 0 = all)
    NumTarget = 0x96,
    /// Pop explod id, count of explods with it (< 0 = all)
    NumExplod = 0x97,
    /// Count of live opponents
    NumEnemy = 0x98,
    /// Count of live teammates
    NumPartner = 0x99,
    /// Remaining hit pause
    HitPauseTime = 0x9A,
    /// Hits landed by the current move
    HitCount = 0x9B,
    /// Move connected with a hit
    MoveHit = 0x9C,
    /// Move made contact
    MoveContact = 0x9D,
    /// Ticks since the simulation started
    GameTime = 0x9E,
    /// Round state
    RoundState = 0x9F,
    /// Pop script id, a live entity has it
    PlayerIdExist = 0xA0,
    /// Team side
    TeamSide = 0xA1,
    /// Player number
    PlayerNo = 0xA2,

    // ===== Pages (0xF0-0xFF) =====
    /// Entity constant [u8 ConstOp]
    ConstPage = 0xF0,
    /// Variable store [u8 StoreOp]
    StorePage = 0xF1,
    /// Extended math and queries [u8 ExtOp]
    ExtPage = 0xF2,
}

impl Opcode {
    /// Operand layout following this opcode
    pub fn operand(self) -> Operand {
        match self {
            Opcode::Int8 => Operand::I8,
            Opcode::Int => Operand::I32,
            Opcode::Int64 => Operand::I64,
            Opcode::Float => Operand::F32,
            Opcode::Pop
            | Opcode::Dup
            | Opcode::Swap
            | Opcode::Var
            | Opcode::SysVar
            | Opcode::FVar
            | Opcode::SysFVar
            | Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::Pow
            | Opcode::Neg
            | Opcode::Eq
            | Opcode::Ne
            | Opcode::Gt
            | Opcode::Ge
            | Opcode::Lt
            | Opcode::Le
            | Opcode::BoolNot
            | Opcode::BoolAnd
            | Opcode::BoolOr
            | Opcode::BoolXor
            | Opcode::BitNot
            | Opcode::BitAnd
            | Opcode::BitOr
            | Opcode::BitXor
            | Opcode::IfElse
            | Opcode::Abs
            | Opcode::Exp
            | Opcode::Ln
            | Opcode::Log
            | Opcode::Cos
            | Opcode::Sin
            | Opcode::Tan
            | Opcode::Acos
            | Opcode::Asin
            | Opcode::Atan
            | Opcode::Floor
            | Opcode::Ceil
            | Opcode::Random
            | Opcode::RedirectReset
            | Opcode::Time
            | Opcode::StateNo
            | Opcode::PrevStateNo
            | Opcode::Ctrl
            | Opcode::Anim
            | Opcode::AnimElem
            | Opcode::PosX
            | Opcode::PosY
            | Opcode::VelX
            | Opcode::VelY
            | Opcode::Facing
            | Opcode::Alive
            | Opcode::Life
            | Opcode::LifeMax
            | Opcode::Power
            | Opcode::PowerMax
            | Opcode::Id
            | Opcode::IsHelper
            | Opcode::NumHelper
            | Opcode::NumTarget
            | Opcode::NumExplod
            | Opcode::NumEnemy
            | Opcode::NumPartner
            | Opcode::HitPauseTime
            | Opcode::HitCount
            | Opcode::MoveHit
            | Opcode::MoveContact
            | Opcode::GameTime
            | Opcode::RoundState
            | Opcode::PlayerIdExist
            | Opcode::TeamSide
            | Opcode::PlayerNo => Operand::None,
            Opcode::LocalVar
            | Opcode::StateTypeIs
            | Opcode::MoveTypeIs
            | Opcode::PrevMoveTypeIs => Operand::U8,
            Opcode::Jump8
            | Opcode::JumpIfZero8
            | Opcode::JumpIfNonZero8
            | Opcode::JumpIfSentinel8 => Operand::Jump8,
            Opcode::Jump
            | Opcode::JumpIfZero
            | Opcode::JumpIfNonZero
            | Opcode::Player
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
            | Opcode::StateOwner => Operand::Jump32,
            Opcode::Run
            | Opcode::UnredirectedRun => Operand::Nested,
            Opcode::ConstPage
            | Opcode::StorePage
            | Opcode::ExtPage => Operand::Page,
        }
    }

    /// Whether this opcode rebinds the current entity
    pub fn is_redirect(self) -> bool {
        matches!(
            self,
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
                | Opcode::StateOwner
        )
    }

    /// Whether a redirect pops a selector before resolving
    pub fn takes_selector(self) -> bool {
        matches!(
            self,
            Opcode::Player
                | Opcode::Helper
                | Opcode::Target
                | Opcode::Partner
                | Opcode::Enemy
                | Opcode::EnemyNear
                | Opcode::PlayerId
                | Opcode::PlayerIndex
                | Opcode::HelperIndex
        )
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ();

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x01 => Ok(Opcode::Int8),
            0x02 => Ok(Opcode::Int),
            0x03 => Ok(Opcode::Int64),
            0x04 => Ok(Opcode::Float),
            0x08 => Ok(Opcode::Pop),
            0x09 => Ok(Opcode::Dup),
            0x0A => Ok(Opcode::Swap),
            0x10 => Ok(Opcode::Var),
            0x11 => Ok(Opcode::SysVar),
            0x12 => Ok(Opcode::FVar),
            0x13 => Ok(Opcode::SysFVar),
            0x14 => Ok(Opcode::LocalVar),
            0x20 => Ok(Opcode::Add),
            0x21 => Ok(Opcode::Sub),
            0x22 => Ok(Opcode::Mul),
            0x23 => Ok(Opcode::Div),
            0x24 => Ok(Opcode::Mod),
            0x25 => Ok(Opcode::Pow),
            0x26 => Ok(Opcode::Neg),
            0x30 => Ok(Opcode::Eq),
            0x31 => Ok(Opcode::Ne),
            0x32 => Ok(Opcode::Gt),
            0x33 => Ok(Opcode::Ge),
            0x34 => Ok(Opcode::Lt),
            0x35 => Ok(Opcode::Le),
            0x40 => Ok(Opcode::BoolNot),
            0x41 => Ok(Opcode::BoolAnd),
            0x42 => Ok(Opcode::BoolOr),
            0x43 => Ok(Opcode::BoolXor),
            0x44 => Ok(Opcode::BitNot),
            0x45 => Ok(Opcode::BitAnd),
            0x46 => Ok(Opcode::BitOr),
            0x47 => Ok(Opcode::BitXor),
            0x48 => Ok(Opcode::IfElse),
            0x50 => Ok(Opcode::Jump8),
            0x51 => Ok(Opcode::JumpIfZero8),
            0x52 => Ok(Opcode::JumpIfNonZero8),
            0x53 => Ok(Opcode::JumpIfSentinel8),
            0x54 => Ok(Opcode::Jump),
            0x55 => Ok(Opcode::JumpIfZero),
            0x56 => Ok(Opcode::JumpIfNonZero),
            0x57 => Ok(Opcode::Run),
            0x58 => Ok(Opcode::UnredirectedRun),
            0x60 => Ok(Opcode::Abs),
            0x61 => Ok(Opcode::Exp),
            0x62 => Ok(Opcode::Ln),
            0x63 => Ok(Opcode::Log),
            0x64 => Ok(Opcode::Cos),
            0x65 => Ok(Opcode::Sin),
            0x66 => Ok(Opcode::Tan),
            0x67 => Ok(Opcode::Acos),
            0x68 => Ok(Opcode::Asin),
            0x69 => Ok(Opcode::Atan),
            0x6A => Ok(Opcode::Floor),
            0x6B => Ok(Opcode::Ceil),
            0x6C => Ok(Opcode::Random),
            0x70 => Ok(Opcode::Player),
            0x71 => Ok(Opcode::Parent),
            0x72 => Ok(Opcode::Root),
            0x73 => Ok(Opcode::Helper),
            0x74 => Ok(Opcode::Target),
            0x75 => Ok(Opcode::Partner),
            0x76 => Ok(Opcode::Enemy),
            0x77 => Ok(Opcode::EnemyNear),
            0x78 => Ok(Opcode::PlayerId),
            0x79 => Ok(Opcode::PlayerIndex),
            0x7A => Ok(Opcode::HelperIndex),
            0x7B => Ok(Opcode::P2),
            0x7C => Ok(Opcode::StateOwner),
            0x7D => Ok(Opcode::RedirectReset),
            0x80 => Ok(Opcode::Time),
            0x81 => Ok(Opcode::StateNo),
            0x82 => Ok(Opcode::PrevStateNo),
            0x83 => Ok(Opcode::StateTypeIs),
            0x84 => Ok(Opcode::MoveTypeIs),
            0x85 => Ok(Opcode::PrevMoveTypeIs),
            0x86 => Ok(Opcode::Ctrl),
            0x87 => Ok(Opcode::Anim),
            0x88 => Ok(Opcode::AnimElem),
            0x89 => Ok(Opcode::PosX),
            0x8A => Ok(Opcode::PosY),
            0x8B => Ok(Opcode::VelX),
            0x8C => Ok(Opcode::VelY),
            0x8D => Ok(Opcode::Facing),
            0x8E => Ok(Opcode::Alive),
            0x8F => Ok(Opcode::Life),
            0x90 => Ok(Opcode::LifeMax),
            0x91 => Ok(Opcode::Power),
            0x92 => Ok(Opcode::PowerMax),
            0x93 => Ok(Opcode::Id),
            0x94 => Ok(Opcode::IsHelper),
            0x95 => Ok(Opcode::NumHelper),
            0x96 => Ok(Opcode::NumTarget),
            0x97 => Ok(Opcode::NumExplod),
            0x98 => Ok(Opcode::NumEnemy),
            0x99 => Ok(Opcode::NumPartner),
            0x9A => Ok(Opcode::HitPauseTime),
            0x9B => Ok(Opcode::HitCount),
            0x9C => Ok(Opcode::MoveHit),
            0x9D => Ok(Opcode::MoveContact),
            0x9E => Ok(Opcode::GameTime),
            0x9F => Ok(Opcode::RoundState),
            0xA0 => Ok(Opcode::PlayerIdExist),
            0xA1 => Ok(Opcode::TeamSide),
            0xA2 => Ok(Opcode::PlayerNo),
            0xF0 => Ok(Opcode::ConstPage),
            0xF1 => Ok(Opcode::StorePage),
            0xF2 => Ok(Opcode::ExtPage),
            _ => Err(()),
        }
    }
}

/// Entity constants read through [`Opcode::ConstPage`]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstOp {
    /// Starting life
    DataLife = 0x00,
    /// Maximum power
    DataPower = 0x01,
    /// Attack rating
    DataAttack = 0x02,
    /// Defence rating
    DataDefence = 0x03,
    /// Horizontal draw scale
    SizeXScale = 0x04,
    /// Vertical draw scale
    SizeYScale = 0x05,
    /// Gravity, scaled to the caller
    MovementYAccel = 0x06,
    /// Forward walk speed, scaled to the caller
    VelocityWalkFwdX = 0x07,
    /// Backward walk speed, scaled to the caller
    VelocityWalkBackX = 0x08,
    /// Jump velocity, scaled to the caller
    VelocityJumpY = 0x09,
    /// Named constant [i32 string index]
    Named = 0x0A,
}

impl ConstOp {
    pub fn operand(self) -> Operand {
        match self {
            ConstOp::Named => Operand::I32,
            _ => Operand::None,
        }
    }
}

impl TryFrom<u8> for ConstOp {
    type Error = ();

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(ConstOp::DataLife),
            0x01 => Ok(ConstOp::DataPower),
            0x02 => Ok(ConstOp::DataAttack),
            0x03 => Ok(ConstOp::DataDefence),
            0x04 => Ok(ConstOp::SizeXScale),
            0x05 => Ok(ConstOp::SizeYScale),
            0x06 => Ok(ConstOp::MovementYAccel),
            0x07 => Ok(ConstOp::VelocityWalkFwdX),
            0x08 => Ok(ConstOp::VelocityWalkBackX),
            0x09 => Ok(ConstOp::VelocityJumpY),
            0x0A => Ok(ConstOp::Named),
            _ => Err(()),
        }
    }
}

/// Variable writes through [`Opcode::StorePage`]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Pop value, index on top: var(index) := value
    SetVar = 0x00,
    /// Pop value, index on top: sysvar(index) := value
    SetSysVar = 0x01,
    /// Pop value, index on top: fvar(index) := value
    SetFVar = 0x02,
    /// Pop value, index on top: sysfvar(index) := value
    SetSysFVar = 0x03,
    /// Pop value, index on top: var(index) += value
    AddVar = 0x04,
    /// Pop value, index on top: sysvar(index) += value
    AddSysVar = 0x05,
    /// Pop value, index on top: fvar(index) += value
    AddFVar = 0x06,
    /// Pop value, index on top: sysfvar(index) += value
    AddSysFVar = 0x07,
    /// Replace top with map(name) := top [i32 string index]
    MapSet = 0x08,
    /// Replace top with map(name) += top [i32 string index]
    MapAdd = 0x09,
}

impl StoreOp {
    pub fn operand(self) -> Operand {
        match self {
            StoreOp::MapSet | StoreOp::MapAdd => Operand::I32,
            _ => Operand::None,
        }
    }
}

impl TryFrom<u8> for StoreOp {
    type Error = ();

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(StoreOp::SetVar),
            0x01 => Ok(StoreOp::SetSysVar),
            0x02 => Ok(StoreOp::SetFVar),
            0x03 => Ok(StoreOp::SetSysFVar),
            0x04 => Ok(StoreOp::AddVar),
            0x05 => Ok(StoreOp::AddSysVar),
            0x06 => Ok(StoreOp::AddFVar),
            0x07 => Ok(StoreOp::AddSysFVar),
            0x08 => Ok(StoreOp::MapSet),
            0x09 => Ok(StoreOp::MapAdd),
            _ => Err(()),
        }
    }
}

/// Extended math and queries through [`Opcode::ExtPage`]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtOp {
    /// Pop b, fold max(a, b)
    Max = 0x00,
    /// Pop b, fold min(a, b)
    Min = 0x01,
    /// Pop hi, pop lo, fold clamp(a, lo, hi)
    Clamp = 0x02,
    /// Sign of the top value
    Sign = 0x03,
    /// Pop x, fold atan2(a, x)
    Atan2 = 0x04,
    /// Degrees to radians
    Rad = 0x05,
    /// Radians to degrees
    Deg = 0x06,
    /// Pop amount, pop b, fold lerp(a, b, amount)
    Lerp = 0x07,
    /// Pop places, fold round(a, places)
    Round = 0x08,
    /// Pop hi, fold random integer in lo..=hi
    RandomRange = 0x09,
    /// X distance to parent along facing
    ParentDistX = 0x0A,
    /// Y distance to parent
    ParentDistY = 0x0B,
    /// X distance to root along facing
    RootDistX = 0x0C,
    /// Y distance to root
    RootDistY = 0x0D,
    /// X distance to nearest opponent along facing
    P2DistX = 0x0E,
    /// Y distance to nearest opponent
    P2DistY = 0x0F,
    /// Push map(name) [i32 string index]
    MapGet = 0x10,
    /// Z position, scaled to the caller
    PosZ = 0x11,
    /// Z velocity, scaled to the caller
    VelZ = 0x12,
    /// Draw angle
    Angle = 0x13,
    /// Coordinate scale
    LocalScale = 0x14,
    /// Attack multiplier
    AttackMul = 0x15,
    /// Sprite priority
    SprPriority = 0x16,
}

impl ExtOp {
    pub fn operand(self) -> Operand {
        match self {
            ExtOp::MapGet => Operand::I32,
            _ => Operand::None,
        }
    }
}

impl TryFrom<u8> for ExtOp {
    type Error = ();

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(ExtOp::Max),
            0x01 => Ok(ExtOp::Min),
            0x02 => Ok(ExtOp::Clamp),
            0x03 => Ok(ExtOp::Sign),
            0x04 => Ok(ExtOp::Atan2),
            0x05 => Ok(ExtOp::Rad),
            0x06 => Ok(ExtOp::Deg),
            0x07 => Ok(ExtOp::Lerp),
            0x08 => Ok(ExtOp::Round),
            0x09 => Ok(ExtOp::RandomRange),
            0x0A => Ok(ExtOp::ParentDistX),
            0x0B => Ok(ExtOp::ParentDistY),
            0x0C => Ok(ExtOp::RootDistX),
            0x0D => Ok(ExtOp::RootDistY),
            0x0E => Ok(ExtOp::P2DistX),
            0x0F => Ok(ExtOp::P2DistY),
            0x10 => Ok(ExtOp::MapGet),
            0x11 => Ok(ExtOp::PosZ),
            0x12 => Ok(ExtOp::VelZ),
            0x13 => Ok(ExtOp::Angle),
            0x14 => Ok(ExtOp::LocalScale),
            0x15 => Ok(ExtOp::AttackMul),
            0x16 => Ok(ExtOp::SprPriority),
            _ => Err(()),
        }
    }
}
