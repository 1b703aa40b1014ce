//! Tagged scalar values and runtime errors
//!
//! Every opcode reads and writes [`Value`]s. The arithmetic rules live here so
//! the interpreter loop stays a thin dispatcher:
//!
//! - if either operand is `Float` the operation runs on `f32`, otherwise on
//!   wrapping 32-bit integers (results are stored widened to `i64`)
//! - `SentinelFalse` reads as `0`, `0.0` and `false` through every accessor
//! - any float result that would be NaN is stored as `SentinelFalse`

use crate::entity::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Runtime value
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// Uninitialized slot
    #[default]
    None,
    Float(f32),
    Int(i64),
    Bool(bool),
    /// "Computation failed / not applicable"
    SentinelFalse,
}

/// Bit order used by integer exponentiation.
///
/// Content authored against older engine versions depends on the legacy
/// order, which walks the exponent bits below the top bit in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowBitOrder {
    /// Every bit, low to high.
    #[default]
    Current,
    /// Bits below the highest set bit, high to low, then the highest bit.
    Legacy,
}

impl Value {
    /// Float constructor; NaN becomes `SentinelFalse`.
    pub fn float(f: f32) -> Self {
        if f.is_nan() {
            Value::SentinelFalse
        } else {
            Value::Float(f)
        }
    }

    pub fn int(i: i32) -> Self {
        Value::Int(i as i64)
    }

    pub fn int64(i: i64) -> Self {
        Value::Int(i)
    }

    pub fn bool(b: bool) -> Self {
        Value::Bool(b)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Value::SentinelFalse)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Float(_) => "float",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::SentinelFalse => "sf",
        }
    }

    pub fn to_f32(&self) -> f32 {
        match *self {
            Value::Float(f) => f,
            Value::Int(i) => i as f32,
            Value::Bool(b) => b as i32 as f32,
            Value::None | Value::SentinelFalse => 0.0,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match *self {
            Value::Float(f) => f as f64,
            Value::Int(i) => i as f64,
            Value::Bool(b) => b as i32 as f64,
            Value::None | Value::SentinelFalse => 0.0,
        }
    }

    /// Integer view with 32-bit wrapping for wide ints and truncation for floats.
    pub fn to_i32(&self) -> i32 {
        match *self {
            Value::Float(f) => f as i32,
            Value::Int(i) => i as i32,
            Value::Bool(b) => b as i32,
            Value::None | Value::SentinelFalse => 0,
        }
    }

    pub fn to_i64(&self) -> i64 {
        match *self {
            Value::Float(f) => f as i64,
            Value::Int(i) => i,
            Value::Bool(b) => b as i64,
            Value::None | Value::SentinelFalse => 0,
        }
    }

    pub fn to_bool(&self) -> bool {
        match *self {
            Value::Float(f) => f != 0.0,
            Value::Int(i) => i != 0,
            Value::Bool(b) => b,
            Value::None | Value::SentinelFalse => false,
        }
    }

    /// Numeric view for transcendental math. `SentinelFalse` is NaN here so
    /// that a failed input stays failed through `exp`, `cos`, `atan2` and friends.
    fn raw(&self) -> f64 {
        match self {
            Value::SentinelFalse => f64::NAN,
            other => other.to_f64(),
        }
    }

    pub fn set_f32(&mut self, f: f32) {
        *self = Value::float(f);
    }

    pub fn set_i32(&mut self, i: i32) {
        *self = Value::Int(i as i64);
    }

    pub fn set_bool(&mut self, b: bool) {
        *self = Value::Bool(b);
    }

    fn set_f64(&mut self, f: f64) {
        self.set_f32(f as f32);
    }

    /// Float domain only when one side is a float and neither is `None`.
    fn floating(&self, rhs: &Value) -> bool {
        let unset = matches!(self, Value::None) || matches!(rhs, Value::None);
        !unset && (self.is_float() || rhs.is_float())
    }

    // ===== Unary =====

    pub fn neg(&mut self) {
        match self {
            Value::Float(f) => *f = -*f,
            _ => self.set_i32(self.to_i32().wrapping_neg()),
        }
    }

    pub fn bit_not(&mut self) {
        self.set_i32(!self.to_i32());
    }

    pub fn bool_not(&mut self) {
        self.set_bool(!self.to_bool());
    }

    pub fn abs(&mut self) {
        match self {
            Value::Float(f) => *f = f.abs(),
            _ => self.set_i32(self.to_i32().wrapping_abs()),
        }
    }

    pub fn exp(&mut self) {
        self.set_f64(self.raw().exp());
    }

    pub fn ln(&mut self) {
        let v = self.raw();
        if v <= 0.0 {
            *self = Value::SentinelFalse;
        } else {
            self.set_f64(v.ln());
        }
    }

    /// Logarithm of `rhs` in base `self`.
    pub fn log(&mut self, rhs: Value) {
        let (base, v) = (self.raw(), rhs.raw());
        if base <= 0.0 || v <= 0.0 {
            *self = Value::SentinelFalse;
        } else {
            self.set_f64(v.ln() / base.ln());
        }
    }

    pub fn cos(&mut self) {
        self.set_f64(self.raw().cos());
    }

    pub fn sin(&mut self) {
        self.set_f64(self.raw().sin());
    }

    pub fn tan(&mut self) {
        self.set_f64(self.raw().tan());
    }

    pub fn acos(&mut self) {
        self.set_f64(self.raw().acos());
    }

    pub fn asin(&mut self) {
        self.set_f64(self.raw().asin());
    }

    pub fn atan(&mut self) {
        self.set_f64(self.raw().atan());
    }

    /// Rounds a float down and retags it as an integer.
    ///
    /// Non-float values pass through unchanged. That looks unintended, but
    /// existing content depends on it.
    pub fn floor(&mut self) {
        if let Value::Float(f) = *self {
            let r = (f as f64).floor();
            if r.is_nan() {
                *self = Value::SentinelFalse;
            } else {
                self.set_i32(r as i32);
            }
        }
    }

    /// Rounds a float up and retags it as an integer.
    /// Non-float values pass through unchanged.
    pub fn ceil(&mut self) {
        if let Value::Float(f) = *self {
            let r = (f as f64).ceil();
            if r.is_nan() {
                *self = Value::SentinelFalse;
            } else {
                self.set_i32(r as i32);
            }
        }
    }

    pub fn sign(&mut self) {
        let v = self.raw();
        self.set_i32(if v < 0.0 {
            -1
        } else if v > 0.0 {
            1
        } else {
            0
        });
    }

    pub fn rad(&mut self) {
        self.set_f64(self.raw().to_radians());
    }

    pub fn deg(&mut self) {
        self.set_f64(self.raw().to_degrees());
    }

    // ===== Arithmetic =====

    pub fn add(&mut self, rhs: Value) {
        if self.floating(&rhs) {
            self.set_f32(self.to_f32() + rhs.to_f32());
        } else {
            self.set_i32(self.to_i32().wrapping_add(rhs.to_i32()));
        }
    }

    pub fn sub(&mut self, rhs: Value) {
        if self.floating(&rhs) {
            self.set_f32(self.to_f32() - rhs.to_f32());
        } else {
            self.set_i32(self.to_i32().wrapping_sub(rhs.to_i32()));
        }
    }

    pub fn mul(&mut self, rhs: Value) {
        if self.floating(&rhs) {
            self.set_f32(self.to_f32() * rhs.to_f32());
        } else {
            self.set_i32(self.to_i32().wrapping_mul(rhs.to_i32()));
        }
    }

    pub fn div(&mut self, rhs: Value) {
        if self.floating(&rhs) {
            self.set_f32(self.to_f32() / rhs.to_f32());
        } else if rhs.to_i32() == 0 {
            *self = Value::SentinelFalse;
        } else {
            self.set_i32(self.to_i32().wrapping_div(rhs.to_i32()));
        }
    }

    /// Remainder, always in the integer domain.
    pub fn rem(&mut self, rhs: Value) {
        let divisor = rhs.to_i32();
        if divisor == 0 {
            *self = Value::SentinelFalse;
        } else {
            self.set_i32(self.to_i32().wrapping_rem(divisor));
        }
    }

    pub fn pow(&mut self, rhs: Value, order: PowBitOrder) {
        if self.floating(&rhs) || rhs.to_f32() < 0.0 {
            self.set_f64((self.to_f32() as f64).powf(rhs.to_f32() as f64));
        } else {
            self.set_i32(int_pow(self.to_i32(), rhs.to_i32(), order));
        }
    }

    // ===== Comparison =====

    pub fn gt(&mut self, rhs: Value) {
        let r = if self.floating(&rhs) {
            self.to_f32() > rhs.to_f32()
        } else {
            self.to_i32() > rhs.to_i32()
        };
        self.set_bool(r);
    }

    pub fn ge(&mut self, rhs: Value) {
        let r = if self.floating(&rhs) {
            self.to_f32() >= rhs.to_f32()
        } else {
            self.to_i32() >= rhs.to_i32()
        };
        self.set_bool(r);
    }

    pub fn lt(&mut self, rhs: Value) {
        let r = if self.floating(&rhs) {
            self.to_f32() < rhs.to_f32()
        } else {
            self.to_i32() < rhs.to_i32()
        };
        self.set_bool(r);
    }

    pub fn le(&mut self, rhs: Value) {
        let r = if self.floating(&rhs) {
            self.to_f32() <= rhs.to_f32()
        } else {
            self.to_i32() <= rhs.to_i32()
        };
        self.set_bool(r);
    }

    pub fn equals(&mut self, rhs: Value) {
        let r = if self.floating(&rhs) {
            self.to_f32() == rhs.to_f32()
        } else {
            self.to_i32() == rhs.to_i32()
        };
        self.set_bool(r);
    }

    pub fn not_equals(&mut self, rhs: Value) {
        self.equals(rhs);
        self.bool_not();
    }

    // ===== Bitwise / logical =====

    pub fn bit_and(&mut self, rhs: Value) {
        self.set_i32(self.to_i32() & rhs.to_i32());
    }

    pub fn bit_or(&mut self, rhs: Value) {
        self.set_i32(self.to_i32() | rhs.to_i32());
    }

    pub fn bit_xor(&mut self, rhs: Value) {
        self.set_i32(self.to_i32() ^ rhs.to_i32());
    }

    pub fn bool_and(&mut self, rhs: Value) {
        self.set_bool(self.to_bool() && rhs.to_bool());
    }

    pub fn bool_or(&mut self, rhs: Value) {
        self.set_bool(self.to_bool() || rhs.to_bool());
    }

    pub fn bool_xor(&mut self, rhs: Value) {
        self.set_bool(self.to_bool() != rhs.to_bool());
    }

    // ===== Extended math (always float results) =====

    pub fn max(&mut self, rhs: Value) {
        let (a, b) = (self.raw(), rhs.raw());
        self.set_f64(if a >= b { a } else { b });
    }

    pub fn min(&mut self, rhs: Value) {
        let (a, b) = (self.raw(), rhs.raw());
        self.set_f64(if a <= b { a } else { b });
    }

    pub fn clamp(&mut self, lo: Value, hi: Value) {
        let (v, lo, hi) = (self.raw(), lo.raw(), hi.raw());
        self.set_f64(if v <= lo {
            lo
        } else if v >= hi {
            hi
        } else {
            v
        });
    }

    pub fn atan2(&mut self, x: Value) {
        self.set_f64(self.raw().atan2(x.raw()));
    }

    /// Linear interpolation toward `to`; `amount` is clamped into `[0, 1]`.
    pub fn lerp(&mut self, to: Value, amount: Value) {
        let t = amount.raw();
        let t = if t <= 0.0 {
            0.0
        } else if t >= 1.0 {
            1.0
        } else {
            t
        };
        let from = self.raw();
        self.set_f64(from + (to.raw() - from) * t);
    }

    /// Round half up at `places` decimal places.
    pub fn round(&mut self, places: Value) {
        let shift = 10f64.powf(places.raw());
        self.set_f64((self.raw() * shift + 0.5).floor() / shift);
    }
}

/// Square-and-multiply integer power with 32-bit wrapping.
///
/// `exp` must be non-negative; negative exponents take the float path in
/// [`Value::pow`].
pub fn int_pow(base: i32, exp: i32, order: PowBitOrder) -> i32 {
    let bits = exp as u32;
    if bits == 0 {
        return 1;
    }
    let high = 31 - bits.leading_zeros() as i32;
    let mut result: i32 = 1;
    let mut square = base;
    for bit in 0..=high {
        let shift = if bit == high || order == PowBitOrder::Current {
            bit
        } else {
            (high - 1) - bit
        };
        if bits & (1u32 << shift) != 0 {
            result = result.wrapping_mul(square);
        }
        square = square.wrapping_mul(square);
    }
    result
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::Float(v) => write!(f, "{}", v),
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(b) => write!(f, "{}", b),
            Value::SentinelFalse => write!(f, "sf"),
        }
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::int(i)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Fatal errors.
///
/// Any of these aborts the owning entity's evaluation for the current tick.
/// Soft failures never show up here; they are `SentinelFalse` values or
/// controllers that had no effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Operand stack underflow")]
    StackUnderflow,

    #[error("Unknown opcode {opcode:#04x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("Truncated operand at offset {offset}")]
    TruncatedOperand { offset: usize },

    #[error("Operand stack holds {} value(s) at end of state {state}", dump.len())]
    StackImbalance { state: i32, dump: Vec<Value> },

    #[error("Function '{function}' expects {expected} argument(s), stack holds {found}")]
    ArgumentCountMismatch {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("Function '{function}' returns {expected} value(s), call site binds {found}")]
    ReturnCountMismatch {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("Local slot {slot} is outside the current window of {len}")]
    LocalSlotOutOfRange { slot: usize, len: usize },

    #[error("No variable window is active")]
    NoActiveWindow,

    #[error("Entity {0} is not live")]
    MissingEntity(EntityId),

    #[error("Loop exceeded {limit} iterations")]
    LoopLimitExceeded { limit: u32 },

    #[error("String pool index {index} out of range")]
    StringIndexOutOfRange { index: i32 },

    #[error("Malformed argument block at offset {offset}")]
    MalformedArgs { offset: usize },

    #[error("Argument tag {tag} needs at least {needed} expression(s)")]
    MissingArgument { tag: u8, needed: usize },

    #[error("Save-state file error: {0}")]
    SaveState(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    fn binary(mut a: Value, b: Value, op: fn(&mut Value, Value)) -> Value {
        op(&mut a, b);
        a
    }

    // ============================================================================
    // Promotion
    // ============================================================================

    #[rstest]
    #[case::int_div(Value::int(7), Value::int(2), Value::int(3))]
    #[case::float_div(Value::Float(7.0), Value::int(2), Value::Float(3.5))]
    #[case::div_by_float_zero(Value::Float(1.0), Value::int(0), Value::Float(f32::INFINITY))]
    #[case::int_div_zero(Value::int(7), Value::int(0), Value::SentinelFalse)]
    #[case::bool_operands(Value::Bool(true), Value::int(1), Value::int(1))]
    fn test_div(#[case] a: Value, #[case] b: Value, #[case] expected: Value) {
        assert_eq!(binary(a, b, Value::div), expected);
    }

    #[rstest]
    #[case::none_plus_float(Value::None, Value::Float(2.5), Value::add, Value::int(2))]
    #[case::float_times_none(Value::Float(2.5), Value::None, Value::mul, Value::int(0))]
    #[case::none_lt_float(Value::None, Value::Float(0.5), Value::lt, Value::Bool(false))]
    #[case::none_div_float(Value::None, Value::Float(0.5), Value::div, Value::SentinelFalse)]
    fn test_unset_operand_stays_integer(
        #[case] a: Value,
        #[case] b: Value,
        #[case] op: fn(&mut Value, Value),
        #[case] expected: Value,
    ) {
        assert_eq!(binary(a, b, op), expected);
    }

    #[rstest]
    #[case::int(Value::int(7), Value::int(3), Value::int(1))]
    #[case::float_truncated(Value::Float(7.9), Value::Float(3.2), Value::int(1))]
    #[case::negative(Value::int(-7), Value::int(3), Value::int(-1))]
    #[case::zero(Value::int(7), Value::int(0), Value::SentinelFalse)]
    #[case::float_zero(Value::Float(7.0), Value::Float(0.4), Value::SentinelFalse)]
    fn test_rem(#[case] a: Value, #[case] b: Value, #[case] expected: Value) {
        assert_eq!(binary(a, b, Value::rem), expected);
    }

    #[test]
    fn test_int_arithmetic_wraps() {
        assert_eq!(
            binary(Value::int(i32::MAX), Value::int(1), Value::add),
            Value::int(i32::MIN)
        );
        assert_eq!(
            binary(Value::int(i32::MIN), Value::int(-1), Value::div),
            Value::int(i32::MIN)
        );
    }

    #[test]
    fn test_mixed_comparison_uses_float() {
        assert_eq!(
            binary(Value::Float(2.5), Value::int(2), Value::gt),
            Value::Bool(true)
        );
        assert_eq!(
            binary(Value::int(2), Value::Float(2.0), Value::equals),
            Value::Bool(true)
        );
    }

    // ============================================================================
    // Sentinel-false
    // ============================================================================

    #[test]
    fn test_sentinel_coerces_to_zero() {
        let sf = Value::SentinelFalse;
        assert_eq!(sf.to_f32(), 0.0);
        assert_eq!(sf.to_i32(), 0);
        assert_eq!(sf.to_i64(), 0);
        assert!(!sf.to_bool());
        assert_ne!(sf, Value::int(0));
    }

    #[test]
    fn test_nan_setter_yields_sentinel() {
        let mut v = Value::int(3);
        v.set_f32(f32::NAN);
        assert_eq!(v, Value::SentinelFalse);
        assert_eq!(Value::float(f32::NAN), Value::SentinelFalse);
    }

    #[rstest]
    #[case::zero(Value::int(0))]
    #[case::negative(Value::Float(-1.0))]
    #[case::sentinel(Value::SentinelFalse)]
    fn test_ln_domain(#[case] input: Value) {
        let mut v = input;
        v.ln();
        assert_eq!(v, Value::SentinelFalse);
    }

    #[test]
    fn test_log_base() {
        let mut v = Value::int(2);
        v.log(Value::int(8));
        assert_eq!(v, Value::Float(3.0));

        let mut v = Value::int(2);
        v.log(Value::int(0));
        assert_eq!(v, Value::SentinelFalse);
    }

    #[test]
    fn test_sentinel_survives_trig() {
        let mut v = Value::SentinelFalse;
        v.cos();
        assert_eq!(v, Value::SentinelFalse);
    }

    #[test]
    fn test_asin_out_of_domain_is_sentinel() {
        let mut v = Value::int(2);
        v.asin();
        assert_eq!(v, Value::SentinelFalse);
    }

    // ============================================================================
    // floor / ceil
    // ============================================================================

    #[test]
    fn test_floor_ceil_retag_floats() {
        let mut v = Value::Float(-1.5);
        v.floor();
        assert_eq!(v, Value::int(-2));

        let mut v = Value::Float(1.2);
        v.ceil();
        assert_eq!(v, Value::int(2));
    }

    #[rstest]
    #[case::int(Value::int(5))]
    #[case::bool(Value::Bool(true))]
    #[case::sentinel(Value::SentinelFalse)]
    fn test_floor_ceil_pass_through_non_floats(#[case] input: Value) {
        let mut v = input;
        v.floor();
        assert_eq!(v, input);
        v.ceil();
        assert_eq!(v, input);
    }

    // ============================================================================
    // pow
    // ============================================================================

    #[rstest]
    #[case::ten(2, 10, 1024, 1024)]
    #[case::thirteen(2, 13, 8192, 8192)]
    #[case::thirteen_base3(3, 13, 1_594_323, 1_594_323)]
    #[case::eleven(2, 11, 2048, 16384)]
    #[case::six(2, 6, 64, 32)]
    #[case::zero(9, 0, 1, 1)]
    #[case::one(9, 1, 9, 9)]
    #[case::negative_base(-3, 3, -27, -27)]
    fn test_int_pow_orders(
        #[case] base: i32,
        #[case] exp: i32,
        #[case] current: i32,
        #[case] legacy: i32,
    ) {
        assert_eq!(int_pow(base, exp, PowBitOrder::Current), current);
        assert_eq!(int_pow(base, exp, PowBitOrder::Legacy), legacy);
    }

    #[test]
    fn test_pow_float_paths() {
        let mut v = Value::int(2);
        v.pow(Value::int(-1), PowBitOrder::Current);
        assert_eq!(v, Value::Float(0.5));

        let mut v = Value::Float(4.0);
        v.pow(Value::Float(0.5), PowBitOrder::Legacy);
        assert_eq!(v, Value::Float(2.0));

        let mut v = Value::Float(-8.0);
        v.pow(Value::Float(0.5), PowBitOrder::Current);
        assert_eq!(v, Value::SentinelFalse);
    }

    // ============================================================================
    // Extended math
    // ============================================================================

    #[test]
    fn test_max_min_return_floats() {
        let mut v = Value::int(3);
        v.max(Value::int(5));
        assert_eq!(v, Value::Float(5.0));

        let mut v = Value::int(3);
        v.min(Value::int(5));
        assert_eq!(v, Value::Float(3.0));
    }

    #[test]
    fn test_clamp_lerp_round_sign() {
        let mut v = Value::int(12);
        v.clamp(Value::int(0), Value::int(10));
        assert_eq!(v, Value::Float(10.0));

        let mut v = Value::Float(0.0);
        v.lerp(Value::Float(10.0), Value::Float(2.0));
        assert_eq!(v, Value::Float(10.0));

        let mut v = Value::Float(1.2345);
        v.round(Value::int(2));
        assert_eq!(v, Value::Float(1.23));

        let mut v = Value::Float(-0.3);
        v.sign();
        assert_eq!(v, Value::int(-1));
    }

    #[test]
    fn test_neg_abs_keep_float_tag() {
        let mut v = Value::Float(2.0);
        v.neg();
        assert_eq!(v, Value::Float(-2.0));
        v.abs();
        assert_eq!(v, Value::Float(2.0));

        let mut v = Value::SentinelFalse;
        v.neg();
        assert_eq!(v, Value::int(0));
    }

    proptest! {
        #[test]
        fn prop_int_ops_stay_integer(a in any::<i32>(), b in any::<i32>()) {
            for op in [Value::add, Value::sub, Value::mul] {
                let r = binary(Value::int(a), Value::int(b), op);
                prop_assert!(matches!(r, Value::Int(_)));
            }
        }

        #[test]
        fn prop_float_operand_promotes(a in -1.0e6f32..1.0e6, b in any::<i32>()) {
            let r = binary(Value::Float(a), Value::int(b), Value::add);
            prop_assert!(matches!(r, Value::Float(_)));
        }

        #[test]
        fn prop_current_pow_matches_wrapping_pow(base in -20i32..20, exp in 0u32..40) {
            prop_assert_eq!(
                int_pow(base, exp as i32, PowBitOrder::Current),
                base.wrapping_pow(exp)
            );
        }
    }
}
