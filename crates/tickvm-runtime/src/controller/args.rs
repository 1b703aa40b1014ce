//! Tag-keyed argument blocks
//!
//! A controller's arguments are a flat byte sequence of records:
//!
//! ```text
//! tag: u8, count: u8, (len: i32 LE, expression bytes) * count
//! ```
//!
//! [`ArgBlock::walk`] decodes the records in compile order and hands each one
//! to a callback, which may stop the walk early. [`Target`] carries the
//! redirect state shared by every effect controller.

use super::tags::REDIRECT_ID;
use crate::bytecode::{read_nested, read_u8, Expression};
use crate::entity::EntityId;
use crate::value::RuntimeError;
use crate::vm::VM;
use crate::world::World;
use std::borrow::Cow;

/// Encoded argument records of one controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgBlock {
    bytes: Vec<u8>,
}

impl ArgBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Builder form of [`ArgBlock::push`]
    pub fn with(mut self, tag: u8, exprs: &[Expression]) -> Self {
        self.push(tag, exprs);
        self
    }

    /// Appends a redirect record resolving `script_id`.
    pub fn redirect(self, script_id: Expression) -> Self {
        self.with(REDIRECT_ID, &[script_id])
    }

    pub fn push(&mut self, tag: u8, exprs: &[Expression]) {
        self.bytes.push(tag);
        self.bytes.push(exprs.len() as u8);
        for e in exprs {
            self.bytes.extend_from_slice(&(e.len() as i32).to_le_bytes());
            self.bytes.extend_from_slice(e.as_bytes());
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Visits every record in order until `f` returns false.
    ///
    /// Returns true when the walk reached the end.
    pub fn walk<F>(&self, mut f: F) -> Result<bool, RuntimeError>
    where
        F: FnMut(u8, &[&[u8]]) -> Result<bool, RuntimeError>,
    {
        let code = self.bytes.as_slice();
        let mut exprs: Vec<&[u8]> = Vec::new();
        let mut i = 0;
        while i < code.len() {
            let record = i;
            let malformed = |_| RuntimeError::MalformedArgs { offset: record };
            let tag = read_u8(code, i).map_err(malformed)?;
            let count = read_u8(code, i + 1).map_err(malformed)?;
            i += 2;
            exprs.clear();
            for _ in 0..count {
                let (body, next) = read_nested(code, i).map_err(malformed)?;
                exprs.push(body);
                i = next;
            }
            if !f(tag, &exprs)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// `n`th expression of a record
pub fn nth<'a>(tag: u8, exprs: &[&'a [u8]], n: usize) -> Result<&'a [u8], RuntimeError> {
    exprs
        .get(n)
        .copied()
        .ok_or(RuntimeError::MissingArgument { tag, needed: n + 1 })
}

/// Raw text argument
pub fn text(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// The entity a controller applies its effect to.
///
/// Argument expressions always run on `origin`, the entity executing the
/// controller. A redirect record moves `id` and recomputes `ratio`, which
/// converts positional arguments from `origin`'s coordinates into the
/// target's.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub origin: EntityId,
    pub id: EntityId,
    pub ratio: f32,
}

impl Target {
    pub fn new(origin: EntityId) -> Self {
        Self {
            origin,
            id: origin,
            ratio: 1.0,
        }
    }

    pub fn is_redirected(&self) -> bool {
        self.id != self.origin
    }

    /// Resolves the script id in `exprs[0]`. Returns false when nothing
    /// answers to it; the caller stops its walk.
    pub fn redirect(
        &mut self,
        vm: &mut VM,
        world: &mut dyn World,
        exprs: &[&[u8]],
    ) -> Result<bool, RuntimeError> {
        let script_id = self.i32(vm, world, REDIRECT_ID, exprs, 0)?;
        let Some(id) = world.player_id(script_id) else {
            return Ok(false);
        };
        let origin_scale = world.get(self.origin)?.local_scale;
        let target_scale = world.get(id)?.local_scale;
        self.id = id;
        self.ratio = origin_scale / target_scale;
        Ok(true)
    }

    pub fn i32(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        tag: u8,
        exprs: &[&[u8]],
        n: usize,
    ) -> Result<i32, RuntimeError> {
        vm.eval_i32(world, nth(tag, exprs, n)?, self.origin)
    }

    pub fn f32(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        tag: u8,
        exprs: &[&[u8]],
        n: usize,
    ) -> Result<f32, RuntimeError> {
        vm.eval_f32(world, nth(tag, exprs, n)?, self.origin)
    }

    pub fn bool(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        tag: u8,
        exprs: &[&[u8]],
        n: usize,
    ) -> Result<bool, RuntimeError> {
        vm.eval_bool(world, nth(tag, exprs, n)?, self.origin)
    }

    /// Evaluates `exprs[n]` if present.
    pub fn opt_f32(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        exprs: &[&[u8]],
        n: usize,
    ) -> Result<Option<f32>, RuntimeError> {
        exprs
            .get(n)
            .map(|code| vm.eval_f32(world, code, self.origin))
            .transpose()
    }

    pub fn opt_i32(
        &self,
        vm: &mut VM,
        world: &mut dyn World,
        exprs: &[&[u8]],
        n: usize,
    ) -> Result<Option<i32>, RuntimeError> {
        exprs
            .get(n)
            .map(|code| vm.eval_i32(world, code, self.origin))
            .transpose()
    }
}

/// Targets of `of` that still exist, narrowed to script id `id` (-1 = all)
pub fn targets_of(world: &dyn World, of: EntityId, id: i32) -> Vec<EntityId> {
    let Some(e) = world.entity(of) else {
        return Vec::new();
    };
    e.targets
        .iter()
        .copied()
        .filter(|&t| world.entity(t).is_some_and(|t| id < 0 || t.id == id))
        .collect()
}

/// Walk state of the controllers that act on the running entity's targets.
///
/// `attacker` is whose target list is read; a redirect moves it and
/// reselects every target of the new attacker. Once the selection is empty
/// the remaining records are skipped.
#[derive(Debug, Clone)]
pub struct Victims {
    pub attacker: Target,
    pub ids: Vec<EntityId>,
}

impl Victims {
    pub fn new(world: &dyn World, entity: EntityId) -> Self {
        Self {
            attacker: Target::new(entity),
            ids: targets_of(world, entity, -1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Narrows the selection to the script id in `exprs[0]`.
    pub fn select(
        &mut self,
        vm: &mut VM,
        world: &mut dyn World,
        tag: u8,
        exprs: &[&[u8]],
    ) -> Result<bool, RuntimeError> {
        if self.is_empty() {
            return Ok(false);
        }
        let id = self.attacker.i32(vm, world, tag, exprs, 0)?;
        self.ids = targets_of(world, self.attacker.id, id);
        Ok(true)
    }

    pub fn redirect(
        &mut self,
        vm: &mut VM,
        world: &mut dyn World,
        exprs: &[&[u8]],
    ) -> Result<bool, RuntimeError> {
        if !self.attacker.redirect(vm, world, exprs)? {
            return Ok(false);
        }
        self.ids = targets_of(world, self.attacker.id, -1);
        Ok(!self.is_empty())
    }
}
