//! Entity directory
//!
//! The VM never owns entities. Everything it needs from the surrounding
//! simulation goes through the [`World`] trait: lookups by handle, role
//! resolution for redirects, helper lifecycle, the clock and the RNG.
//! [`Roster`] is the in-memory directory used by the executor, the CLI and
//! the tests.

use crate::entity::{Entity, EntityId};
use crate::value::RuntimeError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// First script-visible id handed out
pub const FIRST_SCRIPT_ID: i32 = 56;
/// Helpers one player may own at a time
pub const HELPER_LIMIT: usize = 56;

/// Directory collaborator
///
/// Every resolver returns `None` when the role has no live entity; the VM
/// turns that into a failed redirect.
pub trait World {
    fn entity(&self, id: EntityId) -> Option<&Entity>;
    fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity>;

    /// Root entity of player `n` (1-based)
    fn player(&self, n: i32) -> Option<EntityId>;
    /// Live entity with the given script id
    fn player_id(&self, script_id: i32) -> Option<EntityId>;
    /// `n`th live entity in run order (0-based)
    fn player_index(&self, n: i32) -> Option<EntityId>;
    fn parent(&self, of: EntityId) -> Option<EntityId>;
    fn root(&self, of: EntityId) -> Option<EntityId>;
    /// First helper of `of`'s player with `helper_id` (<= 0 = any)
    fn helper(&self, of: EntityId, helper_id: i32) -> Option<EntityId>;
    /// `n`th helper of `of`'s player in spawn order (0-based)
    fn helper_index(&self, of: EntityId, n: i32) -> Option<EntityId>;
    /// First live target of `of` with script id `id` (< 0 = any)
    fn target(&self, of: EntityId, id: i32) -> Option<EntityId>;
    /// `n`th teammate root (0-based)
    fn partner(&self, of: EntityId, n: i32) -> Option<EntityId>;
    /// `n`th opponent root by player number (0-based)
    fn enemy(&self, of: EntityId, n: i32) -> Option<EntityId>;
    /// `n`th opponent root by horizontal distance (0-based)
    fn enemy_near(&self, of: EntityId, n: i32) -> Option<EntityId>;
    /// Root of the player whose program library runs `of`'s state
    fn state_owner(&self, of: EntityId) -> Option<EntityId>;

    fn num_helpers(&self, of: EntityId, helper_id: i32) -> i32;
    fn num_partners(&self, of: EntityId) -> i32;
    fn num_enemies(&self, of: EntityId) -> i32;

    /// Creates a helper owned by `parent`. `None` when the helper limit is hit.
    fn spawn_helper(&mut self, parent: EntityId, name: &str) -> Option<EntityId>;
    /// Removes an entity, and its descendants when `recursive`.
    fn destroy(&mut self, id: EntityId, recursive: bool) -> bool;

    fn game_time(&self) -> i32;
    fn round_state(&self) -> i32;
    fn advance_tick(&mut self);

    /// Uniform integer in `lo..=hi` from the simulation's deterministic RNG
    fn random_range(&mut self, lo: i32, hi: i32) -> i32;

    /// Live entities in execution order
    fn run_order(&self) -> Vec<EntityId>;

    /// Nearest opponent
    fn p2(&self, of: EntityId) -> Option<EntityId> {
        self.enemy_near(of, 0)
    }

    fn get(&self, id: EntityId) -> Result<&Entity, RuntimeError> {
        self.entity(id).ok_or(RuntimeError::MissingEntity(id))
    }

    fn get_mut(&mut self, id: EntityId) -> Result<&mut Entity, RuntimeError> {
        self.entity_mut(id).ok_or(RuntimeError::MissingEntity(id))
    }
}

/// Arena directory
///
/// Handles increase monotonically, so `BTreeMap` order is spawn order and
/// doubles as the run order.
#[derive(Debug, Clone)]
pub struct Roster {
    entities: BTreeMap<EntityId, Entity>,
    next_handle: u32,
    next_script_id: i32,
    game_time: i32,
    round_state: i32,
    rng: StdRng,
}

impl Default for Roster {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            entities: BTreeMap::new(),
            next_handle: 0,
            next_script_id: FIRST_SCRIPT_ID,
            game_time: 0,
            round_state: 2,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Adds the root entity of player `player_no`. Odd players face even ones.
    pub fn add_player(&mut self, player_no: usize, name: &str) -> EntityId {
        let mut e = Entity::new(self.next_script_id, player_no, name);
        e.team_side = if player_no % 2 == 1 { 1 } else { 2 };
        if e.team_side == 2 {
            e.facing = -1.0;
        }
        self.insert(e)
    }

    pub fn set_round_state(&mut self, state: i32) {
        self.round_state = state;
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().map(|(&id, e)| (id, e))
    }

    fn insert(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.next_handle);
        self.next_handle += 1;
        self.next_script_id += 1;
        self.entities.insert(id, entity);
        id
    }

    fn roots(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.iter().filter(|(_, e)| !e.is_helper)
    }

    /// Root handle of `of`, itself for a root
    fn root_of(&self, of: EntityId) -> Option<EntityId> {
        let e = self.entities.get(&of)?;
        if e.is_helper {
            e.root.filter(|r| self.entities.contains_key(r))
        } else {
            Some(of)
        }
    }

    fn helpers_of(&self, of: EntityId) -> impl Iterator<Item = (EntityId, &Entity)> {
        let player_no = self.entities.get(&of).map(|e| e.player_no);
        self.iter()
            .filter(move |(_, e)| e.is_helper && Some(e.player_no) == player_no)
    }

    fn opponents(&self, of: EntityId) -> Vec<(EntityId, &Entity)> {
        let Some(side) = self.entities.get(&of).map(|e| e.team_side) else {
            return Vec::new();
        };
        self.roots()
            .filter(|(_, e)| e.team_side != side && e.alive())
            .collect()
    }

    fn teammates(&self, of: EntityId) -> Vec<(EntityId, &Entity)> {
        let Some(root) = self.root_of(of) else {
            return Vec::new();
        };
        let side = self.entities[&root].team_side;
        self.roots()
            .filter(|&(id, e)| id != root && e.team_side == side)
            .collect()
    }

    fn descendants(&self, of: EntityId) -> Vec<EntityId> {
        let mut found = Vec::new();
        let mut frontier = vec![of];
        while let Some(parent) = frontier.pop() {
            for (id, e) in self.iter() {
                if e.parent == Some(parent) {
                    found.push(id);
                    frontier.push(id);
                }
            }
        }
        found
    }
}

fn nth<T>(items: impl Iterator<Item = T>, n: i32) -> Option<T> {
    usize::try_from(n).ok().and_then(|n| items.into_iter().nth(n))
}

impl World for Roster {
    fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    fn player(&self, n: i32) -> Option<EntityId> {
        self.roots()
            .find(|(_, e)| e.player_no as i32 == n)
            .map(|(id, _)| id)
    }

    fn player_id(&self, script_id: i32) -> Option<EntityId> {
        self.iter()
            .find(|(_, e)| e.id == script_id)
            .map(|(id, _)| id)
    }

    fn player_index(&self, n: i32) -> Option<EntityId> {
        nth(self.entities.keys().copied(), n)
    }

    fn parent(&self, of: EntityId) -> Option<EntityId> {
        self.entities
            .get(&of)?
            .parent
            .filter(|p| self.entities.contains_key(p))
    }

    fn root(&self, of: EntityId) -> Option<EntityId> {
        if self.entities.get(&of)?.is_helper {
            self.root_of(of)
        } else {
            None
        }
    }

    fn helper(&self, of: EntityId, helper_id: i32) -> Option<EntityId> {
        self.helpers_of(of)
            .find(|(_, e)| helper_id <= 0 || e.helper_id == helper_id)
            .map(|(id, _)| id)
    }

    fn helper_index(&self, of: EntityId, n: i32) -> Option<EntityId> {
        nth(self.helpers_of(of).map(|(id, _)| id), n)
    }

    fn target(&self, of: EntityId, id: i32) -> Option<EntityId> {
        self.entities.get(&of)?.targets.iter().copied().find(|t| {
            self.entities
                .get(t)
                .is_some_and(|e| id < 0 || e.id == id)
        })
    }

    fn partner(&self, of: EntityId, n: i32) -> Option<EntityId> {
        nth(self.teammates(of).into_iter().map(|(id, _)| id), n)
    }

    fn enemy(&self, of: EntityId, n: i32) -> Option<EntityId> {
        nth(self.opponents(of).into_iter().map(|(id, _)| id), n)
    }

    fn enemy_near(&self, of: EntityId, n: i32) -> Option<EntityId> {
        let x = self.entities.get(&of)?.pos[0];
        let mut opponents = self.opponents(of);
        opponents.sort_by(|(_, a), (_, b)| {
            (a.pos[0] - x).abs().total_cmp(&(b.pos[0] - x).abs())
        });
        nth(opponents.into_iter().map(|(id, _)| id), n)
    }

    fn state_owner(&self, of: EntityId) -> Option<EntityId> {
        let owner = self.entities.get(&of)?.state.owner;
        self.player(owner as i32)
    }

    fn num_helpers(&self, of: EntityId, helper_id: i32) -> i32 {
        self.helpers_of(of)
            .filter(|(_, e)| helper_id <= 0 || e.helper_id == helper_id)
            .count() as i32
    }

    fn num_partners(&self, of: EntityId) -> i32 {
        self.teammates(of).iter().filter(|(_, e)| e.alive()).count() as i32
    }

    fn num_enemies(&self, of: EntityId) -> i32 {
        self.opponents(of).len() as i32
    }

    fn spawn_helper(&mut self, parent: EntityId, name: &str) -> Option<EntityId> {
        let p = self.entities.get(&parent)?;
        if self.helpers_of(parent).count() >= HELPER_LIMIT {
            return None;
        }
        let mut helper = Entity::new(self.next_script_id, p.player_no, name);
        helper.is_helper = true;
        helper.parent = Some(parent);
        helper.root = Some(if p.is_helper { p.root? } else { parent });
        helper.team_side = p.team_side;
        helper.local_scale = p.local_scale;
        helper.facing = p.facing;
        helper.pos = p.pos;
        helper.consts = p.consts.clone();
        helper.state.owner = p.state.owner;
        Some(self.insert(helper))
    }

    fn destroy(&mut self, id: EntityId, recursive: bool) -> bool {
        if recursive {
            for child in self.descendants(id) {
                self.entities.remove(&child);
            }
        } else {
            for e in self.entities.values_mut() {
                if e.parent == Some(id) {
                    e.parent = None;
                }
            }
        }
        self.entities.remove(&id).is_some()
    }

    fn game_time(&self) -> i32 {
        self.game_time
    }

    fn round_state(&self) -> i32 {
        self.round_state
    }

    fn advance_tick(&mut self) {
        self.game_time = self.game_time.wrapping_add(1);
    }

    fn random_range(&mut self, lo: i32, hi: i32) -> i32 {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        self.rng.random_range(lo..=hi)
    }

    fn run_order(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }
}
