//! Tick executor
//!
//! Drives one simulation tick: every live entity, in the directory's run
//! order, applies its pending state change, runs its active program and
//! follows any chain of state changes that program requests. Bound entities
//! then snap to their anchor. A fatal
//! [`RuntimeError`] aborts only the entity that raised it; the VM scratch
//! state is reset and the tick moves on.

use crate::entity::{Binding, BlockMemory, EntityId, StateRequest};
use crate::program::{BehaviorProgram, ProgramLibrary};
use crate::value::RuntimeError;
use crate::vm::VM;
use crate::world::World;
use std::collections::BTreeMap;
use std::sync::Arc;
use tickvm_config::VmConfig;
use tracing::{debug, error, warn};

/// An entity whose logic was cut short by a fatal error
#[derive(Debug, Clone, PartialEq)]
pub struct Abort {
    pub entity: EntityId,
    pub state: i32,
    pub owner: usize,
    pub error: RuntimeError,
}

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Game time the tick ran at
    pub tick: i32,
    /// Entities whose logic completed
    pub ran: Vec<EntityId>,
    pub aborted: Vec<Abort>,
    /// Entities that hit the state-change limit; their last request waits
    /// for the next tick
    pub chain_limited: Vec<EntityId>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.aborted.is_empty()
    }
}

enum Step {
    Done,
    ChainLimited,
    Destroyed,
}

pub struct Executor {
    vm: VM,
    config: VmConfig,
    /// Program libraries by player number
    libraries: BTreeMap<usize, Arc<ProgramLibrary>>,
    max_state_changes: u32,
}

impl Default for Executor {
    fn default() -> Self {
        Self::from_config(&VmConfig::default())
    }
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &VmConfig) -> Self {
        Self {
            vm: VM::from_config(config),
            config: config.clone(),
            libraries: BTreeMap::new(),
            max_state_changes: config.max_state_changes_per_tick(),
        }
    }

    /// Replaces the VM, e.g. with a profiling one.
    pub fn with_vm(mut self, vm: VM) -> Self {
        self.vm = vm;
        self
    }

    pub fn vm(&self) -> &VM {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut VM {
        &mut self.vm
    }

    /// Installs the program library of `player_no`, resolving its pow bit
    /// order against this executor's configuration.
    pub fn add_library(&mut self, player_no: usize, mut library: ProgramLibrary) {
        library.configure(&self.config);
        self.libraries.insert(player_no, Arc::new(library));
    }

    pub fn library(&self, player_no: usize) -> Option<&Arc<ProgramLibrary>> {
        self.libraries.get(&player_no)
    }

    /// Runs one tick over every entity and advances the world clock.
    pub fn tick(&mut self, world: &mut dyn World) -> TickReport {
        let mut report = TickReport {
            tick: world.game_time(),
            ..TickReport::default()
        };

        for entity in world.run_order() {
            // Destroyed earlier in this tick.
            if world.entity(entity).is_none() {
                continue;
            }
            match self.step(world, entity) {
                Ok(Step::Done) => report.ran.push(entity),
                Ok(Step::ChainLimited) => {
                    report.ran.push(entity);
                    report.chain_limited.push(entity);
                }
                Ok(Step::Destroyed) => {}
                Err(err) => {
                    let (state, owner) = world
                        .entity(entity)
                        .map(|e| (e.state.number, e.state.owner))
                        .unwrap_or_default();
                    error!(
                        entity = %entity,
                        state,
                        owner,
                        error = %err,
                        stack = ?self.vm.stack().as_slice(),
                        "entity logic aborted"
                    );
                    self.vm.reset();
                    report.aborted.push(Abort {
                        entity,
                        state,
                        owner,
                        error: err,
                    });
                }
            }
        }

        world.advance_tick();
        report
    }

    fn step(&mut self, world: &mut dyn World, entity: EntityId) -> Result<Step, RuntimeError> {
        let mut changes = 0u32;
        let mut limited = false;
        world.get_mut(entity)?.pos_freeze = false;
        loop {
            if let Some(request) = world.get_mut(entity)?.pending_state.take() {
                self.enter(world, entity, request)?;
                changes += 1;
            }

            let Some(program) = self.active_program(world, entity)? else {
                break;
            };
            let mut memory = std::mem::take(&mut world.get_mut(entity)?.block_memory);
            let result = program.run(&mut self.vm, world, entity, &mut memory);
            if let Some(e) = world.entity_mut(entity) {
                e.block_memory = memory;
            }
            let changed = result?;

            let Some(e) = world.entity(entity) else {
                return Ok(Step::Destroyed);
            };
            if !changed || e.pending_state.is_none() {
                break;
            }
            if changes >= self.max_state_changes {
                warn!(
                    entity = %entity,
                    state = e.state.number,
                    limit = self.max_state_changes,
                    "state change chain limit reached"
                );
                limited = true;
                break;
            }
        }

        follow_binding(world, entity)?;
        world.get_mut(entity)?.state.time += 1;
        Ok(if limited {
            Step::ChainLimited
        } else {
            Step::Done
        })
    }

    /// Switches `entity` into the requested state.
    fn enter(
        &mut self,
        world: &mut dyn World,
        entity: EntityId,
        request: StateRequest,
    ) -> Result<(), RuntimeError> {
        let e = world.get_mut(entity)?;
        let owner = request.owner.unwrap_or(e.state.owner);
        debug!(
            entity = %entity,
            from = e.state.number,
            to = request.number,
            owner,
            "state change"
        );
        e.state.prev_number = e.state.number;
        e.state.number = request.number;
        e.state.time = 0;
        e.state.owner = owner;

        match self.program(owner, request.number) {
            Some((library, program)) => {
                self.vm
                    .bind_library(library.strings().clone(), library.pow_order());
                program.enter(&mut self.vm, world, entity)?;
            }
            None => {
                warn!(entity = %entity, state = request.number, owner, "no program for state");
                world.get_mut(entity)?.block_memory = BlockMemory::default();
            }
        }

        let e = world.get_mut(entity)?;
        if let Some(anim) = request.anim {
            e.set_anim(anim, 1);
        }
        if let Some(ctrl) = request.ctrl {
            e.ctrl = ctrl;
        }
        Ok(())
    }

    /// Looks up the running program and binds its library to the VM.
    fn active_program(
        &mut self,
        world: &dyn World,
        entity: EntityId,
    ) -> Result<Option<Arc<BehaviorProgram>>, RuntimeError> {
        let e = world.get(entity)?;
        let Some((library, program)) = self.program(e.state.owner, e.state.number) else {
            return Ok(None);
        };
        self.vm
            .bind_library(library.strings().clone(), library.pow_order());
        Ok(Some(program))
    }

    fn program(
        &self,
        owner: usize,
        number: i32,
    ) -> Option<(Arc<ProgramLibrary>, Arc<BehaviorProgram>)> {
        let library = self.libraries.get(&owner)?;
        let program = library.get(number)?;
        Some((Arc::clone(library), Arc::clone(program)))
    }
}

/// Moves a bound entity onto its anchor and counts the binding down. A
/// binding whose anchor is gone is dropped.
fn follow_binding(world: &mut dyn World, entity: EntityId) -> Result<(), RuntimeError> {
    let Some(binding) = world.get(entity)?.binding else {
        return Ok(());
    };
    let Some(anchor) = world.entity(binding.to) else {
        debug!(entity = %entity, anchor = %binding.to, "binding anchor gone");
        world.get_mut(entity)?.binding = None;
        return Ok(());
    };
    let (pos, facing) = (anchor.pos, anchor.facing);

    let e = world.get_mut(entity)?;
    e.pos[0] = pos[0] + binding.offset[0] * facing;
    e.pos[1] = pos[1] + binding.offset[1];
    if let Some(f) = binding.facing {
        e.facing = facing * f;
    }
    e.binding = match binding.time {
        -1 => Some(binding),
        t if t > 1 => Some(Binding {
            time: t - 1,
            ..binding
        }),
        _ => None,
    };
    Ok(())
}
