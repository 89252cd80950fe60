//! The `State` handle: registration, stage advancement, invalidation,
//! global assembly, and copying.
//!
//! Allocation lives in `alloc.rs`, vector access in `access.rs` and
//! discrete-variable / cache-entry access in `values.rs`; all of them are
//! further `impl State` blocks over the same private `StateRep`.

use mbs_core::{Stage, StageError, StageResult, SubsystemIndex};
use tracing::debug;

use crate::StateConfig;
use crate::layout::GlobalLayout;
use crate::pool::Assembly;
use crate::slot::SubsystemSlot;
use crate::stages::StageBook;

// ── StateRep ──────────────────────────────────────────────────────────────────

/// Private representation.  Nothing outside this crate sees its fields.
pub(crate) struct StateRep {
    pub(crate) config:   StateConfig,
    pub(crate) slots:    Vec<SubsystemSlot>,
    pub(crate) stages:   StageBook,
    pub(crate) time:     f64,
    /// `Some` exactly while the system stage is `Model` or above.
    pub(crate) assembly: Option<Assembly>,
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Staged container for every subsystem's continuous variables, discrete
/// variables, and cached results.
///
/// # Lifecycle
///
/// 1. [`register_subsystem`](Self::register_subsystem) for each subsystem.
/// 2. Window 1 (subsystem at `Empty`): allocate anything; every `Model`-stage
///    discrete variable and cache entry must be allocated now.
/// 3. [`advance_subsystem_to_stage`](Self::advance_subsystem_to_stage)`(_, Topology)`.
/// 4. Window 2 (subsystem at `Topology`): allocate continuous variables,
///    error slots, and anything owned above `Model`.
/// 5. Advance each subsystem to `Model` (locks allocation), then
///    [`advance_system_to_stage`](Self::advance_system_to_stage)`(Model)`,
///    which assembles Y, YDot and YErr.
/// 6. Realize upward one stage at a time; mutate state and the cascade in
///    [`invalidate_all`](Self::invalidate_all) backs the trackers up.
///
/// # Interior mutability
///
/// Cache-side accessors (`upd_qdot`, `upd_cache_entry`, …) take `&self` and
/// hand out guards ([`CacheViewMut`](crate::CacheViewMut), `RefMut`), and
/// even read accessors may allocate a cache segment on first touch.  A `State` is single-owner: it is `Send` but not
/// `Sync`.
pub struct State {
    pub(crate) rep: Box<StateRep>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// An empty state with the default [`StateConfig`].
    pub fn new() -> Self {
        Self::with_config(StateConfig::default())
    }

    pub fn with_config(config: StateConfig) -> Self {
        Self {
            rep: Box::new(StateRep {
                config,
                slots:    Vec::new(),
                stages:   StageBook::default(),
                time:     0.0,
                assembly: None,
            }),
        }
    }

    pub fn config(&self) -> &StateConfig {
        &self.rep.config
    }

    // ── Subsystems ────────────────────────────────────────────────────────

    /// Register a subsystem.  `name` and `version` are stored, never
    /// interpreted.
    ///
    /// The new subsystem starts at `Empty`; if the system had already
    /// advanced, its tracker is backed up to `Empty` (dropping the global
    /// assembly) so it never exceeds the lowest subsystem.
    pub fn register_subsystem(
        &mut self,
        name:    impl Into<String>,
        version: impl Into<String>,
    ) -> SubsystemIndex {
        if self.rep.stages.cap_system(Stage::Empty) {
            self.disassemble();
        }
        let id = self.rep.stages.add_subsystem();
        let slot = SubsystemSlot::new(name.into(), version.into());
        debug!(subsystem = %id, name = %slot.name, version = %slot.version, "registered subsystem");
        self.rep.slots.push(slot);
        id
    }

    pub fn n_subsystems(&self) -> usize {
        self.rep.slots.len()
    }

    pub fn subsystem_name(&self, subsys: SubsystemIndex) -> StageResult<&str> {
        Ok(&self.slot(subsys)?.name)
    }

    pub fn subsystem_version(&self, subsys: SubsystemIndex) -> StageResult<&str> {
        Ok(&self.slot(subsys)?.version)
    }

    pub fn subsystem_stage(&self, subsys: SubsystemIndex) -> StageResult<Stage> {
        self.slot(subsys)?;
        Ok(self.rep.stages.subsystem(subsys))
    }

    /// The system-wide stage; never above the lowest subsystem stage.
    pub fn system_stage(&self) -> Stage {
        self.rep.stages.system()
    }

    /// `true` once the global vectors exist (system stage ≥ `Model`).
    pub fn is_assembled(&self) -> bool {
        self.rep.assembly.is_some()
    }

    // ── Stage advancement ─────────────────────────────────────────────────

    /// Move `subsys` up exactly one stage.
    ///
    /// Reaching `Topology` closes allocation window 1; reaching `Model`
    /// closes window 2.
    pub fn advance_subsystem_to_stage(
        &mut self,
        subsys: SubsystemIndex,
        stage:  Stage,
    ) -> StageResult<()> {
        self.slot(subsys)?;
        self.rep.stages.advance_subsystem(subsys, stage)?;
        debug!(subsystem = %subsys, %stage, "subsystem advanced");
        Ok(())
    }

    /// Move the system up exactly one stage.
    ///
    /// Requires every subsystem to be at `stage` already.  Crossing into
    /// `Model` assembles the global vectors.
    pub fn advance_system_to_stage(&mut self, stage: Stage) -> StageResult<()> {
        self.rep.stages.advance_system(stage)?;
        if stage == Stage::Model {
            self.assemble();
        }
        debug!(%stage, "system advanced");
        Ok(())
    }

    // ── Invalidation ──────────────────────────────────────────────────────

    /// Back every subsystem and the system that is at or above `stage` up to
    /// `stage - 1`.  Trackers already below `stage` are untouched.
    ///
    /// Storage is never freed; cached contents at or above `stage` simply
    /// become unreadable until recomputed and re-advanced.  If the system
    /// drops below `Model` the global vectors are disassembled and the
    /// current Y values written back to their subsystems.
    pub fn invalidate_all(&mut self, stage: Stage) {
        let moved = self.rep.stages.invalidate_all(stage);
        if moved > 0 {
            debug!(%stage, trackers = moved, system = %self.system_stage(), "invalidated");
        }
        if self.system_stage() < Stage::Model && self.rep.assembly.is_some() {
            self.disassemble();
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────

    pub(crate) fn slot(&self, subsys: SubsystemIndex) -> StageResult<&SubsystemSlot> {
        self.rep
            .slots
            .get(subsys.index())
            .ok_or(StageError::InvalidHandle {
                subsystem: subsys,
                what:      "subsystem",
                index:     subsys.index(),
            })
    }

    pub(crate) fn slot_mut(&mut self, subsys: SubsystemIndex) -> StageResult<&mut SubsystemSlot> {
        self.rep
            .slots
            .get_mut(subsys.index())
            .ok_or(StageError::InvalidHandle {
                subsystem: subsys,
                what:      "subsystem",
                index:     subsys.index(),
            })
    }

    pub(crate) fn assembly(&self) -> StageResult<&Assembly> {
        self.rep
            .assembly
            .as_ref()
            .ok_or(StageError::GlobalStateNotAssembled {
                system_stage: self.system_stage(),
            })
    }

    pub(crate) fn assembly_mut(&mut self) -> StageResult<&mut Assembly> {
        let system_stage = self.system_stage();
        self.rep
            .assembly
            .as_mut()
            .ok_or(StageError::GlobalStateNotAssembled { system_stage })
    }

    /// Fail with `StageNotRealized` unless the system is at `required`.
    pub(crate) fn require_system(&self, what: &'static str, required: Stage) -> StageResult<()> {
        let current = self.system_stage();
        if current < required {
            return Err(StageError::StageNotRealized { what, required, current });
        }
        Ok(())
    }

    /// Fail with `StageNotRealized` unless `subsys` is at `required`.
    pub(crate) fn require_subsystem(
        &self,
        subsys:   SubsystemIndex,
        what:     &'static str,
        required: Stage,
    ) -> StageResult<()> {
        let current = self.subsystem_stage(subsys)?;
        if current < required {
            return Err(StageError::StageNotRealized { what, required, current });
        }
        Ok(())
    }

    fn assemble(&mut self) {
        let layout = GlobalLayout::from_slots(&self.rep.slots);
        let y = layout.gather_y(&self.rep.slots);
        debug!(
            nq = layout.q.total(),
            nu = layout.u.total(),
            nz = layout.z.total(),
            nqerr = layout.qerr.total(),
            nuerr = layout.uerr.total(),
            nudoterr = layout.udoterr.total(),
            "assembled global state"
        );
        let fill = self.rep.config.uncomputed_cache_value;
        self.rep.assembly = Some(Assembly::new(layout, y, fill));
    }

    fn disassemble(&mut self) {
        if let Some(asm) = self.rep.assembly.take() {
            asm.layout.scatter_y(&asm.variables.y, &mut self.rep.slots);
            debug!("disassembled global state");
        }
    }
}

/// Copies the state variables: continuous and discrete variables, time, and
/// every allocation.
///
/// Nothing computed is copied.  Cache entries restart from the values they
/// were allocated with, derivative and constraint-error arrays restart
/// uncomputed, and every stage in the copy is capped at `Model`, so anything
/// derived must be recomputed before it can be read.
impl Clone for State {
    fn clone(&self) -> Self {
        let mut slots = self.rep.slots.clone();
        if let Some(asm) = &self.rep.assembly {
            asm.layout.scatter_y(&asm.variables.y, &mut slots);
        }
        let mut copy = State {
            rep: Box::new(StateRep {
                config:   self.rep.config.clone(),
                slots,
                stages:   self.rep.stages.capped_at(Stage::Model),
                time:     self.rep.time,
                assembly: None,
            }),
        };
        if copy.system_stage() >= Stage::Model {
            copy.assemble();
        }
        copy
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("subsystems", &self.n_subsystems())
            .field("system_stage", &self.system_stage())
            .field("assembled", &self.is_assembled())
            .finish()
    }
}
