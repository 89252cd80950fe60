//! Typed access to discrete variables and cache entries.
//!
//! | Operation                | Requires                      | Side effect         |
//! |--------------------------|-------------------------------|---------------------|
//! | `discrete_variable`      | subsystem stage ≥ tag         | none                |
//! | `upd_discrete_variable`  | subsystem stage ≥ tag         | `invalidate_all(tag)` |
//! | `cache_entry`            | subsystem stage ≥ tag         | none                |
//! | `upd_cache_entry`        | subsystem stage ≥ tag − 1     | none                |
//!
//! Handle validation happens first: a handle minted for another subsystem,
//! or one past the end of the arena, is `InvalidHandle`.

use std::cell::{Ref, RefMut};

use mbs_core::{
    CacheEntryHandle, DiscreteVariableHandle, Stage, StageError, StageResult, SubsystemIndex,
};

use crate::State;
use crate::value::{CacheEntry, DiscreteVariable};

fn invalid(subsystem: SubsystemIndex, what: &'static str, index: usize) -> StageError {
    StageError::InvalidHandle { subsystem, what, index }
}

impl State {
    fn discrete(
        &self,
        subsys: SubsystemIndex,
        handle: DiscreteVariableHandle,
    ) -> StageResult<&DiscreteVariable> {
        let what = "discrete variable";
        if handle.subsystem != subsys {
            return Err(invalid(subsys, what, handle.index.index()));
        }
        self.slot(subsys)?
            .discrete
            .get(handle.index.index())
            .ok_or_else(|| invalid(subsys, what, handle.index.index()))
    }

    fn entry(&self, subsys: SubsystemIndex, handle: CacheEntryHandle) -> StageResult<&CacheEntry> {
        let what = "cache entry";
        if handle.subsystem != subsys {
            return Err(invalid(subsys, what, handle.index.index()));
        }
        self.slot(subsys)?
            .cache
            .get(handle.index.index())
            .ok_or_else(|| invalid(subsys, what, handle.index.index()))
    }

    // ── Discrete variables ────────────────────────────────────────────────

    /// The stage a discrete variable was allocated at.
    pub fn discrete_variable_stage(
        &self,
        subsys: SubsystemIndex,
        handle: DiscreteVariableHandle,
    ) -> StageResult<Stage> {
        Ok(self.discrete(subsys, handle)?.stage())
    }

    pub fn discrete_variable<T: Clone + Send + 'static>(
        &self,
        subsys: SubsystemIndex,
        handle: DiscreteVariableHandle,
    ) -> StageResult<&T> {
        let var = self.discrete(subsys, handle)?;
        self.require_subsystem(subsys, "discrete variable", var.stage())?;
        var.get::<T>()
    }

    /// Mutable access to a discrete variable.
    ///
    /// Every tracker at or above the variable's stage is backed up to the
    /// stage below it, whether or not the caller ends up writing.
    pub fn upd_discrete_variable<T: Clone + Send + 'static>(
        &mut self,
        subsys: SubsystemIndex,
        handle: DiscreteVariableHandle,
    ) -> StageResult<&mut T> {
        let var = self.discrete(subsys, handle)?;
        let stage = var.stage();
        self.require_subsystem(subsys, "discrete variable", stage)?;
        if !var.holds::<T>() {
            return Err(StageError::ValueTypeMismatch {
                what:     "discrete variable",
                expected: std::any::type_name::<T>(),
                actual:   var.type_name(),
            });
        }
        self.invalidate_all(stage);
        self.slot_mut(subsys)?.discrete[handle.index.index()].get_mut::<T>()
    }

    // ── Cache entries ─────────────────────────────────────────────────────

    /// The stage at which a cache entry becomes readable.
    pub fn cache_entry_stage(
        &self,
        subsys: SubsystemIndex,
        handle: CacheEntryHandle,
    ) -> StageResult<Stage> {
        Ok(self.entry(subsys, handle)?.stage())
    }

    pub fn cache_entry<T: Clone + Send + 'static>(
        &self,
        subsys: SubsystemIndex,
        handle: CacheEntryHandle,
    ) -> StageResult<Ref<'_, T>> {
        let entry = self.entry(subsys, handle)?;
        self.require_subsystem(subsys, "cache entry", entry.stage())?;
        entry.borrow::<T>()
    }

    /// Fill a cache entry.  Allowed one stage early, so a subsystem can
    /// write its results while realizing the entry's stage; never changes
    /// any stage.
    pub fn upd_cache_entry<T: Clone + Send + 'static>(
        &self,
        subsys: SubsystemIndex,
        handle: CacheEntryHandle,
    ) -> StageResult<RefMut<'_, T>> {
        let entry = self.entry(subsys, handle)?;
        let required = entry.stage().prev().unwrap_or(Stage::LOWEST);
        self.require_subsystem(subsys, "cache entry", required)?;
        entry.borrow_mut::<T>()
    }
}
