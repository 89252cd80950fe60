//! Allocation entry points.
//!
//! Every call is checked against the owning subsystem's allocation window
//! (see [`check_window`]) before anything is stored.  Returned indices are
//! subsystem-local and never reused or renumbered.

use mbs_core::{
    CacheEntryHandle, CacheEntryIndex, DiscreteVariableHandle, DiscreteVariableIndex, QErrIndex,
    QIndex, Stage, StageError, StageResult, SubsystemIndex, UDotErrIndex, UErrIndex, UIndex,
    ZIndex,
};
use tracing::{debug, warn};

use crate::State;
use crate::slot::{AllocationKind, WindowCheck, check_window};
use crate::value::{CacheEntry, DiscreteVariable};

/// Index of the next entry in a subsystem-local table holding `len` entries.
fn next_index<I: TryFrom<usize>>(
    subsystem: SubsystemIndex,
    what:      &'static str,
    len:       usize,
) -> StageResult<I> {
    I::try_from(len).map_err(|_| StageError::IndexOverflow { subsystem, what, len })
}

impl State {
    fn open_window(&self, subsys: SubsystemIndex, kind: AllocationKind) -> StageResult<()> {
        let stage = self.subsystem_stage(subsys)?;
        let strict = self.rep.config.strict_allocation_windows;
        if check_window(subsys, stage, kind, strict)? == WindowCheck::Lenient {
            warn!(
                subsystem = %subsys,
                what = kind.as_str(),
                "late allocation outside the construction window"
            );
        }
        Ok(())
    }

    // ── Continuous variables ──────────────────────────────────────────────

    /// Allocate q's with initial values; also reserves matching QDot and
    /// QDotDot cache slots.  Returns the offset within this subsystem's Q.
    pub fn allocate_q(&mut self, subsys: SubsystemIndex, init: &[f64]) -> StageResult<QIndex> {
        self.open_window(subsys, AllocationKind::Q)?;
        let slot = self.slot_mut(subsys)?;
        let index = next_index::<QIndex>(subsys, "q", slot.q.len())?;
        slot.q.extend_from_slice(init);
        debug!(subsystem = %subsys, %index, n = init.len(), "allocated q");
        Ok(index)
    }

    /// Allocate u's with initial values; also reserves matching UDot slots.
    pub fn allocate_u(&mut self, subsys: SubsystemIndex, init: &[f64]) -> StageResult<UIndex> {
        self.open_window(subsys, AllocationKind::U)?;
        let slot = self.slot_mut(subsys)?;
        let index = next_index::<UIndex>(subsys, "u", slot.u.len())?;
        slot.u.extend_from_slice(init);
        debug!(subsystem = %subsys, %index, n = init.len(), "allocated u");
        Ok(index)
    }

    /// Allocate z's with initial values; also reserves matching ZDot slots.
    pub fn allocate_z(&mut self, subsys: SubsystemIndex, init: &[f64]) -> StageResult<ZIndex> {
        self.open_window(subsys, AllocationKind::Z)?;
        let slot = self.slot_mut(subsys)?;
        let index = next_index::<ZIndex>(subsys, "z", slot.z.len())?;
        slot.z.extend_from_slice(init);
        debug!(subsystem = %subsys, %index, n = init.len(), "allocated z");
        Ok(index)
    }

    // ── Constraint-error slots (cache only) ───────────────────────────────

    pub fn allocate_qerr(&mut self, subsys: SubsystemIndex, n: usize) -> StageResult<QErrIndex> {
        self.open_window(subsys, AllocationKind::QErr)?;
        let slot = self.slot_mut(subsys)?;
        let index = next_index::<QErrIndex>(subsys, "qerr", slot.nqerr)?;
        slot.nqerr += n;
        debug!(subsystem = %subsys, %index, n, "allocated qerr");
        Ok(index)
    }

    pub fn allocate_uerr(&mut self, subsys: SubsystemIndex, n: usize) -> StageResult<UErrIndex> {
        self.open_window(subsys, AllocationKind::UErr)?;
        let slot = self.slot_mut(subsys)?;
        let index = next_index::<UErrIndex>(subsys, "uerr", slot.nuerr)?;
        slot.nuerr += n;
        debug!(subsystem = %subsys, %index, n, "allocated uerr");
        Ok(index)
    }

    pub fn allocate_udoterr(
        &mut self,
        subsys: SubsystemIndex,
        n:      usize,
    ) -> StageResult<UDotErrIndex> {
        self.open_window(subsys, AllocationKind::UDotErr)?;
        let slot = self.slot_mut(subsys)?;
        let index = next_index::<UDotErrIndex>(subsys, "udoterr", slot.nudoterr)?;
        slot.nudoterr += n;
        debug!(subsystem = %subsys, %index, n, "allocated udoterr");
        Ok(index)
    }

    // ── Discrete variables and cache entries ──────────────────────────────

    /// Allocate a discrete variable owned at `stage`, taking ownership of
    /// `value`.
    pub fn allocate_discrete_variable<T: Clone + Send + 'static>(
        &mut self,
        subsys: SubsystemIndex,
        stage:  Stage,
        value:  T,
    ) -> StageResult<DiscreteVariableHandle> {
        self.open_window(subsys, AllocationKind::DiscreteVariable(stage))?;
        let slot = self.slot_mut(subsys)?;
        let index =
            next_index::<DiscreteVariableIndex>(subsys, "discrete variable", slot.discrete.len())?;
        slot.discrete.push(DiscreteVariable::new(stage, value));
        debug!(subsystem = %subsys, %index, %stage, "allocated discrete variable");
        Ok(DiscreteVariableHandle { subsystem: subsys, index })
    }

    /// Allocate a cache entry owned at `stage`, taking ownership of the
    /// initial `value`.
    pub fn allocate_cache_entry<T: Clone + Send + 'static>(
        &mut self,
        subsys: SubsystemIndex,
        stage:  Stage,
        value:  T,
    ) -> StageResult<CacheEntryHandle> {
        self.open_window(subsys, AllocationKind::CacheEntry(stage))?;
        let slot = self.slot_mut(subsys)?;
        let index = next_index::<CacheEntryIndex>(subsys, "cache entry", slot.cache.len())?;
        slot.cache.push(CacheEntry::new(stage, value));
        debug!(subsystem = %subsys, %index, %stage, "allocated cache entry");
        Ok(CacheEntryHandle { subsystem: subsys, index })
    }
}
