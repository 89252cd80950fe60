//! Stage tracking and the invalidation cascade.
//!
//! One [`StageTracker`] per subsystem plus one for the system as a whole.
//! The system tracker never exceeds the lowest subsystem tracker: advancing
//! it checks every subsystem, and the only backward movement
//! ([`StageBook::invalidate_all`]) applies the same rule to every tracker, so
//! the ordering survives.

use mbs_core::{Stage, StageError, StageResult, StageTracker, SubsystemIndex};

#[derive(Clone, Debug, Default)]
pub(crate) struct StageBook {
    subsystems: Vec<StageTracker>,
    system:     StageTracker,
}

impl StageBook {
    pub(crate) fn add_subsystem(&mut self) -> SubsystemIndex {
        let n = self.subsystems.len();
        debug_assert!(u32::try_from(n).is_ok(), "subsystem index overflow");
        let id = SubsystemIndex(n as u32);
        self.subsystems.push(StageTracker::new());
        id
    }

    #[inline]
    pub(crate) fn system(&self) -> Stage {
        self.system.current()
    }

    /// Current stage of `subsys`.  The caller has already validated the index.
    #[inline]
    pub(crate) fn subsystem(&self, subsys: SubsystemIndex) -> Stage {
        self.subsystems[subsys.index()].current()
    }

    /// Lowest subsystem stage and the subsystem that holds it.
    pub(crate) fn lowest_subsystem(&self) -> Option<(SubsystemIndex, Stage)> {
        self.subsystems
            .iter()
            .enumerate()
            .map(|(i, t)| (SubsystemIndex(i as u32), t.current()))
            .min_by_key(|&(_, stage)| stage)
    }

    pub(crate) fn advance_subsystem(
        &mut self,
        subsys: SubsystemIndex,
        target: Stage,
    ) -> StageResult<()> {
        self.subsystems[subsys.index()].advance(target)
    }

    /// Single-step system advance, capped by the slowest subsystem.
    pub(crate) fn advance_system(&mut self, target: Stage) -> StageResult<()> {
        if self.system.current().next() != Some(target) {
            return Err(StageError::OutOfOrderAdvance {
                current:   self.system.current(),
                requested: target,
            });
        }
        if let Some((subsystem, subsystem_stage)) = self.lowest_subsystem() {
            if subsystem_stage < target {
                return Err(StageError::SubsystemsNotReady {
                    requested: target,
                    subsystem,
                    subsystem_stage,
                });
            }
        }
        self.system.advance(target)
    }

    /// Back every tracker at or above `stage` up to `stage - 1`.
    ///
    /// Returns the number of trackers that moved (subsystems plus system).
    pub(crate) fn invalidate_all(&mut self, stage: Stage) -> usize {
        let mut moved = 0;
        for tracker in &mut self.subsystems {
            moved += usize::from(tracker.invalidate(stage));
        }
        moved += usize::from(self.system.invalidate(stage));
        moved
    }

    /// Back only the system tracker up so that it sits at or below `stage`.
    ///
    /// Used when a newly registered subsystem starts at `Empty` below an
    /// already advanced system.
    pub(crate) fn cap_system(&mut self, stage: Stage) -> bool {
        match stage.next() {
            Some(above) => self.system.invalidate(above),
            None => false,
        }
    }

    /// Cap every tracker at `stage`; used when copying a `State`.
    pub(crate) fn capped_at(&self, stage: Stage) -> Self {
        let cap = |t: &StageTracker| {
            let mut c = StageTracker::new();
            c.back_to(t.current().min(stage));
            c
        };
        Self {
            subsystems: self.subsystems.iter().map(cap).collect(),
            system:     cap(&self.system),
        }
    }
}
