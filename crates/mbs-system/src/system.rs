//! The `System` struct and its realize loop.

use mbs_core::{Stage, SubsystemIndex};
use mbs_state::{State, StateConfig};
use tracing::debug;

use crate::{NoopObserver, RealizeObserver, Subsystem, SystemError, SystemResult};

/// An ordered set of subsystems sharing one [`State`] layout.
///
/// Subsystem `i` in registration order owns `SubsystemIndex(i)` in every
/// state produced by [`default_state`](Self::default_state).
///
/// Create via [`SystemBuilder`][crate::SystemBuilder].
pub struct System {
    pub(crate) config:     StateConfig,
    pub(crate) subsystems: Vec<Box<dyn Subsystem>>,
}

impl System {
    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    pub fn n_subsystems(&self) -> usize {
        self.subsystems.len()
    }

    pub fn subsystem(&self, id: SubsystemIndex) -> Option<&dyn Subsystem> {
        self.subsystems.get(id.index()).map(|s| s.as_ref())
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// A fresh state with every subsystem registered, its variables
    /// allocated, and the global vectors assembled (system stage `Model`).
    pub fn default_state(&mut self) -> SystemResult<State> {
        let mut state = State::with_config(self.config.clone());
        for sub in &self.subsystems {
            state.register_subsystem(sub.name(), sub.version());
        }
        self.realize(&mut state, Stage::Model, &mut NoopObserver)?;
        Ok(state)
    }

    /// Realize `state` one stage at a time from the current system stage up
    /// to `target`.  A no-op if the system is already there.
    ///
    /// For each stage, every subsystem still below it realizes the stage and
    /// is advanced; then the system is advanced.  Subsystems that were
    /// advanced individually ahead of the system are skipped.
    pub fn realize<O: RealizeObserver>(
        &mut self,
        state:    &mut State,
        target:   Stage,
        observer: &mut O,
    ) -> SystemResult<()> {
        if state.n_subsystems() != self.subsystems.len() {
            return Err(SystemError::SubsystemCountMismatch {
                expected: self.subsystems.len(),
                got:      state.n_subsystems(),
            });
        }

        while let Some(stage) = state.system_stage().next().filter(|&s| s <= target) {
            observer.on_stage_start(stage);
            for (i, sub) in self.subsystems.iter_mut().enumerate() {
                let id = SubsystemIndex(i as u32);
                if state.subsystem_stage(id)? >= stage {
                    continue;
                }
                realize_one(sub.as_mut(), state, id, stage)?;
                state.advance_subsystem_to_stage(id, stage)?;
                observer.on_subsystem_realized(id, stage);
            }
            state.advance_system_to_stage(stage)?;
            debug!(%stage, "realized");
            observer.on_stage_end(stage, state);
        }
        Ok(())
    }
}

fn realize_one(
    sub:   &mut dyn Subsystem,
    state: &mut State,
    id:    SubsystemIndex,
    stage: Stage,
) -> SystemResult<()> {
    match stage {
        Stage::Empty        => Ok(()),
        Stage::Topology     => sub.realize_topology(state, id),
        Stage::Model        => sub.realize_model(state, id),
        Stage::Instance     => sub.realize_instance(state, id),
        Stage::Time         => sub.realize_time(state, id),
        Stage::Position     => sub.realize_position(state, id),
        Stage::Velocity     => sub.realize_velocity(state, id),
        Stage::Dynamics     => sub.realize_dynamics(state, id),
        Stage::Acceleration => sub.realize_acceleration(state, id),
        Stage::Report       => sub.realize_report(state, id),
    }
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.subsystems.iter().map(|s| s.name()).collect();
        f.debug_struct("System")
            .field("config", &self.config)
            .field("subsystems", &names)
            .finish()
    }
}
