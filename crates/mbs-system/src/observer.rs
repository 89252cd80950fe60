//! Realize observer trait for progress reporting and data collection.

use mbs_core::{Stage, SubsystemIndex};
use mbs_state::State;

/// Callbacks invoked by [`System::realize`][crate::System::realize] as it
/// climbs the stage ladder.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example — energy logger
///
/// ```rust,ignore
/// struct EnergyLog { id: SubsystemIndex, energy: CacheEntryHandle }
///
/// impl RealizeObserver for EnergyLog {
///     fn on_stage_end(&mut self, stage: Stage, state: &State) {
///         if stage == Stage::Report {
///             let e = state.cache_entry::<f64>(self.id, self.energy).unwrap();
///             println!("t = {:.3}  E = {e:.6}", state.time().unwrap());
///         }
///     }
/// }
/// ```
pub trait RealizeObserver {
    /// Called before any subsystem realizes `stage`.
    fn on_stage_start(&mut self, _stage: Stage) {}

    /// Called after `subsystem` has realized `stage` and been advanced to it.
    fn on_subsystem_realized(&mut self, _subsystem: SubsystemIndex, _stage: Stage) {}

    /// Called once the system itself has reached `stage`.
    ///
    /// Provides read-only access to the state so reporters can read anything
    /// that is now valid.
    fn on_stage_end(&mut self, _stage: Stage, _state: &State) {}
}

/// A [`RealizeObserver`] that does nothing.
pub struct NoopObserver;

impl RealizeObserver for NoopObserver {}
