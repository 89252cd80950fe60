//! The `Subsystem` trait — the extension point for physics code.

use mbs_core::SubsystemIndex;
use mbs_state::State;

use crate::SystemResult;

/// One independent contributor of variables and cached results.
///
/// The [`System`][crate::System] calls one `realize_*` hook per stage, just
/// before advancing the subsystem to that stage.  At that point the
/// subsystem's tracker sits one rung below, so every cache it owns at the
/// stage being realized is writable but not yet readable.
///
/// # Allocation
///
/// [`realize_topology`][Self::realize_topology] runs in the construction
/// window (subsystem at `Empty`): allocate every `Model`-stage discrete
/// variable and cache entry here.  [`realize_model`][Self::realize_model]
/// runs in the modeling window (subsystem at `Topology`): allocate Q/U/Z,
/// error slots, and anything owned above `Model`.  These two hooks take
/// `&mut self` so the returned indices and handles can be kept.
///
/// Every later hook sees the state read-only and writes only caches.
///
/// # Example
///
/// ```rust,ignore
/// struct Ball { q: Option<QIndex> }
///
/// impl Subsystem for Ball {
///     fn name(&self) -> &str { "ball" }
///
///     fn realize_model(&mut self, state: &mut State, id: SubsystemIndex) -> SystemResult<()> {
///         self.q = Some(state.allocate_q(id, &[1.0])?);
///         state.allocate_u(id, &[0.0])?;
///         Ok(())
///     }
///
///     fn realize_velocity(&self, state: &State, id: SubsystemIndex) -> SystemResult<()> {
///         let v = state.u_of(id)?[0];
///         state.upd_qdot_of(id)?[0] = v;
///         Ok(())
///     }
/// }
/// ```
pub trait Subsystem {
    fn name(&self) -> &str;

    /// Free-form version label stored alongside the name.
    fn version(&self) -> &str {
        "0"
    }

    fn realize_topology(&mut self, _state: &mut State, _id: SubsystemIndex) -> SystemResult<()> {
        Ok(())
    }

    fn realize_model(&mut self, _state: &mut State, _id: SubsystemIndex) -> SystemResult<()> {
        Ok(())
    }

    fn realize_instance(&self, _state: &State, _id: SubsystemIndex) -> SystemResult<()> {
        Ok(())
    }

    fn realize_time(&self, _state: &State, _id: SubsystemIndex) -> SystemResult<()> {
        Ok(())
    }

    fn realize_position(&self, _state: &State, _id: SubsystemIndex) -> SystemResult<()> {
        Ok(())
    }

    fn realize_velocity(&self, _state: &State, _id: SubsystemIndex) -> SystemResult<()> {
        Ok(())
    }

    fn realize_dynamics(&self, _state: &State, _id: SubsystemIndex) -> SystemResult<()> {
        Ok(())
    }

    fn realize_acceleration(&self, _state: &State, _id: SubsystemIndex) -> SystemResult<()> {
        Ok(())
    }

    fn realize_report(&self, _state: &State, _id: SubsystemIndex) -> SystemResult<()> {
        Ok(())
    }
}
