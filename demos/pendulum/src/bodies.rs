//! The two bodies: a simple pendulum and a damped spring.
//!
//! Both allocate their parameters as the first discrete variable and their
//! energy as the first cache entry, so the driver can address those without
//! reaching into the boxed subsystems.

use mbs_core::{
    CacheEntryHandle, CacheEntryIndex, DiscreteVariableHandle, DiscreteVariableIndex, Stage,
    SubsystemIndex,
};
use mbs_state::State;
use mbs_system::{Subsystem, SystemError, SystemResult};

pub fn params_handle(id: SubsystemIndex) -> DiscreteVariableHandle {
    DiscreteVariableHandle { subsystem: id, index: DiscreteVariableIndex(0) }
}

pub fn energy_handle(id: SubsystemIndex) -> CacheEntryHandle {
    CacheEntryHandle { subsystem: id, index: CacheEntryIndex(0) }
}

fn allocated<T: Copy>(h: Option<T>, id: SubsystemIndex, stage: Stage) -> SystemResult<T> {
    h.ok_or_else(|| SystemError::realize(id, stage, "realized before its model was built"))
}

// ── Pendulum ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
pub struct PendulumParams {
    pub length:  f64,
    pub gravity: f64,
}

/// Point-mass pendulum per unit mass.  q = θ, u = θ'.
pub struct Pendulum {
    theta0: f64,
    params: PendulumParams,
    torque: Option<CacheEntryHandle>,
}

impl Pendulum {
    pub fn new(theta0: f64, params: PendulumParams) -> Self {
        Self { theta0, params, torque: None }
    }
}

impl Subsystem for Pendulum {
    fn name(&self) -> &str {
        "pendulum"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn realize_topology(&mut self, state: &mut State, id: SubsystemIndex) -> SystemResult<()> {
        state.allocate_discrete_variable(id, Stage::Instance, self.params)?;
        state.allocate_cache_entry(id, Stage::Report, 0.0_f64)?;
        Ok(())
    }

    fn realize_model(&mut self, state: &mut State, id: SubsystemIndex) -> SystemResult<()> {
        state.allocate_q(id, &[self.theta0])?;
        state.allocate_u(id, &[0.0])?;
        self.torque = Some(state.allocate_cache_entry(id, Stage::Dynamics, 0.0_f64)?);
        Ok(())
    }

    fn realize_velocity(&self, state: &State, id: SubsystemIndex) -> SystemResult<()> {
        let omega = state.u_of(id)?[0];
        state.upd_qdot_of(id)?[0] = omega;
        Ok(())
    }

    fn realize_dynamics(&self, state: &State, id: SubsystemIndex) -> SystemResult<()> {
        let p = *state.discrete_variable::<PendulumParams>(id, params_handle(id))?;
        let theta = state.q_of(id)?[0];
        let torque = allocated(self.torque, id, Stage::Dynamics)?;
        *state.upd_cache_entry::<f64>(id, torque)? = -(p.gravity / p.length) * theta.sin();
        Ok(())
    }

    fn realize_acceleration(&self, state: &State, id: SubsystemIndex) -> SystemResult<()> {
        let torque = allocated(self.torque, id, Stage::Acceleration)?;
        let alpha = *state.cache_entry::<f64>(id, torque)?;
        state.upd_udot_of(id)?[0] = alpha;
        Ok(())
    }

    fn realize_report(&self, state: &State, id: SubsystemIndex) -> SystemResult<()> {
        let p = *state.discrete_variable::<PendulumParams>(id, params_handle(id))?;
        let (theta, omega) = (state.q_of(id)?[0], state.u_of(id)?[0]);
        let kinetic = 0.5 * p.length * p.length * omega * omega;
        let potential = p.gravity * p.length * (1.0 - theta.cos());
        *state.upd_cache_entry::<f64>(id, energy_handle(id))? = kinetic + potential;
        Ok(())
    }
}

// ── Spring ────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
pub struct SpringParams {
    pub stiffness: f64,
    pub damping:   f64,
}

/// Damped unit-mass spring.  q = x, u = x', and one z accumulating the work
/// done by the damper.
pub struct Spring {
    x0:     f64,
    params: SpringParams,
    force:  Option<CacheEntryHandle>,
}

impl Spring {
    pub fn new(x0: f64, params: SpringParams) -> Self {
        Self { x0, params, force: None }
    }
}

impl Subsystem for Spring {
    fn name(&self) -> &str {
        "spring"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn realize_topology(&mut self, state: &mut State, id: SubsystemIndex) -> SystemResult<()> {
        state.allocate_discrete_variable(id, Stage::Instance, self.params)?;
        state.allocate_cache_entry(id, Stage::Report, 0.0_f64)?;
        Ok(())
    }

    fn realize_model(&mut self, state: &mut State, id: SubsystemIndex) -> SystemResult<()> {
        state.allocate_q(id, &[self.x0])?;
        state.allocate_u(id, &[0.0])?;
        state.allocate_z(id, &[0.0])?;
        self.force = Some(state.allocate_cache_entry(id, Stage::Dynamics, 0.0_f64)?);
        Ok(())
    }

    fn realize_velocity(&self, state: &State, id: SubsystemIndex) -> SystemResult<()> {
        let v = state.u_of(id)?[0];
        state.upd_qdot_of(id)?[0] = v;
        Ok(())
    }

    fn realize_dynamics(&self, state: &State, id: SubsystemIndex) -> SystemResult<()> {
        let p = *state.discrete_variable::<SpringParams>(id, params_handle(id))?;
        let (x, v) = (state.q_of(id)?[0], state.u_of(id)?[0]);
        let force = allocated(self.force, id, Stage::Dynamics)?;
        *state.upd_cache_entry::<f64>(id, force)? = -p.stiffness * x - p.damping * v;
        state.upd_zdot_of(id)?[0] = p.damping * v * v;
        Ok(())
    }

    fn realize_acceleration(&self, state: &State, id: SubsystemIndex) -> SystemResult<()> {
        let force = allocated(self.force, id, Stage::Acceleration)?;
        let a = *state.cache_entry::<f64>(id, force)?;
        state.upd_udot_of(id)?[0] = a;
        Ok(())
    }

    /// Mechanical energy plus what the damper has taken out; constant up to
    /// integration error.
    fn realize_report(&self, state: &State, id: SubsystemIndex) -> SystemResult<()> {
        let p = *state.discrete_variable::<SpringParams>(id, params_handle(id))?;
        let (x, v, lost) = (state.q_of(id)?[0], state.u_of(id)?[0], state.z_of(id)?[0]);
        *state.upd_cache_entry::<f64>(id, energy_handle(id))? =
            0.5 * v * v + 0.5 * p.stiffness * x * x + lost;
        Ok(())
    }
}
