//! pendulum — smallest end-to-end run of the rust_mbs state store.
//!
//! A pendulum and a damped spring share one `State`.  Each step realizes
//! both through `Acceleration`, takes a forward-Euler step on Y, and moves
//! time forward (which backs every stage up to `Instance`).  Halfway
//! through, the pendulum is lengthened by mutating its `Instance`-stage
//! discrete variable, which backs the state up to `Model`.
//!
//! Logging follows `MBS_LOG`, then `RUST_LOG`; e.g.
//! `MBS_LOG=mbs_state=debug cargo run -p pendulum`.

mod bodies;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mbs_core::{Stage, SubsystemIndex};
use mbs_system::{NoopObserver, RealizeObserver, SystemBuilder};

use bodies::{Pendulum, PendulumParams, Spring, SpringParams, energy_handle, params_handle};

// ── Constants ─────────────────────────────────────────────────────────────────

const DT:           f64   = 1.0e-3;
const STEPS:        usize = 4_000;
const REPORT_EVERY: usize = 500;
const LENGTHEN_AT:  usize = STEPS / 2;

const PENDULUM: SubsystemIndex = SubsystemIndex(0);
const SPRING:   SubsystemIndex = SubsystemIndex(1);

// ── Observer ──────────────────────────────────────────────────────────────────

/// Counts how many times the system reached each stage.
#[derive(Default)]
struct StageTally {
    reached: [usize; Stage::ALL.len()],
}

impl RealizeObserver for StageTally {
    fn on_stage_end(&mut self, stage: Stage, _state: &mbs_state::State) {
        self.reached[stage.level()] += 1;
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

fn init_logging() {
    let filter = EnvFilter::try_from_env("MBS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "pendulum=info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_logging();

    let mut system = SystemBuilder::new()
        .subsystem(Pendulum::new(0.6, PendulumParams { length: 1.0, gravity: 9.81 }))
        .subsystem(Spring::new(0.2, SpringParams { stiffness: 4.0, damping: 0.3 }))
        .build()?;
    let mut state = system.default_state()?;
    info!(
        ny = state.ny()?,
        nq = state.nq()?,
        nu = state.nu()?,
        nz = state.nz()?,
        "state assembled"
    );

    let mut tally = StageTally::default();
    let mut ydot = Vec::with_capacity(state.ny()?);

    for step in 0..=STEPS {
        if step % REPORT_EVERY == 0 {
            system.realize(&mut state, Stage::Report, &mut tally)?;
            info!(
                t = state.time()?,
                theta = state.q_of(PENDULUM)?[0],
                pendulum_energy = *state.cache_entry::<f64>(PENDULUM, energy_handle(PENDULUM))?,
                spring_energy = *state.cache_entry::<f64>(SPRING, energy_handle(SPRING))?,
                "report"
            );
        }
        if step == STEPS {
            break;
        }

        if step == LENGTHEN_AT {
            state
                .upd_discrete_variable::<PendulumParams>(PENDULUM, params_handle(PENDULUM))?
                .length = 2.0;
            info!(stage = %state.system_stage(), "pendulum lengthened");
        }

        system.realize(&mut state, Stage::Acceleration, &mut NoopObserver)?;
        ydot.clear();
        ydot.extend_from_slice(&state.ydot()?);
        for (y, d) in state.upd_y()?.iter_mut().zip(&ydot) {
            *y += DT * d;
        }
        *state.upd_time()? += DT;
    }

    let copy = state.clone();
    info!(
        t = copy.time()?,
        y = ?copy.y()?,
        stage = %copy.system_stage(),
        "copied final state"
    );
    for stage in Stage::ALL {
        info!(%stage, reached = tally.reached[stage.level()], "reports per stage");
    }
    Ok(())
}
