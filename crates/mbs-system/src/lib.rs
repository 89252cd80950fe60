//! `mbs-system` — subsystem interface and realize driver for the rust_mbs
//! framework.
//!
//! # Realize loop
//!
//! ```text
//! for stage in (system_stage + 1)..=target:
//!   ① observer.on_stage_start(stage)
//!   ② for each subsystem still below `stage`, in registration order:
//!        Subsystem::realize_<stage>   — fill caches owned at `stage`
//!        advance_subsystem_to_stage   — caches become readable
//!   ③ advance_system_to_stage         — assembles globals at Model
//!   ④ observer.on_stage_end(stage, &state)
//! ```
//!
//! `Topology` and `Model` are the allocation windows: those two hooks get
//! `&mut State`, every later one gets `&State`.
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use mbs_core::Stage;
//! use mbs_system::{NoopObserver, SystemBuilder};
//!
//! let mut system = SystemBuilder::new().subsystem(MyBody::default()).build()?;
//! let mut state = system.default_state()?;            // at Model
//! system.realize(&mut state, Stage::Acceleration, &mut NoopObserver)?;
//! let ydot = state.ydot()?;
//! ```

pub mod builder;
pub mod error;
pub mod observer;
pub mod subsystem;
pub mod system;


pub use builder::SystemBuilder;
pub use error::{SystemError, SystemResult};
pub use observer::{NoopObserver, RealizeObserver};
pub use subsystem::Subsystem;
pub use system::System;
