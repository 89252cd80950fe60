//! `mbs-state` — the staged variable and cache store for the `rust_mbs`
//! framework.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                  |
//! |-----------------|-----------------------------------------------------------|
//! | [`state`]       | `State` handle: registration, advance, invalidation, copy |
//! | [`config`]      | `StateConfig`                                             |
//! | [`value`]       | `AbstractValue` trait, `Value<T>` wrapper                 |
//! | [`layout`]      | `Segment` (a subsystem's block in a global vector)        |
//!
//! Allocation, vector access and typed value access are further `impl State`
//! blocks in private modules; everything is reached through [`State`].
//! Derivative and error caches are handed out as [`CacheView`] /
//! [`CacheViewMut`] guards that deref to `[f64]`.
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on `StateConfig`, `Segment` |
//!           | and the `mbs-core` types.                                  |

mod access;
mod alloc;
pub mod config;
pub mod layout;
mod pool;
mod slot;
mod stages;
pub mod state;
pub mod value;
mod values;

#[cfg(test)]
mod tests;

pub use config::StateConfig;
pub use layout::Segment;
pub use pool::{CacheView, CacheViewMut};
pub use state::State;
pub use value::{AbstractValue, Value};
