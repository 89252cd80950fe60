//! `mbs-core` — foundational types for the `rust_mbs` staged state store.
//!
//! This crate is a dependency of every other `mbs-*` crate.  It intentionally
//! has no `mbs-*` dependencies and minimal external ones (only `thiserror`,
//! plus optional `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                                   |
//! |-----------------|------------------------------------------------------------|
//! | [`stage`]       | `Stage` ladder, `StageTracker`                             |
//! | [`ids`]         | `SubsystemIndex`, `QIndex`/`UIndex`/…, value handles       |
//! | [`error`]       | `StageError`, `StageResult`                                |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod error;
pub mod ids;
pub mod stage;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{StageError, StageResult};
pub use ids::{
    CacheEntryHandle, CacheEntryIndex, DiscreteVariableHandle, DiscreteVariableIndex, QErrIndex,
    QIndex, SubsystemIndex, UDotErrIndex, UErrIndex, UIndex, ZIndex,
};
pub use stage::{Stage, StageTracker};
