//! The realization stage ladder.
//!
//! # Design
//!
//! Every cached quantity in the store belongs to exactly one `Stage`.  A
//! quantity owned at stage `S` is only readable once its tracker has reached
//! `S`, and any change to an input that was valid through `S - 1` forces the
//! tracker back to `S - 1`:
//!
//! ```text
//! Empty < Topology < Model < Instance < Time < Position
//!       < Velocity < Dynamics < Acceleration < Report
//! ```
//!
//! Clients only ever move forward one rung at a time ([`StageTracker::advance`]).
//! Moving backward is reserved for the invalidation engine
//! ([`StageTracker::invalidate`] / [`StageTracker::back_to`]).

use std::fmt;

use crate::{StageError, StageResult};

// ── Stage ─────────────────────────────────────────────────────────────────────

/// One rung of the realization ladder.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stage {
    /// Nothing allocated or realized yet (initial state).
    #[default]
    Empty,
    /// Construction complete; allocation window 2 is open.
    Topology,
    /// Allocation locked; global vectors exist once the system gets here.
    Model,
    /// Instance parameters (masses, lengths, …) are fixed.
    Instance,
    /// Time is known.
    Time,
    /// Positions (Q) are known; position-level results cached.
    Position,
    /// Velocities (U) are known; velocity-level results cached.
    Velocity,
    /// Forces are known.
    Dynamics,
    /// Accelerations (UDot, QDotDot) are known.
    Acceleration,
    /// Reporting-only quantities (energy, diagnostics).
    Report,
}

impl Stage {
    /// Every stage in ladder order.
    pub const ALL: [Stage; 10] = [
        Stage::Empty,
        Stage::Topology,
        Stage::Model,
        Stage::Instance,
        Stage::Time,
        Stage::Position,
        Stage::Velocity,
        Stage::Dynamics,
        Stage::Acceleration,
        Stage::Report,
    ];

    pub const LOWEST: Stage = Stage::Empty;
    pub const HIGHEST: Stage = Stage::Report;

    /// Position of this stage on the ladder (`Empty` = 0).
    #[inline]
    pub fn level(self) -> usize {
        self as usize
    }

    /// The stage one rung above, or `None` at [`Stage::HIGHEST`].
    #[inline]
    pub fn next(self) -> Option<Stage> {
        Self::ALL.get(self.level() + 1).copied()
    }

    /// The stage one rung below, or `None` at [`Stage::LOWEST`].
    #[inline]
    pub fn prev(self) -> Option<Stage> {
        self.level().checked_sub(1).map(|i| Self::ALL[i])
    }

    /// Human-readable label, useful for log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Empty        => "empty",
            Stage::Topology     => "topology",
            Stage::Model        => "model",
            Stage::Instance     => "instance",
            Stage::Time         => "time",
            Stage::Position     => "position",
            Stage::Velocity     => "velocity",
            Stage::Dynamics     => "dynamics",
            Stage::Acceleration => "acceleration",
            Stage::Report       => "report",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── StageTracker ──────────────────────────────────────────────────────────────

/// The current realized stage of one subsystem, or of the whole system.
///
/// A tracker has no hidden state beyond the current stage.  It starts at
/// [`Stage::Empty`] and may only move up one rung at a time.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StageTracker {
    current: Stage,
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self) -> Stage {
        self.current
    }

    /// `true` if the tracker has reached `stage`.
    #[inline]
    pub fn is_at_least(&self, stage: Stage) -> bool {
        self.current >= stage
    }

    /// Move up exactly one rung, to `target`.
    ///
    /// # Errors
    ///
    /// `OutOfOrderAdvance` if `target` is not `current + 1` (this includes any
    /// attempt to go past [`Stage::HIGHEST`]).
    pub fn advance(&mut self, target: Stage) -> StageResult<()> {
        if self.current.next() != Some(target) {
            return Err(StageError::OutOfOrderAdvance {
                current:   self.current,
                requested: target,
            });
        }
        self.current = target;
        Ok(())
    }

    /// Set the stage directly.  Only the invalidation engine calls this.
    #[inline]
    pub fn back_to(&mut self, stage: Stage) {
        self.current = stage;
    }

    /// If the tracker is at or above `stage`, back it up to `stage - 1`.
    ///
    /// Returns `true` if the tracker moved.  Invalidating `Empty` clamps at
    /// `Empty` since there is no lower rung.
    pub fn invalidate(&mut self, stage: Stage) -> bool {
        if self.current < stage {
            return false;
        }
        let target = stage.prev().unwrap_or(Stage::LOWEST);
        let moved = self.current != target;
        self.current = target;
        moved
    }
}
