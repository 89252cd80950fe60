//! Per-subsystem bookkeeping: identity plus the subsystem-local allocation
//! tables.
//!
//! A `SubsystemSlot` holds the authoritative values of its continuous
//! variables only while the global vectors are *not* assembled.  Once the
//! system reaches `Model` the values live in the global Y and the slot keeps
//! just the block lengths; they are written back here if the system drops
//! below `Model` again.

use mbs_core::{Stage, StageError, StageResult, SubsystemIndex};

use crate::value::{CacheEntry, DiscreteVariable};

/// What is being allocated; decides which window rules apply.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum AllocationKind {
    Q,
    U,
    Z,
    QErr,
    UErr,
    UDotErr,
    DiscreteVariable(Stage),
    CacheEntry(Stage),
}

impl AllocationKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            AllocationKind::Q                   => "q",
            AllocationKind::U                   => "u",
            AllocationKind::Z                   => "z",
            AllocationKind::QErr                => "qerr",
            AllocationKind::UErr                => "uerr",
            AllocationKind::UDotErr             => "udoterr",
            AllocationKind::DiscreteVariable(_) => "discrete variable",
            AllocationKind::CacheEntry(_)       => "cache entry",
        }
    }

    /// May this kind be allocated during window 2 (subsystem at `Topology`)?
    ///
    /// Continuous variables and error slots always belong above `Model`;
    /// discrete variables must be owned above `Model` and cache entries at
    /// `Model` or above.
    pub(crate) fn allowed_in_modeling_window(self) -> bool {
        match self {
            AllocationKind::DiscreteVariable(stage) => stage > Stage::Model,
            AllocationKind::CacheEntry(stage)       => stage >= Stage::Model,
            _                                       => true,
        }
    }
}

/// Outcome of checking an allocation against the subsystem's window.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum WindowCheck {
    Allowed,
    /// Accepted only because strict window checking is off.
    Lenient,
}

/// Decide whether a subsystem at `stage` may allocate `kind`.
pub(crate) fn check_window(
    subsystem: SubsystemIndex,
    stage:     Stage,
    kind:      AllocationKind,
    strict:    bool,
) -> StageResult<WindowCheck> {
    let locked = || StageError::AllocationAfterLock {
        subsystem,
        subsystem_stage: stage,
        what: kind.as_str(),
    };
    match stage {
        Stage::Empty => Ok(WindowCheck::Allowed),
        Stage::Topology if kind.allowed_in_modeling_window() => Ok(WindowCheck::Allowed),
        Stage::Topology if !strict => Ok(WindowCheck::Lenient),
        _ => Err(locked()),
    }
}

// ── SubsystemSlot ─────────────────────────────────────────────────────────────

pub(crate) struct SubsystemSlot {
    pub(crate) name:    String,
    pub(crate) version: String,

    /// Continuous variables in allocation order.  Authoritative only while
    /// the global state is not assembled.
    pub(crate) q: Vec<f64>,
    pub(crate) u: Vec<f64>,
    pub(crate) z: Vec<f64>,

    pub(crate) nqerr:    usize,
    pub(crate) nuerr:    usize,
    pub(crate) nudoterr: usize,

    pub(crate) discrete: Vec<DiscreteVariable>,
    pub(crate) cache:    Vec<CacheEntry>,
}

impl SubsystemSlot {
    pub(crate) fn new(name: String, version: String) -> Self {
        Self {
            name,
            version,
            q: Vec::new(),
            u: Vec::new(),
            z: Vec::new(),
            nqerr: 0,
            nuerr: 0,
            nudoterr: 0,
            discrete: Vec::new(),
            cache: Vec::new(),
        }
    }
}

/// Copies the allocations and state values; cache entries restart from
/// their allocation-time values.
impl Clone for SubsystemSlot {
    fn clone(&self) -> Self {
        Self {
            name:     self.name.clone(),
            version:  self.version.clone(),
            q:        self.q.clone(),
            u:        self.u.clone(),
            z:        self.z.clone(),
            nqerr:    self.nqerr,
            nuerr:    self.nuerr,
            nudoterr: self.nudoterr,
            discrete: self.discrete.clone(),
            cache:    self.cache.iter().map(CacheEntry::fresh).collect(),
        }
    }
}
