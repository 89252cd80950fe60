//! Stage-contract error type.
//!
//! Every variant is a contract violation by the calling subsystem or driver,
//! not a transient runtime condition.  The store detects the violation before
//! touching any storage, so a failed call never leaves partially updated
//! state behind.

use thiserror::Error;

use crate::{Stage, SubsystemIndex};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("cannot advance from {current} to {requested}: stages advance one step at a time")]
    OutOfOrderAdvance {
        current:   Stage,
        requested: Stage,
    },

    #[error("{subsystem} cannot allocate {what} at {subsystem_stage}: allocation window is closed")]
    AllocationAfterLock {
        subsystem:       SubsystemIndex,
        subsystem_stage: Stage,
        what:            &'static str,
    },

    #[error("{what} requires stage {required} but stage is {current}")]
    StageNotRealized {
        what:     &'static str,
        required: Stage,
        current:  Stage,
    },

    #[error("global state is not assembled (system stage is {system_stage}, needs model)")]
    GlobalStateNotAssembled { system_stage: Stage },

    #[error("cannot advance system to {requested}: {subsystem} is only at {subsystem_stage}")]
    SubsystemsNotReady {
        requested:       Stage,
        subsystem:       SubsystemIndex,
        subsystem_stage: Stage,
    },

    #[error("invalid {what} handle {index} for {subsystem}")]
    InvalidHandle {
        subsystem: SubsystemIndex,
        what:      &'static str,
        index:     usize,
    },

    #[error("{what} holds a `{actual}`, not a `{expected}`")]
    ValueTypeMismatch {
        what:     &'static str,
        expected: &'static str,
        actual:   &'static str,
    },

    #[error("{what} is already borrowed")]
    CacheBorrowed { what: &'static str },

    #[error("{subsystem} cannot allocate {what}: {len} entries exhaust the index range")]
    IndexOverflow {
        subsystem: SubsystemIndex,
        what:      &'static str,
        len:       usize,
    },
}

/// Shorthand result type for all stage-checked operations.
pub type StageResult<T> = Result<T, StageError>;
