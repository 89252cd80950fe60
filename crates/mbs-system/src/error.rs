use mbs_core::{Stage, StageError, SubsystemIndex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("system configuration error: {0}")]
    Config(String),

    #[error("state has {got} subsystems but the system has {expected}")]
    SubsystemCountMismatch { expected: usize, got: usize },

    #[error("{subsystem} failed to realize {stage}: {reason}")]
    Realize {
        subsystem: SubsystemIndex,
        stage:     Stage,
        reason:    String,
    },

    #[error("stage contract violated: {0}")]
    Stage(#[from] StageError),
}

impl SystemError {
    /// Shorthand for a collaborator-reported [`SystemError::Realize`].
    pub fn realize(subsystem: SubsystemIndex, stage: Stage, reason: impl Into<String>) -> Self {
        SystemError::Realize { subsystem, stage, reason: reason.into() }
    }
}

pub type SystemResult<T> = Result<T, SystemError>;
