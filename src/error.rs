//! Error taxonomy
//!
//! Every operation validates before it mutates, so any error returned here
//! means no state was changed.

use reward_math::accrual::MathError;

use crate::types::{Action, Address, ProgramKey};

/// Rejected input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: &'static str,
    },

    #[error("batch parameter lengths differ: expected {expected}, got {got} for `{name}`")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("program {0} appears more than once in the batch")]
    DuplicateKey(ProgramKey),
}

/// Operation not allowed in the current program state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("program {0} is still active")]
    ProgramAlreadyActive(ProgramKey),

    #[error("no program for {0}")]
    ProgramNotFound(ProgramKey),

    #[error("program {0} is finished")]
    ProgramFinished(ProgramKey),

    #[error("reserve of {key} generation {generation} holds {available}, cannot pay {requested}")]
    InsufficientReserve {
        key: ProgramKey,
        generation: u32,
        requested: u128,
        available: u128,
    },

    #[error("program lock poisoned")]
    LockPoisoned,
}

/// Caller lacks the role for an action
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    #[error("{caller} is not authorized to {action:?}")]
    Unauthorized { caller: Address, action: Action },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DistributorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// Nothing payable across the whole claim batch
    #[error("nothing to claim")]
    ZeroClaim,

    #[error("accrual math: {0}")]
    Math(MathError),

    /// The custodian refused to collect program funding
    #[error("custody: {0}")]
    Custody(String),
}

impl From<MathError> for DistributorError {
    fn from(e: MathError) -> Self {
        DistributorError::Math(e)
    }
}

pub type Result<T> = core::result::Result<T, DistributorError>;
