use intent_settle_types::{Direction, IntentId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitmentError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("malformed commitment: {0}")]
    MalformedCommitment(String),

    #[error("randomness unavailable: {0}")]
    RandomnessUnavailable(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NettingError {
    #[error("intent {intent_id} already has a commitment in this round")]
    DuplicateLeg { intent_id: IntentId },

    #[error("intent {intent_id} is not part of this round")]
    UnknownIntent { intent_id: IntentId },

    #[error("no reveal received for intent {intent_id}")]
    MissingReveal { intent_id: IntentId },

    #[error("reveal does not open the commitment of intent {intent_id}")]
    CommitmentMismatch { intent_id: IntentId },

    #[error("aggregate {direction} commitment does not open to the revealed total")]
    AggregateMismatch { direction: Direction },

    #[error("residual does not fit in 256 bits")]
    ResidualOverflow,

    #[error("commitment error: {0}")]
    Commitment(#[from] CommitmentError),
}
