use intent_settle_types::{ErrorKind, IntentId, IntentStatus};
use thiserror::Error;

use crate::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("intent not found: {0}")]
    NotFound(IntentId),

    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: IntentId,
        from: IntentStatus,
        to: IntentStatus,
    },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RecordError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordError::NotFound(_) | RecordError::InvalidTransition { .. } => {
                ErrorKind::Validation
            }
            RecordError::InvariantViolation(_) => ErrorKind::InvariantViolation,
            RecordError::Store(_) => ErrorKind::Network,
        }
    }
}
