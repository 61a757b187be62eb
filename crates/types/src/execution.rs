use cosmwasm_std::{Binary, Uint256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::NetworkId;

/// Error taxonomy preserved on a failed intent so callers can tell user
/// mistakes from market conditions and infrastructure trouble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed amount or address, rejected before any on-chain action.
    Validation,
    /// Insufficient pool depth or slippage bound exceeded.
    Liquidity,
    /// Stale sequence number that survived the internal retry.
    Concurrency,
    /// RPC failure or timeout.
    Network,
    /// A programming defect such as an impossible state transition.
    InvariantViolation,
    /// Cancelled by the owner.
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Liquidity => "liquidity",
            ErrorKind::Concurrency => "concurrency",
            ErrorKind::Network => "network",
            ErrorKind::InvariantViolation => "invariant_violation",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error attached to an intent in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl IntentFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "cancelled by request")
    }
}

impl fmt::Display for IntentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Result attached to an intent in `Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    /// Network the final transaction landed on.
    pub network: NetworkId,

    /// Hash of the on-chain transaction; `None` when the intent was fully
    /// offset inside a netting batch and nothing was submitted.
    pub tx_hash: Option<String>,

    /// Amount actually submitted on-chain for this intent (or its batch).
    pub executed_amount: Uint256,

    /// Sequence number the submission used.
    pub sequence: Option<u64>,

    /// Netting batch the intent was settled through, if any.
    pub batch_id: Option<String>,
}

impl ExecutionReceipt {
    pub fn on_chain(
        network: NetworkId,
        tx_hash: impl Into<String>,
        executed_amount: Uint256,
        sequence: Option<u64>,
    ) -> Self {
        Self {
            network,
            tx_hash: Some(tx_hash.into()),
            executed_amount,
            sequence,
            batch_id: None,
        }
    }

    pub fn netted(network: NetworkId, batch_id: impl Into<String>) -> Self {
        Self {
            network,
            tx_hash: None,
            executed_amount: Uint256::zero(),
            sequence: None,
            batch_id: Some(batch_id.into()),
        }
    }

    pub fn with_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }
}

/// Persisted progress of a cross-network payment.
///
/// Finalization on the destination is driven only by this record, so it
/// can resume after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeTransfer {
    pub source_network: NetworkId,
    pub dest_network: NetworkId,
    pub burn_tx_hash: String,
    pub message: Option<Binary>,
    pub attestation: Option<Binary>,
    /// Mint on the destination; `None` when the chain reported the message
    /// as already processed without naming the original transaction.
    pub mint_tx_hash: Option<String>,
    #[serde(default)]
    pub finalized: bool,
}

impl BridgeTransfer {
    pub fn burned(
        source_network: NetworkId,
        dest_network: NetworkId,
        burn_tx_hash: impl Into<String>,
    ) -> Self {
        Self {
            source_network,
            dest_network,
            burn_tx_hash: burn_tx_hash.into(),
            message: None,
            attestation: None,
            mint_tx_hash: None,
            finalized: false,
        }
    }

    pub fn with_attestation(mut self, message: Binary, attestation: Binary) -> Self {
        self.message = Some(message);
        self.attestation = Some(attestation);
        self
    }

    /// Attested on the source side but not yet minted on the destination.
    pub fn awaiting_finalization(&self) -> bool {
        self.message.is_some() && self.attestation.is_some() && !self.finalized
    }
}
