use async_trait::async_trait;
use cosmwasm_std::{Binary, Uint256};
use intent_settle_types::NetworkId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub type TxHash = String;

/// Chain error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("stale sequence: expected {expected}, got {got}")]
    StaleSequence { expected: u64, got: u64 },

    #[error("insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("slippage exceeded: {0}")]
    SlippageExceeded(String),

    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    /// The destination already consumed this bridge message.
    #[error("message already processed")]
    AlreadyProcessed { tx_hash: Option<TxHash> },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

impl ChainError {
    /// Worth another attempt with the same inputs.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ChainError::Timeout(_) | ChainError::Rpc(_) | ChainError::ConnectionFailed(_)
        )
    }
}

/// What a transaction does on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TxPayload {
    Swap {
        pool_id: String,
        asset_in: String,
        asset_out: String,
        amount: Uint256,
        fee_tier_ppm: u32,
    },
    Transfer {
        asset: String,
        recipient: String,
        amount: Uint256,
    },
    /// Burn on the source network, emitting a bridge message.
    Burn {
        asset: String,
        amount: Uint256,
        dest_network: NetworkId,
        recipient: String,
    },
    /// Mint on the destination network from an attested message.
    ReceiveMessage { message: Binary, attestation: Binary },
    RedeemClaim { claim_id: String },
}

impl TxPayload {
    pub fn label(&self) -> &'static str {
        match self {
            TxPayload::Swap { .. } => "swap",
            TxPayload::Transfer { .. } => "transfer",
            TxPayload::Burn { .. } => "burn",
            TxPayload::ReceiveMessage { .. } => "receive_message",
            TxPayload::RedeemClaim { .. } => "redeem_claim",
        }
    }
}

/// Transaction with an explicit sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub network: NetworkId,
    pub account: String,
    pub sequence: u64,
    pub payload: TxPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub height: u64,
}

/// Funds from an earlier bridge transfer that can be claimed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemableClaim {
    pub claim_id: String,
    pub asset: String,
    pub amount: Uint256,
}

/// Chain client trait for interacting with chains
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Next sequence number the node expects from `account`.
    async fn get_sequence_number(
        &self,
        network: &NetworkId,
        account: &str,
    ) -> Result<u64, ChainError>;

    /// Returns once the node has accepted the transaction into its mempool.
    async fn submit(&self, tx: Transaction) -> Result<TxHash, ChainError>;

    async fn await_confirmation(
        &self,
        network: &NetworkId,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<Confirmation, ChainError>;

    async fn redeemable_claims(
        &self,
        _network: &NetworkId,
        _account: &str,
        _asset: &str,
    ) -> Result<Vec<RedeemableClaim>, ChainError> {
        Ok(Vec::new())
    }
}
