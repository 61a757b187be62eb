use intent_settle_metrics::MetricsCollector;
use intent_settle_relayer::{ChainClient, ChainError, Confirmation, Transaction, TxHash, TxPayload};
use intent_settle_types::NetworkId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use crate::locks::{LockError, NetworkLocks};

/// Signing account used on each network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accounts {
    pub default_account: String,
    #[serde(default)]
    pub per_network: HashMap<NetworkId, String>,
}

impl Accounts {
    pub fn new(default_account: impl Into<String>) -> Self {
        Self {
            default_account: default_account.into(),
            per_network: HashMap::new(),
        }
    }

    pub fn with_network(mut self, network: impl Into<NetworkId>, account: impl Into<String>) -> Self {
        self.per_network.insert(network.into(), account.into());
        self
    }

    pub fn for_network(&self, network: &NetworkId) -> &str {
        self.per_network
            .get(network)
            .map(String::as_str)
            .unwrap_or(&self.default_account)
    }
}

impl Default for Accounts {
    fn default() -> Self {
        Self::new("settlement-engine")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub tx_hash: TxHash,
    pub sequence: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl SubmitError {
    /// Lock timeouts and transient chain errors.
    pub fn is_transient(&self) -> bool {
        match self {
            SubmitError::Lock(_) => true,
            SubmitError::Chain(e) => e.is_transient(),
        }
    }
}

/// Sequenced submission shared by swaps, transfers and bridge finalize.
///
/// The network lock covers the sequence read and the submission only. A
/// stale sequence is re-read and resubmitted once before it is surfaced.
/// Each chain call made under the lock is bounded by the submit timeout.
pub struct TxSubmitter {
    chain: Arc<dyn ChainClient>,
    locks: Arc<NetworkLocks>,
    accounts: Accounts,
    submit_timeout: Duration,
    metrics: MetricsCollector,
}

pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(15);

impl TxSubmitter {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        locks: Arc<NetworkLocks>,
        accounts: Accounts,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            chain,
            locks,
            accounts,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            metrics,
        }
    }

    pub fn with_submit_timeout(mut self, submit_timeout: Duration) -> Self {
        self.submit_timeout = submit_timeout;
        self
    }

    pub fn account_for(&self, network: &NetworkId) -> &str {
        self.accounts.for_network(network)
    }

    pub async fn submit(
        &self,
        network: &NetworkId,
        payload: TxPayload,
    ) -> Result<Submitted, SubmitError> {
        let kind = payload.label();
        let account = self.accounts.for_network(network).to_string();

        let guard = self.locks.acquire(network).await?;
        self.metrics.record_lock_wait(network.as_str(), guard.waited());

        let mut sequence = self.read_sequence(network, &account).await?;
        let tx = Transaction {
            network: network.clone(),
            account: account.clone(),
            sequence,
            payload,
        };

        let tx_hash = match self.broadcast(tx.clone()).await {
            Ok(hash) => hash,
            Err(ChainError::StaleSequence { expected, got }) => {
                warn!(
                    network = %network,
                    expected = expected,
                    got = got,
                    "Stale sequence, re-reading once"
                );
                self.metrics.record_stale_sequence_retry(network.as_str());

                sequence = self.read_sequence(network, &account).await?;
                let retry = Transaction { sequence, ..tx };
                self.broadcast(retry)
                    .await
                    .map_err(|e| self.failed(network, e))?
            }
            Err(e) => return Err(self.failed(network, e).into()),
        };
        drop(guard);

        self.metrics.record_submission(network.as_str(), kind);
        info!(
            network = %network,
            sequence = sequence,
            kind = kind,
            tx_hash = %tx_hash,
            "Submission accepted"
        );
        Ok(Submitted { tx_hash, sequence })
    }

    /// Wait for inclusion, bounded by `timeout` even if the client is not.
    pub async fn confirm(
        &self,
        network: &NetworkId,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<Confirmation, ChainError> {
        let started = Instant::now();
        let confirmation =
            tokio::time::timeout(timeout, self.chain.await_confirmation(network, tx_hash, timeout))
                .await
                .map_err(|_| {
                    ChainError::Timeout(format!("{tx_hash} unconfirmed after {timeout:?}"))
                })??;

        self.metrics
            .record_confirmation(network.as_str(), started.elapsed());
        Ok(confirmation)
    }

    async fn read_sequence(&self, network: &NetworkId, account: &str) -> Result<u64, ChainError> {
        let timeout = self.submit_timeout;
        tokio::time::timeout(timeout, self.chain.get_sequence_number(network, account))
            .await
            .map_err(|_| {
                ChainError::Timeout(format!("sequence read on {network} exceeded {timeout:?}"))
            })?
    }

    /// A broadcast that times out may still land; the next submission
    /// re-reads the sequence either way.
    async fn broadcast(&self, tx: Transaction) -> Result<TxHash, ChainError> {
        let timeout = self.submit_timeout;
        let network = tx.network.clone();
        tokio::time::timeout(timeout, self.chain.submit(tx))
            .await
            .map_err(|_| ChainError::Timeout(format!("broadcast on {network} exceeded {timeout:?}")))?
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    fn failed(&self, network: &NetworkId, error: ChainError) -> ChainError {
        self.metrics
            .record_submission_failure(network.as_str(), failure_reason(&error));
        error
    }
}

fn failure_reason(error: &ChainError) -> &'static str {
    match error {
        ChainError::StaleSequence { .. } => "stale_sequence",
        ChainError::InsufficientLiquidity(_) => "insufficient_liquidity",
        ChainError::SlippageExceeded(_) => "slippage",
        ChainError::Rejected(_) => "rejected",
        ChainError::Reverted(_) => "reverted",
        ChainError::AlreadyProcessed { .. } => "already_processed",
        ChainError::Timeout(_) => "timeout",
        ChainError::Rpc(_) | ChainError::ConnectionFailed(_) => "rpc",
    }
}
