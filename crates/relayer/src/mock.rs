//! Simulated chain and attestation service.
//!
//! Backs the unit tests and the demo binary. The ledger keeps one sequence
//! counter per `(network, account)` and enforces it the way a node would.

use async_trait::async_trait;
use cosmwasm_std::{Binary, Uint256};
use intent_settle_types::NetworkId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    AttestationService, AttestationStatus, ChainClient, ChainError, Confirmation,
    RedeemableClaim, Transaction, TxHash, TxPayload,
};

/// Fault applied to the next submission on a network.
#[derive(Debug, Clone)]
pub enum SubmitFault {
    /// Reject the submission with this error.
    Error(ChainError),
    /// Accept and apply the transaction but report a timeout to the caller.
    AcceptThenTimeout,
    /// Another writer lands a transaction just before ours.
    Race,
    /// Never answer.
    Hang,
}

#[derive(Debug, Default)]
struct Ledger {
    sequences: HashMap<(NetworkId, String), u64>,
    submissions: Vec<(TxHash, Transaction)>,
    faults: HashMap<NetworkId, VecDeque<SubmitFault>>,
    stalled: HashSet<NetworkId>,
    pool_liquidity: HashMap<String, Uint256>,
    claims: HashMap<(NetworkId, String), Vec<RedeemableClaim>>,
    /// burn tx hash -> emitted bridge message
    burns: HashMap<TxHash, Binary>,
    /// bridge message -> mint tx hash
    mints: HashMap<Binary, TxHash>,
    tx_counter: u64,
    external_txs: u64,
}

/// Mock chain client for testing
#[derive(Debug, Default)]
pub struct MockChainClient {
    ledger: Mutex<Ledger>,
    latency: Duration,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every submission, so concurrent callers interleave.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn inject_fault(&self, network: impl Into<NetworkId>, fault: SubmitFault) {
        self.ledger
            .lock()
            .await
            .faults
            .entry(network.into())
            .or_default()
            .push_back(fault);
    }

    /// Confirmations on `network` never arrive while stalled.
    pub async fn set_stalled(&self, network: impl Into<NetworkId>, stalled: bool) {
        let mut ledger = self.ledger.lock().await;
        let network = network.into();
        if stalled {
            ledger.stalled.insert(network);
        } else {
            ledger.stalled.remove(&network);
        }
    }

    pub async fn set_pool_liquidity(&self, pool_id: impl Into<String>, liquidity: Uint256) {
        self.ledger
            .lock()
            .await
            .pool_liquidity
            .insert(pool_id.into(), liquidity);
    }

    pub async fn add_claim(
        &self,
        network: impl Into<NetworkId>,
        account: impl Into<String>,
        claim: RedeemableClaim,
    ) {
        self.ledger
            .lock()
            .await
            .claims
            .entry((network.into(), account.into()))
            .or_default()
            .push(claim);
    }

    /// Accepted transactions in submission order.
    pub async fn submissions(&self) -> Vec<Transaction> {
        self.ledger
            .lock()
            .await
            .submissions
            .iter()
            .map(|(_, tx)| tx.clone())
            .collect()
    }

    pub async fn submissions_on(&self, network: &NetworkId) -> Vec<Transaction> {
        self.submissions()
            .await
            .into_iter()
            .filter(|tx| &tx.network == network)
            .collect()
    }

    /// Bridge message emitted by a burn.
    pub async fn burn_message(&self, burn_tx_hash: &str) -> Option<Binary> {
        self.ledger.lock().await.burns.get(burn_tx_hash).cloned()
    }

    pub async fn mint_of(&self, message: &Binary) -> Option<TxHash> {
        self.ledger.lock().await.mints.get(message).cloned()
    }

    /// Number of messages minted so far.
    pub async fn mint_count(&self) -> usize {
        self.ledger.lock().await.mints.len()
    }

    /// Transactions that landed from outside this process.
    pub async fn external_tx_count(&self) -> u64 {
        self.ledger.lock().await.external_txs
    }
}

impl Ledger {
    fn next_hash(&mut self) -> TxHash {
        self.tx_counter += 1;
        format!("0x{:064x}", self.tx_counter)
    }

    fn take_fault(&mut self, network: &NetworkId) -> Option<SubmitFault> {
        self.faults.get_mut(network).and_then(VecDeque::pop_front)
    }

    fn apply(&mut self, tx: &Transaction) -> Result<TxHash, ChainError> {
        let key = (tx.network.clone(), tx.account.clone());
        let expected = self.sequences.get(&key).copied().unwrap_or(0);
        if tx.sequence != expected {
            return Err(ChainError::StaleSequence {
                expected,
                got: tx.sequence,
            });
        }

        match &tx.payload {
            TxPayload::Swap {
                pool_id, amount, ..
            } => {
                if let Some(liquidity) = self.pool_liquidity.get(pool_id) {
                    if amount > liquidity {
                        return Err(ChainError::InsufficientLiquidity(format!(
                            "pool {pool_id} holds {liquidity}, requested {amount}"
                        )));
                    }
                }
            }
            TxPayload::ReceiveMessage { message, attestation } => {
                if let Some(existing) = self.mints.get(message) {
                    return Err(ChainError::AlreadyProcessed {
                        tx_hash: Some(existing.clone()),
                    });
                }
                if !attestation_matches(message, attestation) {
                    return Err(ChainError::Reverted("invalid attestation".to_string()));
                }
            }
            TxPayload::RedeemClaim { claim_id } => {
                let claims = self.claims.entry(key.clone()).or_default();
                let before = claims.len();
                claims.retain(|c| &c.claim_id != claim_id);
                if claims.len() == before {
                    return Err(ChainError::Reverted(format!("unknown claim {claim_id}")));
                }
            }
            TxPayload::Transfer { .. } | TxPayload::Burn { .. } => {}
        }

        let hash = self.next_hash();
        match &tx.payload {
            TxPayload::Burn {
                asset,
                amount,
                dest_network,
                recipient,
            } => {
                let message = format!(
                    "{}|{}|{}|{}|{}|{}",
                    tx.network, dest_network, asset, amount, recipient, hash
                );
                self.burns.insert(hash.clone(), Binary::from(message.into_bytes()));
            }
            TxPayload::ReceiveMessage { message, .. } => {
                self.mints.insert(message.clone(), hash.clone());
            }
            _ => {}
        }

        self.sequences.insert(key, expected + 1);
        self.submissions.push((hash.clone(), tx.clone()));
        Ok(hash)
    }
}

/// Attestation the mock attester produces for `message`.
pub fn mock_attestation(message: &Binary) -> Binary {
    let mut bytes = b"attested:".to_vec();
    bytes.extend_from_slice(message.as_slice());
    Binary::from(bytes)
}

fn attestation_matches(message: &Binary, attestation: &Binary) -> bool {
    mock_attestation(message) == *attestation
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_sequence_number(
        &self,
        network: &NetworkId,
        account: &str,
    ) -> Result<u64, ChainError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .sequences
            .get(&(network.clone(), account.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn submit(&self, tx: Transaction) -> Result<TxHash, ChainError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut ledger = self.ledger.lock().await;
        let fault = ledger.take_fault(&tx.network);
        match fault {
            Some(SubmitFault::Error(e)) => return Err(e),
            Some(SubmitFault::Hang) => {
                drop(ledger);
                debug!(network = %tx.network, "Submission hanging");
                return std::future::pending().await;
            }
            Some(SubmitFault::AcceptThenTimeout) => {
                let hash = ledger.apply(&tx)?;
                debug!(network = %tx.network, tx_hash = %hash, "Accepted, reporting timeout");
                return Err(ChainError::Timeout("broadcast response lost".to_string()));
            }
            Some(SubmitFault::Race) => {
                let key = (tx.network.clone(), tx.account.clone());
                *ledger.sequences.entry(key).or_insert(0) += 1;
                ledger.external_txs += 1;
            }
            None => {}
        }

        let hash = ledger.apply(&tx)?;
        debug!(
            network = %tx.network,
            sequence = tx.sequence,
            kind = tx.payload.label(),
            tx_hash = %hash,
            "Transaction accepted"
        );
        Ok(hash)
    }

    async fn await_confirmation(
        &self,
        network: &NetworkId,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<Confirmation, ChainError> {
        let (stalled, height) = {
            let ledger = self.ledger.lock().await;
            let height = ledger
                .submissions
                .iter()
                .position(|(hash, _)| hash == tx_hash)
                .map(|index| index as u64 + 1);
            (ledger.stalled.contains(network), height)
        };

        match height {
            Some(height) if !stalled => Ok(Confirmation {
                tx_hash: tx_hash.to_string(),
                height,
            }),
            Some(_) => {
                tokio::time::sleep(timeout).await;
                Err(ChainError::Timeout(format!(
                    "{tx_hash} unconfirmed after {timeout:?}"
                )))
            }
            None => Err(ChainError::Rpc(format!("unknown transaction {tx_hash}"))),
        }
    }

    async fn redeemable_claims(
        &self,
        network: &NetworkId,
        account: &str,
        asset: &str,
    ) -> Result<Vec<RedeemableClaim>, ChainError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .claims
            .get(&(network.clone(), account.to_string()))
            .map(|claims| claims.iter().filter(|c| c.asset == asset).cloned().collect())
            .unwrap_or_default())
    }
}

/// Attester over a [`MockChainClient`]. Reports `Pending` for the first
/// `pending_polls` fetches of each burn, and for every fetch while withheld.
pub struct MockAttestationService {
    chain: Arc<MockChainClient>,
    pending_polls: u32,
    withheld: AtomicBool,
    polls: Mutex<HashMap<String, u32>>,
}

impl MockAttestationService {
    pub fn new(chain: Arc<MockChainClient>) -> Self {
        Self {
            chain,
            pending_polls: 0,
            withheld: AtomicBool::new(false),
            polls: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_pending_polls(mut self, pending_polls: u32) -> Self {
        self.pending_polls = pending_polls;
        self
    }

    pub fn set_withheld(&self, withheld: bool) {
        self.withheld.store(withheld, Ordering::SeqCst);
    }
}

#[async_trait]
impl AttestationService for MockAttestationService {
    async fn fetch_attestation(
        &self,
        _source_network: &NetworkId,
        burn_tx_hash: &str,
    ) -> Result<AttestationStatus, ChainError> {
        let message = self
            .chain
            .burn_message(burn_tx_hash)
            .await
            .ok_or_else(|| ChainError::Rpc(format!("unknown burn {burn_tx_hash}")))?;

        let mut polls = self.polls.lock().await;
        let seen = polls.entry(burn_tx_hash.to_string()).or_insert(0);
        *seen += 1;
        if *seen <= self.pending_polls || self.withheld.load(Ordering::SeqCst) {
            return Ok(AttestationStatus::Pending);
        }

        Ok(AttestationStatus::Ready {
            attestation: mock_attestation(&message),
            message,
        })
    }
}
