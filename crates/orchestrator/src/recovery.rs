//! Destination-side completion of cross-network payments.
//!
//! Finalize is driven only by the persisted `(message, attestation)` pair so
//! it can run long after the burn, including after a restart. The
//! destination rejects a message it has already consumed; that answer is
//! treated as success. A persisted burn without an attestation yet is
//! attested by the sweep before it is finalized.

use cosmwasm_std::Binary;
use intent_settle_metrics::{FinalizeAttempt, MetricsCollector};
use intent_settle_ratelimit::{retry, LinearBackoff, RetryError};
use intent_settle_relayer::{AttestationService, AttestationStatus, ChainError, TxHash, TxPayload};
use intent_settle_settlement::{IntentRecord, RecordError};
use intent_settle_types::{
    BridgeTransfer, ErrorKind, ExecutionReceipt, IntentId, IntentStatus, NetworkId, Uint256,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::submitter::{SubmitError, TxSubmitter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Linear backoff step: delays are step, 2·step, 3·step...
    pub backoff_step: Duration,
    pub backoff_max: Duration,
    pub confirmation_timeout: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_step: Duration::from_secs(5),
            backoff_max: Duration::from_secs(15),
            confirmation_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    pub network: NetworkId,
    /// Mint transaction. `None` only when the destination reported the
    /// message as consumed without naming the transaction.
    pub tx_hash: Option<TxHash>,
    pub sequence: Option<u64>,
    pub already_processed: bool,
    pub attempts: u32,
}

impl FinalizeOutcome {
    pub fn receipt(&self, amount: Uint256) -> ExecutionReceipt {
        ExecutionReceipt {
            network: self.network.clone(),
            tx_hash: self.tx_hash.clone(),
            executed_amount: amount,
            sequence: self.sequence,
            batch_id: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FinalizeError {
    #[error("finalize on {network} gave up after {attempts} attempts: {last}")]
    Exhausted {
        network: NetworkId,
        attempts: u32,
        last: SubmitError,
    },

    #[error("finalize on {network} rejected: {reason}")]
    Rejected {
        network: NetworkId,
        reason: SubmitError,
    },
}

impl FinalizeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FinalizeError::Exhausted { .. } => ErrorKind::Network,
            FinalizeError::Rejected { .. } => ErrorKind::Validation,
        }
    }

    /// A later finalize with the same pair may still succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FinalizeError::Exhausted { .. })
    }
}

/// Result of a sweep over persisted bridge transfers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Mint recorded on the intent.
    pub finalized: Vec<IntentId>,
    /// Subset of `finalized` that moved `Executing -> Completed`.
    pub completed: Vec<IntentId>,
    /// Burned, but the attester has not signed yet.
    pub awaiting_attestation: Vec<IntentId>,
    /// Currently executing in this process; left alone.
    pub skipped: Vec<IntentId>,
    pub failed: Vec<(IntentId, String)>,
}

pub struct BridgeRecovery {
    submitter: Arc<TxSubmitter>,
    attestations: Arc<dyn AttestationService>,
    record: Arc<IntentRecord>,
    config: RecoveryConfig,
    metrics: MetricsCollector,
}

impl BridgeRecovery {
    pub fn new(
        submitter: Arc<TxSubmitter>,
        attestations: Arc<dyn AttestationService>,
        record: Arc<IntentRecord>,
        config: RecoveryConfig,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            submitter,
            attestations,
            record,
            config,
            metrics,
        }
    }

    /// Relay an attested message to `dest`. Safe to call any number of
    /// times for the same pair.
    pub async fn finalize(
        &self,
        message: &Binary,
        attestation: &Binary,
        dest: &NetworkId,
    ) -> Result<FinalizeOutcome, FinalizeError> {
        let mut backoff = LinearBackoff::new(self.config.backoff_step, self.config.backoff_max);

        let result = retry(
            self.config.max_retries,
            &mut backoff,
            move |attempt| self.attempt(message, attestation, dest, attempt),
            SubmitError::is_transient,
        )
        .await;

        match result {
            Ok(outcome) => {
                info!(
                    network = %dest,
                    attempts = outcome.attempts,
                    already_processed = outcome.already_processed,
                    mint_tx_hash = ?outcome.tx_hash,
                    "Bridge transfer finalized"
                );
                Ok(outcome)
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                self.metrics
                    .record_finalize_attempt(dest.as_str(), FinalizeAttempt::Failed);
                warn!(network = %dest, attempts = attempts, error = %last, "Finalize retries exhausted");
                Err(FinalizeError::Exhausted {
                    network: dest.clone(),
                    attempts,
                    last,
                })
            }
            Err(RetryError::Fatal(reason)) => {
                warn!(network = %dest, error = %reason, "Finalize rejected");
                Err(FinalizeError::Rejected {
                    network: dest.clone(),
                    reason,
                })
            }
        }
    }

    async fn attempt(
        &self,
        message: &Binary,
        attestation: &Binary,
        dest: &NetworkId,
        attempt: u32,
    ) -> Result<FinalizeOutcome, SubmitError> {
        let payload = TxPayload::ReceiveMessage {
            message: message.clone(),
            attestation: attestation.clone(),
        };

        let result = match self.submitter.submit(dest, payload).await {
            Ok(submitted) => self
                .submitter
                .confirm(dest, &submitted.tx_hash, self.config.confirmation_timeout)
                .await
                .map(|_| FinalizeOutcome {
                    network: dest.clone(),
                    tx_hash: Some(submitted.tx_hash),
                    sequence: Some(submitted.sequence),
                    already_processed: false,
                    attempts: attempt,
                })
                .map_err(SubmitError::Chain),
            Err(SubmitError::Chain(ChainError::AlreadyProcessed { tx_hash })) => {
                Ok(FinalizeOutcome {
                    network: dest.clone(),
                    tx_hash,
                    sequence: None,
                    already_processed: true,
                    attempts: attempt,
                })
            }
            Err(e) => Err(e),
        };

        let label = match &result {
            Ok(outcome) if outcome.already_processed => FinalizeAttempt::AlreadyProcessed,
            Ok(_) => FinalizeAttempt::Minted,
            Err(e) if e.is_transient() => FinalizeAttempt::Retrying,
            Err(_) => FinalizeAttempt::Failed,
        };
        self.metrics.record_finalize_attempt(dest.as_str(), label);
        result
    }

    /// Carry every persisted, unminted bridge transfer of an executing
    /// intent forward: attest it if needed, then finalize it.
    ///
    /// Intents in `in_flight` are skipped: their own execution is still
    /// driving the transfer. An intent whose mint lands here is completed.
    pub async fn sweep(&self, in_flight: &HashSet<IntentId>) -> Result<SweepReport, RecordError> {
        let pending = self.record.pending_bridge_finalizations().await?;
        let mut report = SweepReport::default();
        info!(pending = pending.len(), "Sweeping bridge transfers");

        for intent in pending {
            if in_flight.contains(&intent.id) {
                report.skipped.push(intent.id);
                continue;
            }
            let Some(transfer) = intent.bridge_transfer.clone() else {
                continue;
            };

            let (message, attestation) = match (&transfer.message, &transfer.attestation) {
                (Some(message), Some(attestation)) => (message.clone(), attestation.clone()),
                _ => match self.attest(&transfer).await {
                    Ok(Some((message, attestation))) => {
                        self.record
                            .record_bridge_transfer(
                                &intent.id,
                                transfer
                                    .clone()
                                    .with_attestation(message.clone(), attestation.clone()),
                            )
                            .await?;
                        info!(intent_id = %intent.id, burn_tx_hash = %transfer.burn_tx_hash, "Attestation recovered");
                        (message, attestation)
                    }
                    Ok(None) => {
                        debug!(intent_id = %intent.id, burn_tx_hash = %transfer.burn_tx_hash, "Attestation still pending");
                        report.awaiting_attestation.push(intent.id);
                        continue;
                    }
                    Err(e) => {
                        warn!(intent_id = %intent.id, error = %e, "Sweep could not fetch attestation");
                        report.failed.push((intent.id, e.to_string()));
                        continue;
                    }
                },
            };

            let outcome = match self
                .finalize(&message, &attestation, &transfer.dest_network)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(intent_id = %intent.id, error = %e, "Sweep could not finalize");
                    report.failed.push((intent.id, e.to_string()));
                    continue;
                }
            };

            self.record
                .record_mint(&intent.id, outcome.tx_hash.clone())
                .await?;
            report.finalized.push(intent.id.clone());

            if intent.status == IntentStatus::Executing {
                match self
                    .record
                    .attach_result(&intent.id, outcome.receipt(intent.amount))
                    .await
                {
                    Ok(_) => {
                        self.metrics.record_intent_status(IntentStatus::Completed);
                        report.completed.push(intent.id);
                    }
                    Err(e) => {
                        warn!(intent_id = %intent.id, error = %e, "Minted but could not complete");
                        report.failed.push((intent.id, e.to_string()));
                    }
                }
            }
        }

        info!(
            finalized = report.finalized.len(),
            completed = report.completed.len(),
            awaiting_attestation = report.awaiting_attestation.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Sweep finished"
        );
        Ok(report)
    }

    /// One bounded attestation fetch. `None` while the attester is pending.
    async fn attest(&self, transfer: &BridgeTransfer) -> Result<Option<(Binary, Binary)>, ChainError> {
        let timeout = self.config.confirmation_timeout;
        let fetch = self
            .attestations
            .fetch_attestation(&transfer.source_network, &transfer.burn_tx_hash);
        match tokio::time::timeout(timeout, fetch).await {
            Ok(Ok(AttestationStatus::Ready {
                message,
                attestation,
            })) => Ok(Some((message, attestation))),
            Ok(Ok(AttestationStatus::Pending)) => Ok(None),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ChainError::Timeout(format!(
                "attestation fetch for {} exceeded {timeout:?}",
                transfer.burn_tx_hash
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::NetworkLocks;
    use crate::submitter::Accounts;
    use intent_settle_relayer::{
        mock_attestation, MockAttestationService, MockChainClient, SubmitFault,
    };
    use intent_settle_settlement::InMemoryStore;
    use intent_settle_types::NewIntent;

    const RECIPIENT: &str = "0x00000000000000000000000000000000000000aa";

    struct Harness {
        chain: Arc<MockChainClient>,
        attester: Arc<MockAttestationService>,
        submitter: Arc<TxSubmitter>,
        record: Arc<IntentRecord>,
        recovery: BridgeRecovery,
    }

    fn harness() -> Harness {
        let chain = Arc::new(MockChainClient::new());
        let submitter = Arc::new(TxSubmitter::new(
            chain.clone(),
            Arc::new(NetworkLocks::new(Duration::from_secs(5))),
            Accounts::default(),
            MetricsCollector::new(),
        ));
        let attester = Arc::new(MockAttestationService::new(chain.clone()));
        let record = Arc::new(IntentRecord::new(Arc::new(InMemoryStore::new())));
        let config = RecoveryConfig {
            max_retries: 3,
            backoff_step: Duration::from_millis(1),
            backoff_max: Duration::from_millis(3),
            confirmation_timeout: Duration::from_millis(50),
        };
        let recovery = BridgeRecovery::new(
            submitter.clone(),
            attester.clone(),
            record.clone(),
            config,
            MetricsCollector::new(),
        );
        Harness {
            chain,
            attester,
            submitter,
            record,
            recovery,
        }
    }

    /// Burn on `base` and return the attested message.
    async fn burned(h: &Harness) -> (String, Binary, Binary) {
        let burn = h
            .submitter
            .submit(
                &NetworkId::from("base"),
                TxPayload::Burn {
                    asset: "USDC".to_string(),
                    amount: Uint256::from(25u128),
                    dest_network: NetworkId::from("arbitrum"),
                    recipient: RECIPIENT.to_string(),
                },
            )
            .await
            .unwrap();
        let message = h.chain.burn_message(&burn.tx_hash).await.unwrap();
        let attestation = mock_attestation(&message);
        (burn.tx_hash, message, attestation)
    }

    #[tokio::test]
    async fn test_finalize_is_idempotent() {
        let h = harness();
        let (_, message, attestation) = burned(&h).await;
        let dest = NetworkId::from("arbitrum");

        let first = h.recovery.finalize(&message, &attestation, &dest).await.unwrap();
        assert!(!first.already_processed);
        assert!(first.tx_hash.is_some());

        let second = h.recovery.finalize(&message, &attestation, &dest).await.unwrap();
        assert!(second.already_processed);
        assert_eq!(second.tx_hash, first.tx_hash);

        assert_eq!(h.chain.mint_count().await, 1);
    }

    #[tokio::test]
    async fn test_timeout_after_acceptance_resolves_to_original_mint() {
        let h = harness();
        let (_, message, attestation) = burned(&h).await;
        let dest = NetworkId::from("arbitrum");
        h.chain.inject_fault("arbitrum", SubmitFault::AcceptThenTimeout).await;

        let outcome = h.recovery.finalize(&message, &attestation, &dest).await.unwrap();
        assert!(outcome.already_processed);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.tx_hash, h.chain.mint_of(&message).await);
        assert_eq!(h.chain.mint_count().await, 1);
    }

    #[tokio::test]
    async fn test_revert_fails_without_retry() {
        let h = harness();
        let (_, message, _) = burned(&h).await;
        let dest = NetworkId::from("arbitrum");

        let err = h
            .recovery
            .finalize(&message, &Binary::from(b"forged".to_vec()), &dest)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FinalizeError::Rejected {
                reason: SubmitError::Chain(ChainError::Reverted(_)),
                ..
            }
        ));
        assert!(!err.is_recoverable());
        assert_eq!(h.chain.mint_count().await, 0);
    }

    #[tokio::test]
    async fn test_exhausted_then_rerun_succeeds() {
        let h = harness();
        let (_, message, attestation) = burned(&h).await;
        let dest = NetworkId::from("arbitrum");
        for _ in 0..4 {
            h.chain
                .inject_fault(
                    "arbitrum",
                    SubmitFault::Error(ChainError::Timeout("rpc timeout".into())),
                )
                .await;
        }

        let err = h
            .recovery
            .finalize(&message, &attestation, &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, FinalizeError::Exhausted { attempts: 4, .. }));
        assert!(err.is_recoverable());
        assert_eq!(err.kind(), ErrorKind::Network);

        // Operator reruns later with the persisted pair.
        let outcome = h.recovery.finalize(&message, &attestation, &dest).await.unwrap();
        assert!(!outcome.already_processed);
        assert_eq!(outcome.tx_hash, h.chain.mint_of(&message).await);
        assert_eq!(h.chain.mint_count().await, 1);
    }

    async fn executing_payment(h: &Harness, burn_tx_hash: &str, message: Binary, attestation: Binary) -> IntentId {
        let id = executing_burn(h, burn_tx_hash).await;
        let transfer = BridgeTransfer::burned(
            NetworkId::from("base"),
            NetworkId::from("arbitrum"),
            burn_tx_hash,
        )
        .with_attestation(message, attestation);
        h.record.record_bridge_transfer(&id, transfer).await.unwrap();
        id
    }

    /// Executing payment with only the burn persisted.
    async fn executing_burn(h: &Harness, burn_tx_hash: &str) -> IntentId {
        let id = h
            .record
            .create(NewIntent::payment(
                "base",
                "arbitrum",
                "USDC",
                RECIPIENT,
                Uint256::from(25u128),
            ))
            .await
            .unwrap();
        for status in [
            IntentStatus::Analyzing,
            IntentStatus::ReadyForReview,
            IntentStatus::Executing,
        ] {
            h.record.transition(&id, status, "step").await.unwrap();
        }
        let transfer = BridgeTransfer::burned(
            NetworkId::from("base"),
            NetworkId::from("arbitrum"),
            burn_tx_hash,
        );
        h.record.record_bridge_transfer(&id, transfer).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_sweep_completes_stranded_payment() {
        let h = harness();
        let (burn, message, attestation) = burned(&h).await;
        let id = executing_payment(&h, &burn, message.clone(), attestation).await;

        let report = h.recovery.sweep(&HashSet::new()).await.unwrap();
        assert_eq!(report.finalized, vec![id.clone()]);
        assert_eq!(report.completed, vec![id.clone()]);

        let intent = h.record.get(&id).await.unwrap();
        assert_eq!(intent.status, IntentStatus::Completed);
        let mint = h.chain.mint_of(&message).await;
        assert_eq!(intent.result.unwrap().tx_hash, mint);
        assert!(intent.bridge_transfer.unwrap().finalized);

        // Nothing left to do on a second pass.
        let again = h.recovery.sweep(&HashSet::new()).await.unwrap();
        assert_eq!(again, SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_skips_in_flight() {
        let h = harness();
        let (burn, message, attestation) = burned(&h).await;
        let id = executing_payment(&h, &burn, message, attestation).await;

        let in_flight: HashSet<_> = [id.clone()].into_iter().collect();
        let report = h.recovery.sweep(&in_flight).await.unwrap();
        assert_eq!(report.skipped, vec![id]);
        assert_eq!(h.chain.mint_count().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_attests_burn_before_finalizing() {
        let h = harness();
        let (burn, message, _) = burned(&h).await;
        let id = executing_burn(&h, &burn).await;

        h.attester.set_withheld(true);
        let report = h.recovery.sweep(&HashSet::new()).await.unwrap();
        assert_eq!(report.awaiting_attestation, vec![id.clone()]);
        assert!(report.finalized.is_empty());
        assert!(h.record.get(&id).await.unwrap().bridge_transfer.unwrap().attestation.is_none());

        h.attester.set_withheld(false);
        let report = h.recovery.sweep(&HashSet::new()).await.unwrap();
        assert_eq!(report.completed, vec![id.clone()]);

        let intent = h.record.get(&id).await.unwrap();
        assert_eq!(intent.status, IntentStatus::Completed);
        let transfer = intent.bridge_transfer.unwrap();
        assert_eq!(transfer.message, Some(message.clone()));
        assert!(transfer.finalized);
        assert_eq!(transfer.mint_tx_hash, h.chain.mint_of(&message).await);
    }

    #[tokio::test]
    async fn test_sweep_reports_unknown_burn() {
        let h = harness();
        let id = executing_burn(&h, "0xmissing").await;

        let report = h.recovery.sweep(&HashSet::new()).await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, id);
        assert_eq!(
            h.record.get(&id).await.unwrap().status,
            IntentStatus::Executing
        );
    }
}
