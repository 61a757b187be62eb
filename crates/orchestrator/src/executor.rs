use intent_settle_metrics::MetricsCollector;
use intent_settle_netting::{NettingBatch, NettingError};
use intent_settle_ratelimit::ExponentialBackoff;
use intent_settle_relayer::{
    poll_attestation, AttestationService, ChainClient, ChainError, TxHash, TxPayload,
};
use intent_settle_settlement::{IntentRecord, RecordError};
use intent_settle_types::{
    BridgeTransfer, Direction, ErrorKind, ExecutionReceipt, Intent, IntentKind, NetworkId, Uint256,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collaborators::PoolDescriptor;
use crate::locks::{LockError, NetworkLocks};
use crate::recovery::{BridgeRecovery, FinalizeError, RecoveryConfig};
use crate::submitter::{Accounts, SubmitError, TxSubmitter, DEFAULT_SUBMIT_TIMEOUT};

/// Execution settings
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub accounts: Accounts,
    pub lock_timeout: Duration,
    /// Bound on each sequence read and broadcast made under a network lock.
    pub submit_timeout: Duration,
    pub confirmation_timeout: Duration,
    /// Overall bound on waiting for a burn attestation.
    pub attestation_timeout: Duration,
    pub attestation_initial_backoff: Duration,
    pub attestation_max_backoff: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            accounts: Accounts::default(),
            lock_timeout: Duration::from_secs(30),
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            confirmation_timeout: Duration::from_secs(60),
            attestation_timeout: Duration::from_secs(30 * 60),
            attestation_initial_backoff: Duration::from_secs(2),
            attestation_max_backoff: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResult {
    pub network: NetworkId,
    pub pool_id: String,
    pub direction: Direction,
    pub amount: Uint256,
    pub tx_hash: TxHash,
    pub sequence: u64,
    pub height: u64,
}

impl SwapResult {
    pub fn receipt(&self) -> ExecutionReceipt {
        ExecutionReceipt::on_chain(
            self.network.clone(),
            self.tx_hash.clone(),
            self.amount,
            Some(self.sequence),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    /// Network the funds landed on.
    pub network: NetworkId,
    /// Transfer or mint transaction.
    pub tx_hash: Option<TxHash>,
    pub sequence: Option<u64>,
    pub amount: Uint256,
    /// Source-side burn for cross-network payments.
    pub burn_tx_hash: Option<TxHash>,
    /// Claims redeemed before the payment.
    pub redeemed_claims: Vec<String>,
}

impl PaymentResult {
    pub fn receipt(&self) -> ExecutionReceipt {
        ExecutionReceipt {
            network: self.network.clone(),
            tx_hash: self.tx_hash.clone(),
            executed_amount: self.amount,
            sequence: self.sequence,
            batch_id: None,
        }
    }
}

/// Drives swaps and payments on-chain.
///
/// Every submission goes through [`TxSubmitter`], so each network's account
/// sequence is only ever read and used under that network's lock.
pub struct ExecutionCoordinator {
    submitter: Arc<TxSubmitter>,
    attestations: Arc<dyn AttestationService>,
    record: Arc<IntentRecord>,
    recovery: Arc<BridgeRecovery>,
    config: ExecutionConfig,
    metrics: MetricsCollector,
}

impl ExecutionCoordinator {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        attestations: Arc<dyn AttestationService>,
        record: Arc<IntentRecord>,
        config: ExecutionConfig,
        recovery_config: RecoveryConfig,
        metrics: MetricsCollector,
    ) -> Self {
        let locks = Arc::new(NetworkLocks::new(config.lock_timeout));
        let submitter = Arc::new(
            TxSubmitter::new(chain, locks, config.accounts.clone(), metrics)
                .with_submit_timeout(config.submit_timeout),
        );
        let recovery = Arc::new(BridgeRecovery::new(
            submitter.clone(),
            attestations.clone(),
            record.clone(),
            recovery_config,
            metrics,
        ));

        Self {
            submitter,
            attestations,
            record,
            recovery,
            config,
            metrics,
        }
    }

    pub fn recovery(&self) -> &Arc<BridgeRecovery> {
        &self.recovery
    }

    /// Submit one swap. The network lock is released as soon as the node
    /// accepts the transaction; confirmation is awaited outside it.
    pub async fn execute_swap(
        &self,
        intent: &Intent,
        pool: &PoolDescriptor,
    ) -> Result<SwapResult, ExecutionError> {
        if intent.kind != IntentKind::Swap {
            return Err(ExecutionError::InvalidIntent(format!(
                "{} is not a swap",
                intent.id
            )));
        }
        let counter = intent.counter_asset.clone().ok_or_else(|| {
            ExecutionError::InvalidIntent(format!("{} has no counter asset", intent.id))
        })?;

        let (asset_in, asset_out) = match intent.direction {
            Direction::Sell => (intent.asset.clone(), counter),
            Direction::Buy => (counter, intent.asset.clone()),
        };
        let network = &intent.source_network;

        debug!(
            intent_id = %intent.id,
            network = %network,
            pool_id = %pool.pool_id,
            fee_tier_ppm = pool.fee_tier_ppm,
            "Submitting swap"
        );

        let submitted = self
            .submitter
            .submit(
                network,
                TxPayload::Swap {
                    pool_id: pool.pool_id.clone(),
                    asset_in,
                    asset_out,
                    amount: intent.amount,
                    fee_tier_ppm: pool.fee_tier_ppm,
                },
            )
            .await?;

        let confirmation = self
            .submitter
            .confirm(network, &submitted.tx_hash, self.config.confirmation_timeout)
            .await?;

        info!(
            intent_id = %intent.id,
            network = %network,
            tx_hash = %submitted.tx_hash,
            height = confirmation.height,
            "Swap confirmed"
        );

        Ok(SwapResult {
            network: network.clone(),
            pool_id: pool.pool_id.clone(),
            direction: intent.direction,
            amount: intent.amount,
            tx_hash: submitted.tx_hash,
            sequence: submitted.sequence,
            height: confirmation.height,
        })
    }

    /// Execute a batch's residual as a single swap shaped like `template`.
    /// Returns `None` when the batch netted out completely.
    pub async fn execute_residual(
        &self,
        batch: &NettingBatch,
        template: &Intent,
        pool: &PoolDescriptor,
    ) -> Result<Option<SwapResult>, ExecutionError> {
        let amount = batch.residual_amount()?;
        if amount.is_zero() {
            info!(batch_id = %batch.id(), "Batch fully netted, nothing to submit");
            return Ok(None);
        }

        let mut residual = template.clone();
        residual.amount = amount;
        residual.direction = batch.residual_direction();

        info!(
            batch_id = %batch.id(),
            residual = %amount,
            direction = %residual.direction,
            efficiency = %batch.netting_efficiency(),
            "Executing netting residual"
        );
        self.execute_swap(&residual, pool).await.map(Some)
    }

    /// Same-network payments are a direct transfer. Cross-network payments
    /// burn on the source, wait for the attestation and mint on the
    /// destination, persisting progress after each step.
    pub async fn execute_payment(&self, intent: &Intent) -> Result<PaymentResult, ExecutionError> {
        if intent.kind != IntentKind::Payment {
            return Err(ExecutionError::InvalidIntent(format!(
                "{} is not a payment",
                intent.id
            )));
        }
        let recipient = intent.recipient.clone().ok_or_else(|| {
            ExecutionError::InvalidIntent(format!("{} has no recipient", intent.id))
        })?;

        let redeemed_claims = self.redeem_claims(intent).await;

        if !intent.is_cross_network() {
            let network = &intent.source_network;
            let submitted = self
                .submitter
                .submit(
                    network,
                    TxPayload::Transfer {
                        asset: intent.asset.clone(),
                        recipient,
                        amount: intent.amount,
                    },
                )
                .await?;
            self.submitter
                .confirm(network, &submitted.tx_hash, self.config.confirmation_timeout)
                .await?;

            info!(intent_id = %intent.id, network = %network, tx_hash = %submitted.tx_hash, "Transfer confirmed");
            return Ok(PaymentResult {
                network: network.clone(),
                tx_hash: Some(submitted.tx_hash),
                sequence: Some(submitted.sequence),
                amount: intent.amount,
                burn_tx_hash: None,
                redeemed_claims,
            });
        }

        let source = &intent.source_network;
        let dest = &intent.dest_network;

        let burn = self
            .submitter
            .submit(
                source,
                TxPayload::Burn {
                    asset: intent.asset.clone(),
                    amount: intent.amount,
                    dest_network: dest.clone(),
                    recipient,
                },
            )
            .await?;

        // Accepted burns are persisted before anything else can fail, so a
        // sweep can always pick the transfer up.
        let transfer = BridgeTransfer::burned(source.clone(), dest.clone(), burn.tx_hash.clone());
        self.record
            .record_bridge_transfer(&intent.id, transfer.clone())
            .await?;
        info!(intent_id = %intent.id, network = %source, burn_tx_hash = %burn.tx_hash, "Burn submitted");

        match self
            .submitter
            .confirm(source, &burn.tx_hash, self.config.confirmation_timeout)
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_transient() => {
                return Err(bridge_incomplete(&burn.tx_hash, "burn unconfirmed", e));
            }
            Err(e) => return Err(e.into()),
        }

        let started = Instant::now();
        let mut backoff = ExponentialBackoff::new(
            self.config.attestation_initial_backoff,
            self.config.attestation_max_backoff,
        );
        let (message, attestation) = poll_attestation(
            self.attestations.as_ref(),
            source,
            &burn.tx_hash,
            &mut backoff,
            self.config.attestation_timeout,
        )
        .await
        .map_err(|e| bridge_incomplete(&burn.tx_hash, "attestation unavailable", e))?;
        self.metrics.record_attestation_wait(started.elapsed());

        self.record
            .record_bridge_transfer(
                &intent.id,
                transfer.with_attestation(message.clone(), attestation.clone()),
            )
            .await?;

        let outcome = self.recovery.finalize(&message, &attestation, dest).await?;
        self.record
            .record_mint(&intent.id, outcome.tx_hash.clone())
            .await?;

        Ok(PaymentResult {
            network: dest.clone(),
            tx_hash: outcome.tx_hash,
            sequence: outcome.sequence,
            amount: intent.amount,
            burn_tx_hash: Some(burn.tx_hash),
            redeemed_claims,
        })
    }

    /// Redeem outstanding claims for the payment's asset. Failures are
    /// logged and never abort the payment.
    async fn redeem_claims(&self, intent: &Intent) -> Vec<String> {
        let network = &intent.source_network;
        let account = self.submitter.account_for(network);

        let claims = match self
            .submitter
            .chain()
            .redeemable_claims(network, account, &intent.asset)
            .await
        {
            Ok(claims) => claims,
            Err(e) => {
                warn!(intent_id = %intent.id, network = %network, error = %e, "Could not list redeemable claims");
                return Vec::new();
            }
        };

        let mut redeemed = Vec::new();
        for claim in claims {
            let payload = TxPayload::RedeemClaim {
                claim_id: claim.claim_id.clone(),
            };
            match self.submitter.submit(network, payload).await {
                Ok(submitted) => {
                    info!(
                        intent_id = %intent.id,
                        network = %network,
                        claim_id = %claim.claim_id,
                        tx_hash = %submitted.tx_hash,
                        "Claim redeemed"
                    );
                    redeemed.push(claim.claim_id);
                }
                Err(e) => {
                    warn!(
                        intent_id = %intent.id,
                        network = %network,
                        claim_id = %claim.claim_id,
                        error = %e,
                        "Claim redemption failed"
                    );
                }
            }
        }
        redeemed
    }
}

fn bridge_incomplete(burn_tx_hash: &str, stage: &str, error: ChainError) -> ExecutionError {
    warn!(burn_tx_hash = %burn_tx_hash, stage = stage, error = %error, "Bridge transfer left for recovery");
    ExecutionError::BridgeIncomplete {
        burn_tx_hash: burn_tx_hash.to_string(),
        reason: format!("{stage}: {error}"),
    }
}

/// Execution errors
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("slippage exceeded: {0}")]
    SlippageExceeded(String),

    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("stale sequence after retry: expected {expected}, got {got}")]
    StaleSequence { expected: u64, got: u64 },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    /// The burn was accepted but the transfer could not be carried further.
    #[error("bridge transfer after burn {burn_tx_hash} incomplete: {reason}")]
    BridgeIncomplete { burn_tx_hash: TxHash, reason: String },

    #[error(transparent)]
    Netting(#[from] NettingError),

    #[error(transparent)]
    Finalize(#[from] FinalizeError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl ExecutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutionError::InsufficientLiquidity(_) | ExecutionError::SlippageExceeded(_) => {
                ErrorKind::Liquidity
            }
            ExecutionError::SubmissionRejected(_)
            | ExecutionError::InvalidIntent(_)
            | ExecutionError::Netting(_) => ErrorKind::Validation,
            ExecutionError::StaleSequence { .. } | ExecutionError::Lock(_) => {
                ErrorKind::Concurrency
            }
            ExecutionError::Timeout(_)
            | ExecutionError::Network(_)
            | ExecutionError::BridgeIncomplete { .. } => ErrorKind::Network,
            ExecutionError::Finalize(e) => e.kind(),
            ExecutionError::Record(e) => e.kind(),
        }
    }

    /// The burn is persisted on the intent and a sweep can still complete
    /// the payment.
    pub fn is_pending_finalization(&self) -> bool {
        match self {
            ExecutionError::BridgeIncomplete { .. } => true,
            ExecutionError::Finalize(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

impl From<ChainError> for ExecutionError {
    fn from(error: ChainError) -> Self {
        match error {
            ChainError::StaleSequence { expected, got } => {
                ExecutionError::StaleSequence { expected, got }
            }
            ChainError::InsufficientLiquidity(m) => ExecutionError::InsufficientLiquidity(m),
            ChainError::SlippageExceeded(m) => ExecutionError::SlippageExceeded(m),
            ChainError::Rejected(m) | ChainError::Reverted(m) => {
                ExecutionError::SubmissionRejected(m)
            }
            ChainError::AlreadyProcessed { tx_hash } => ExecutionError::SubmissionRejected(
                format!("already processed ({})", tx_hash.unwrap_or_default()),
            ),
            ChainError::Timeout(m) => ExecutionError::Timeout(m),
            ChainError::Rpc(m) | ChainError::ConnectionFailed(m) => ExecutionError::Network(m),
        }
    }
}

impl From<SubmitError> for ExecutionError {
    fn from(error: SubmitError) -> Self {
        match error {
            SubmitError::Lock(e) => ExecutionError::Lock(e),
            SubmitError::Chain(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intent_settle_relayer::{
        MockAttestationService, MockChainClient, RedeemableClaim, SubmitFault,
    };
    use intent_settle_settlement::InMemoryStore;
    use intent_settle_types::{IntentId, IntentStatus, NewIntent, TradingPair};

    const RECIPIENT: &str = "0x00000000000000000000000000000000000000aa";

    fn pool() -> PoolDescriptor {
        PoolDescriptor {
            pool_id: "weth-usdc".to_string(),
            pair: TradingPair::new("WETH", "USDC"),
            fee_tier_ppm: 500,
        }
    }

    fn config() -> ExecutionConfig {
        ExecutionConfig {
            accounts: Accounts::new("engine"),
            lock_timeout: Duration::from_secs(5),
            submit_timeout: Duration::from_secs(1),
            confirmation_timeout: Duration::from_millis(100),
            attestation_timeout: Duration::from_secs(2),
            attestation_initial_backoff: Duration::from_millis(1),
            attestation_max_backoff: Duration::from_millis(5),
        }
    }

    fn recovery_config() -> RecoveryConfig {
        RecoveryConfig {
            max_retries: 3,
            backoff_step: Duration::from_millis(1),
            backoff_max: Duration::from_millis(3),
            confirmation_timeout: Duration::from_millis(100),
        }
    }

    fn coordinator(chain: Arc<MockChainClient>) -> (ExecutionCoordinator, Arc<IntentRecord>) {
        let record = Arc::new(IntentRecord::new(Arc::new(InMemoryStore::new())));
        let attestations = Arc::new(MockAttestationService::new(chain.clone()).with_pending_polls(2));
        let coordinator = ExecutionCoordinator::new(
            chain,
            attestations,
            record.clone(),
            config(),
            recovery_config(),
            MetricsCollector::new(),
        );
        (coordinator, record)
    }

    fn swap(id: &str, amount: u128) -> Intent {
        Intent::from_request(
            IntentId::from(id),
            NewIntent::swap("base", Direction::Sell, "WETH", "USDC", Uint256::from(amount)),
            0,
        )
    }

    async fn stored_payment(record: &IntentRecord, dest: &str) -> Intent {
        let id = record
            .create(NewIntent::payment("base", dest, "USDC", RECIPIENT, Uint256::from(25u128)))
            .await
            .unwrap();
        for status in [
            IntentStatus::Analyzing,
            IntentStatus::ReadyForReview,
            IntentStatus::Executing,
        ] {
            record.transition(&id, status, "step").await.unwrap();
        }
        record.get(&id).await.unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_swaps_use_contiguous_sequences() {
        let chain = Arc::new(MockChainClient::new().with_latency(Duration::from_millis(2)));
        let (coordinator, _) = coordinator(chain.clone());
        let coordinator = Arc::new(coordinator);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    coordinator
                        .execute_swap(&swap(&format!("s{i}"), 10 + i), &pool())
                        .await
                })
            })
            .collect();

        let mut sequences = Vec::new();
        for handle in handles {
            sequences.push(handle.await.unwrap().unwrap().sequence);
        }
        sequences.sort_unstable();
        assert_eq!(sequences, (0..8).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_swap_liquidity_error() {
        let chain = Arc::new(MockChainClient::new());
        chain.set_pool_liquidity("weth-usdc", Uint256::from(5u128)).await;
        let (coordinator, _) = coordinator(chain);

        let err = coordinator
            .execute_swap(&swap("s", 10), &pool())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::InsufficientLiquidity(_)));
        assert_eq!(err.kind(), ErrorKind::Liquidity);
    }

    #[tokio::test]
    async fn test_buy_swaps_counter_asset_in() {
        let chain = Arc::new(MockChainClient::new());
        let (coordinator, _) = coordinator(chain.clone());
        let mut intent = swap("b", 10);
        intent.direction = Direction::Buy;

        coordinator.execute_swap(&intent, &pool()).await.unwrap();
        match &chain.submissions().await[0].payload {
            TxPayload::Swap { asset_in, asset_out, .. } => {
                assert_eq!(asset_in, "USDC");
                assert_eq!(asset_out, "WETH");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unconfirmed_swap_times_out() {
        let chain = Arc::new(MockChainClient::new());
        chain.set_stalled("base", true).await;
        let (coordinator, _) = coordinator(chain);

        let err = coordinator
            .execute_swap(&swap("s", 10), &pool())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout(_)));
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_same_network_payment_is_a_transfer() {
        let chain = Arc::new(MockChainClient::new());
        let (coordinator, record) = coordinator(chain.clone());
        let intent = stored_payment(&record, "base").await;

        let result = coordinator.execute_payment(&intent).await.unwrap();
        assert!(result.burn_tx_hash.is_none());
        assert_eq!(result.network.as_str(), "base");

        let submissions = chain.submissions().await;
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].payload.label(), "transfer");
    }

    #[tokio::test]
    async fn test_cross_network_payment_persists_progress() {
        let chain = Arc::new(MockChainClient::new());
        let (coordinator, record) = coordinator(chain.clone());
        let intent = stored_payment(&record, "arbitrum").await;

        let result = coordinator.execute_payment(&intent).await.unwrap();
        assert_eq!(result.network.as_str(), "arbitrum");
        assert!(result.burn_tx_hash.is_some());
        assert!(result.tx_hash.is_some());

        let transfer = record.get(&intent.id).await.unwrap().bridge_transfer.unwrap();
        assert_eq!(Some(transfer.burn_tx_hash), result.burn_tx_hash);
        assert!(transfer.attestation.is_some());
        assert!(transfer.finalized);
        assert_eq!(transfer.mint_tx_hash, result.tx_hash);
        assert_eq!(chain.mint_count().await, 1);
    }

    #[tokio::test]
    async fn test_unconfirmed_burn_is_persisted_and_pending() {
        let chain = Arc::new(MockChainClient::new());
        chain.set_stalled("base", true).await;
        let (coordinator, record) = coordinator(chain.clone());
        let intent = stored_payment(&record, "arbitrum").await;

        let err = coordinator.execute_payment(&intent).await.unwrap_err();
        assert!(matches!(err, ExecutionError::BridgeIncomplete { .. }));
        assert!(err.is_pending_finalization());
        assert_eq!(err.kind(), ErrorKind::Network);

        let transfer = record.get(&intent.id).await.unwrap().bridge_transfer.unwrap();
        let burn = &chain.submissions_on(&NetworkId::from("base")).await[0];
        assert_eq!(burn.payload.label(), "burn");
        assert!(chain.burn_message(&transfer.burn_tx_hash).await.is_some());
        assert!(transfer.attestation.is_none());
        assert!(!transfer.finalized);
    }

    #[tokio::test]
    async fn test_rejected_burn_is_not_pending() {
        let chain = Arc::new(MockChainClient::new());
        chain
            .inject_fault("base", SubmitFault::Error(ChainError::Rejected("paused".into())))
            .await;
        let (coordinator, record) = coordinator(chain);
        let intent = stored_payment(&record, "arbitrum").await;

        let err = coordinator.execute_payment(&intent).await.unwrap_err();
        assert!(!err.is_pending_finalization());
        assert!(record.get(&intent.id).await.unwrap().bridge_transfer.is_none());
    }

    #[tokio::test]
    async fn test_claim_redemption_is_best_effort() {
        let chain = Arc::new(MockChainClient::new());
        let claim = |id: &str| RedeemableClaim {
            claim_id: id.to_string(),
            asset: "USDC".to_string(),
            amount: Uint256::from(3u128),
        };
        chain.add_claim("base", "engine", claim("c-1")).await;
        chain.add_claim("base", "engine", claim("c-2")).await;
        chain
            .inject_fault("base", SubmitFault::Error(ChainError::Rejected("claim locked".into())))
            .await;

        let (coordinator, record) = coordinator(chain.clone());
        let intent = stored_payment(&record, "base").await;

        let result = coordinator.execute_payment(&intent).await.unwrap();
        assert_eq!(result.redeemed_claims, vec!["c-2".to_string()]);
        assert!(result.tx_hash.is_some());
    }

    #[tokio::test]
    async fn test_residual_of_netted_batch_is_not_submitted() {
        let chain = Arc::new(MockChainClient::new());
        let (coordinator, _) = coordinator(chain.clone());
        let a = swap("a", 50);
        let mut b = swap("b", 50);
        b.direction = Direction::Buy;
        let batch = intent_settle_netting::compute_netting_for_intents(&[a.clone(), b]);

        let result = coordinator.execute_residual(&batch, &a, &pool()).await.unwrap();
        assert!(result.is_none());
        assert!(chain.submissions().await.is_empty());
    }

    #[test]
    fn test_error_kinds() {
        let cases = [
            (ChainError::SlippageExceeded("x".into()), ErrorKind::Liquidity),
            (ChainError::Rejected("x".into()), ErrorKind::Validation),
            (ChainError::Reverted("x".into()), ErrorKind::Validation),
            (ChainError::StaleSequence { expected: 1, got: 0 }, ErrorKind::Concurrency),
            (ChainError::Rpc("x".into()), ErrorKind::Network),
        ];
        for (chain_error, kind) in cases {
            assert_eq!(ExecutionError::from(chain_error).kind(), kind);
        }
    }
}
