use intent_settle_metrics::{intent_span, MetricsCollector};
use intent_settle_netting::{
    commit, CommittedLeg, NettingBatch, NettingError, NettingRound, Reveal, RoundOutcome,
};
use intent_settle_relayer::{AttestationService, ChainClient};
use intent_settle_settlement::{CancelOutcome, IntentRecord, IntentStore, RecordError};
use intent_settle_types::{
    ErrorKind, ExecutionReceipt, Intent, IntentFailure, IntentId, IntentKind, IntentStatus,
    NetworkId, NewIntent,
};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::collaborators::{
    ClassifierError, IntentClassifier, KeywordClassifier, PoolDescriptor, PoolDiscovery,
    StaticPoolDiscovery,
};
use crate::executor::{ExecutionConfig, ExecutionCoordinator, ExecutionError, SwapResult};
use crate::recovery::{RecoveryConfig, SweepReport};
use crate::validator::{IntentValidator, ValidationError};

/// Configuration for the orchestrator
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub execution: ExecutionConfig,
    pub recovery: RecoveryConfig,

    /// Maximum intents per netting round
    pub max_batch_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionConfig::default(),
            recovery: RecoveryConfig::default(),
            max_batch_size: 100,
        }
    }
}

/// Builder error
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("missing required field: {field}")]
    MissingField { field: String },
}

/// Builder for IntentOrchestrator
#[derive(Default)]
pub struct IntentOrchestratorBuilder {
    chain: Option<Arc<dyn ChainClient>>,
    attestations: Option<Arc<dyn AttestationService>>,
    store: Option<Arc<dyn IntentStore>>,
    classifier: Option<Arc<dyn IntentClassifier>>,
    pools: Option<Arc<dyn PoolDiscovery>>,
    validator: Option<IntentValidator>,
    config: OrchestratorConfig,
    metrics: MetricsCollector,
}

impl IntentOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_attestations(mut self, attestations: Arc<dyn AttestationService>) -> Self {
        self.attestations = Some(attestations);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn IntentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_pool_discovery(mut self, pools: Arc<dyn PoolDiscovery>) -> Self {
        self.pools = Some(pools);
        self
    }

    pub fn with_validator(mut self, validator: IntentValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    /// Build the IntentOrchestrator, validating that all required fields are set
    pub fn build(self) -> Result<IntentOrchestrator, BuilderError> {
        let chain = self.chain.ok_or_else(|| missing("chain"))?;
        let attestations = self.attestations.ok_or_else(|| missing("attestations"))?;
        let store = self.store.ok_or_else(|| missing("store"))?;

        let record = Arc::new(IntentRecord::new(store));
        let coordinator = ExecutionCoordinator::new(
            chain,
            attestations,
            record.clone(),
            self.config.execution.clone(),
            self.config.recovery.clone(),
            self.metrics,
        );

        Ok(IntentOrchestrator {
            record,
            coordinator,
            validator: self.validator.unwrap_or_default(),
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(KeywordClassifier::default())),
            pools: self
                .pools
                .unwrap_or_else(|| Arc::new(StaticPoolDiscovery::new())),
            config: self.config,
            metrics: self.metrics,
            in_flight: Mutex::new(HashSet::new()),
        })
    }
}

fn missing(field: &str) -> BuilderError {
    BuilderError::MissingField {
        field: field.to_string(),
    }
}

/// Outcome of one netting round.
#[derive(Debug, Clone, Serialize)]
pub struct NettingReport {
    pub batch: NettingBatch,
    pub sell_commitment: String,
    pub buy_commitment: String,
    /// Residual swap; `None` when the batch netted out or execution failed.
    pub swap: Option<SwapResult>,
    pub intents: Vec<Intent>,
}

/// Main orchestrator: intent intake, analysis, execution and netting.
pub struct IntentOrchestrator {
    record: Arc<IntentRecord>,
    coordinator: ExecutionCoordinator,
    validator: IntentValidator,
    classifier: Arc<dyn IntentClassifier>,
    pools: Arc<dyn PoolDiscovery>,
    config: OrchestratorConfig,
    metrics: MetricsCollector,
    /// Intents whose execution is running in this process.
    in_flight: Mutex<HashSet<IntentId>>,
}

impl IntentOrchestrator {
    pub fn builder() -> IntentOrchestratorBuilder {
        IntentOrchestratorBuilder::new()
    }

    /// Create an intent and analyse it up to `ReadyForReview`.
    ///
    /// Malformed requests are refused before anything is stored. Requests
    /// that fail analysis are stored and end in `Failed`.
    pub async fn submit_intent(&self, request: NewIntent) -> Result<Intent, OrchestratorError> {
        self.validator.validate_request(&request)?;

        let id = self.record.create(request).await?;
        self.metrics.record_intent_created();

        self.analyze(&id)
            .instrument(intent_span(id.as_str(), "analyze"))
            .await
    }

    /// Classify free text and submit every intent found. Text with no
    /// recognisable intent yields an empty list.
    pub async fn submit_text(
        &self,
        text: &str,
        network_hint: &NetworkId,
    ) -> Result<Vec<Intent>, OrchestratorError> {
        let parsed = self.classifier.parse(text, network_hint).await?;
        if parsed.is_empty() {
            info!(network = %network_hint, "No intents recognised");
            return Ok(Vec::new());
        }

        let mut intents = Vec::with_capacity(parsed.len());
        for request in parsed {
            intents.push(self.submit_intent(request).await?);
        }
        Ok(intents)
    }

    async fn analyze(&self, id: &IntentId) -> Result<Intent, OrchestratorError> {
        let intent = match self
            .record
            .transition(id, IntentStatus::Analyzing, "analyzing intent")
            .await
        {
            Ok(intent) => intent,
            Err(e) => return self.current_if_settled(id, e).await,
        };
        self.metrics.record_intent_status(IntentStatus::Analyzing);

        let plan = match self.validator.validate_networks(&intent) {
            Ok(()) => self.plan(&intent).await,
            Err(e) => Err(ExecutionError::InvalidIntent(e.to_string())),
        };
        let plan = match plan {
            Ok(plan) => plan,
            Err(e) => {
                warn!(intent_id = %id, error = %e, "Intent rejected during analysis");
                let failure = IntentFailure::new(ErrorKind::Validation, e.to_string());
                return match self.record.reject(id, failure).await {
                    Ok(rejected) => {
                        self.metrics.record_intent_failed(ErrorKind::Validation);
                        Ok(rejected)
                    }
                    Err(e) => self.current_if_settled(id, e).await,
                };
            }
        };

        match self
            .record
            .transition(id, IntentStatus::ReadyForReview, plan)
            .await
        {
            Ok(ready) => {
                self.metrics.record_intent_status(IntentStatus::ReadyForReview);
                Ok(ready)
            }
            Err(e) => self.current_if_settled(id, e).await,
        }
    }

    /// Human-readable execution plan, recorded on the timeline.
    async fn plan(&self, intent: &Intent) -> Result<String, ExecutionError> {
        Ok(match intent.kind {
            IntentKind::Swap => {
                let pool = self.resolve_pool(intent).await?;
                format!(
                    "swap via pool {} at {} ppm",
                    pool.pool_id, pool.fee_tier_ppm
                )
            }
            IntentKind::Payment if intent.is_cross_network() => format!(
                "bridge {} -> {}",
                intent.source_network, intent.dest_network
            ),
            IntentKind::Payment => format!("transfer on {}", intent.source_network),
        })
    }

    async fn resolve_pool(&self, intent: &Intent) -> Result<PoolDescriptor, ExecutionError> {
        let pair = intent.pair().ok_or_else(|| {
            ExecutionError::InvalidIntent(format!("{} has no counter asset", intent.id))
        })?;

        match self
            .pools
            .find_pool(&pair.base, &pair.quote, &intent.source_network)
            .await
        {
            Some(pool) => Ok(pool),
            None => {
                debug!(
                    intent_id = %intent.id,
                    network = %intent.source_network,
                    "No pool discovered, using default fee tier"
                );
                Ok(PoolDescriptor::fallback(&intent.source_network, &pair))
            }
        }
    }

    /// Execute a `ReadyForReview` intent and record its outcome.
    ///
    /// Execution failures are recorded on the intent, not returned. A
    /// cross-network payment whose mint could not be confirmed stays
    /// `Executing` until [`recover_pending_bridges`](Self::recover_pending_bridges)
    /// completes it.
    pub async fn confirm_intent(&self, id: &IntentId) -> Result<Intent, OrchestratorError> {
        self.execute(id)
            .instrument(intent_span(id.as_str(), "confirm"))
            .await
    }

    async fn execute(&self, id: &IntentId) -> Result<Intent, OrchestratorError> {
        let intent = self
            .record
            .transition(id, IntentStatus::Executing, "execution started")
            .await?;
        let _in_flight = self.track(std::slice::from_ref(id));
        self.metrics.record_intent_status(IntentStatus::Executing);

        let started = Instant::now();
        let outcome = match intent.kind {
            IntentKind::Swap => match self.resolve_pool(&intent).await {
                Ok(pool) => self
                    .coordinator
                    .execute_swap(&intent, &pool)
                    .await
                    .map(|swap| swap.receipt()),
                Err(e) => Err(e),
            },
            IntentKind::Payment => self
                .coordinator
                .execute_payment(&intent)
                .await
                .map(|payment| payment.receipt()),
        };
        self.metrics
            .record_execution(kind_label(intent.kind), started.elapsed());

        self.settle(id, outcome).await
    }

    pub async fn get_intent_status(&self, id: &IntentId) -> Result<Intent, OrchestratorError> {
        Ok(self.record.get(id).await?)
    }

    /// Oldest first.
    pub async fn list_intents(
        &self,
        status: Option<IntentStatus>,
        limit: usize,
    ) -> Result<Vec<Intent>, OrchestratorError> {
        Ok(match status {
            Some(status) => self.record.list_by_status(status, limit).await?,
            None => self.record.list(limit).await?,
        })
    }

    pub async fn cancel_intent(&self, id: &IntentId) -> Result<CancelOutcome, OrchestratorError> {
        let outcome = self.record.cancel(id).await?;
        if outcome == CancelOutcome::Cancelled {
            self.metrics.record_intent_failed(ErrorKind::Cancelled);
        }
        Ok(outcome)
    }

    /// Net a batch of `ReadyForReview` swaps on one market and execute
    /// only the residual.
    ///
    /// Members go through a commit-reveal round, so amounts are only
    /// disclosed once every commitment is in. All members share the
    /// outcome: the residual swap's receipt, a netted receipt when nothing
    /// was submitted, or the execution error.
    pub async fn run_netting_round(
        &self,
        ids: &[IntentId],
    ) -> Result<NettingReport, OrchestratorError> {
        let intents = self.load_batch(ids).await?;

        let round = commit_reveal(&intents)?;
        let batch = &round.batch;
        self.metrics.record_netting_round(
            intents.len(),
            batch.netting_efficiency().to_f64().unwrap_or_default(),
        );
        info!(
            batch_id = %batch.id(),
            size = intents.len(),
            sell_commitment = %round.sell_commitment.to_hex(),
            buy_commitment = %round.buy_commitment.to_hex(),
            efficiency = %batch.netting_efficiency(),
            residual_direction = %batch.residual_direction(),
            "Netting round closed"
        );

        let span = info_span!("netting_round", batch_id = %batch.id());
        self.execute_batch(round, intents, ids)
            .instrument(span)
            .await
    }

    async fn execute_batch(
        &self,
        round: RoundOutcome,
        intents: Vec<Intent>,
        ids: &[IntentId],
    ) -> Result<NettingReport, OrchestratorError> {
        let batch = round.batch;
        let executing = self.start_batch(&batch, &intents).await?;
        let _in_flight = self.track(ids);

        let outcome = if batch.is_fully_netted() {
            Ok(None)
        } else {
            let template = &executing[0];
            match self.resolve_pool(template).await {
                Ok(pool) => {
                    self.coordinator
                        .execute_residual(&batch, template, &pool)
                        .await
                }
                Err(e) => Err(e),
            }
        };

        // Members settle independently: one failed write must not leave the
        // rest executing.
        let mut settled = Vec::with_capacity(executing.len());
        for intent in &executing {
            let result = match &outcome {
                Ok(Some(swap)) => {
                    self.settle(&intent.id, Ok(swap.receipt().with_batch(batch.id())))
                        .await
                }
                Ok(None) => {
                    let receipt = ExecutionReceipt::netted(intent.source_network.clone(), batch.id());
                    self.settle(&intent.id, Ok(receipt)).await
                }
                Err(e) => self.fail(&intent.id, e).await,
            };
            match result {
                Ok(intent) => settled.push(intent),
                Err(e) => {
                    error!(
                        batch_id = %batch.id(),
                        intent_id = %intent.id,
                        error = %e,
                        error_kind = e.kind().as_str(),
                        "Could not settle netting batch member"
                    );
                    if let Ok(current) = self.record.get(&intent.id).await {
                        settled.push(current);
                    }
                }
            }
        }
        let swap = outcome.ok().flatten();

        Ok(NettingReport {
            sell_commitment: round.sell_commitment.to_hex(),
            buy_commitment: round.buy_commitment.to_hex(),
            batch,
            swap,
            intents: settled,
        })
    }

    /// Finalize persisted bridge transfers not driven by a running
    /// execution.
    pub async fn recover_pending_bridges(&self) -> Result<SweepReport, OrchestratorError> {
        let in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        Ok(self.coordinator.recovery().sweep(&in_flight).await?)
    }

    async fn load_batch(&self, ids: &[IntentId]) -> Result<Vec<Intent>, OrchestratorError> {
        if ids.is_empty() {
            return Err(OrchestratorError::InvalidBatch("no intents".to_string()));
        }
        if ids.len() > self.config.max_batch_size {
            return Err(OrchestratorError::InvalidBatch(format!(
                "{} intents exceeds the limit of {}",
                ids.len(),
                self.config.max_batch_size
            )));
        }
        if ids.iter().collect::<BTreeSet<_>>().len() != ids.len() {
            return Err(OrchestratorError::InvalidBatch(
                "duplicate intent ids".to_string(),
            ));
        }

        let mut intents = Vec::with_capacity(ids.len());
        for id in ids {
            let intent = self.record.get(id).await?;
            if intent.kind != IntentKind::Swap {
                return Err(OrchestratorError::InvalidBatch(format!(
                    "{id} is not a swap"
                )));
            }
            if intent.status != IntentStatus::ReadyForReview {
                return Err(OrchestratorError::InvalidBatch(format!(
                    "{id} is {}, expected ready_for_review",
                    intent.status
                )));
            }
            if let Some(first) = intents.first() {
                if !same_market(first, &intent) {
                    return Err(OrchestratorError::InvalidBatch(format!(
                        "{id} trades a different market"
                    )));
                }
            }
            intents.push(intent);
        }
        Ok(intents)
    }

    /// Move every member to `Executing`. If one cannot move, the members
    /// already moved are failed and the round is abandoned.
    async fn start_batch(
        &self,
        batch: &NettingBatch,
        intents: &[Intent],
    ) -> Result<Vec<Intent>, OrchestratorError> {
        let mut executing = Vec::with_capacity(intents.len());
        for intent in intents {
            let message = format!("executing in netting batch {}", batch.id());
            match self
                .record
                .transition(&intent.id, IntentStatus::Executing, message)
                .await
            {
                Ok(moved) => {
                    self.metrics.record_intent_status(IntentStatus::Executing);
                    executing.push(moved);
                }
                Err(e) => {
                    warn!(
                        batch_id = %batch.id(),
                        intent_id = %intent.id,
                        error = %e,
                        "Netting batch member unavailable, abandoning round"
                    );
                    let failure = IntentFailure::new(
                        ErrorKind::Concurrency,
                        format!("netting batch {} abandoned: {} unavailable", batch.id(), intent.id),
                    );
                    for moved in &executing {
                        match self.record.attach_error(&moved.id, failure.clone()).await {
                            Ok(_) => self.metrics.record_intent_failed(ErrorKind::Concurrency),
                            Err(e) => error!(
                                intent_id = %moved.id,
                                error = %e,
                                error_kind = e.kind().as_str(),
                                "Could not fail abandoned batch member"
                            ),
                        }
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(executing)
    }

    async fn settle(
        &self,
        id: &IntentId,
        outcome: Result<ExecutionReceipt, ExecutionError>,
    ) -> Result<Intent, OrchestratorError> {
        match outcome {
            Ok(receipt) => {
                let intent = self.record.attach_result(id, receipt).await?;
                self.metrics.record_intent_status(IntentStatus::Completed);
                Ok(intent)
            }
            Err(e) if e.is_pending_finalization() => {
                warn!(intent_id = %id, error = %e, "Bridge mint pending, left for recovery");
                Ok(self
                    .record
                    .annotate(id, format!("awaiting bridge finalization: {e}"))
                    .await?)
            }
            Err(e) => self.fail(id, &e).await,
        }
    }

    async fn fail(&self, id: &IntentId, error: &ExecutionError) -> Result<Intent, OrchestratorError> {
        let kind = error.kind();
        if kind == ErrorKind::InvariantViolation {
            error!(intent_id = %id, error = %error, error_kind = kind.as_str(), "Execution failed");
        } else {
            warn!(intent_id = %id, error = %error, error_kind = kind.as_str(), "Execution failed");
        }

        let intent = self
            .record
            .attach_error(id, IntentFailure::new(kind, error.to_string()))
            .await?;
        // A queued cancellation replaces the kind.
        let recorded = intent.error.as_ref().map(|f| f.kind).unwrap_or(kind);
        self.metrics.record_intent_failed(recorded);
        Ok(intent)
    }

    /// A transition lost a race with a cancellation: report the settled
    /// state instead of the error.
    async fn current_if_settled(
        &self,
        id: &IntentId,
        error: RecordError,
    ) -> Result<Intent, OrchestratorError> {
        if matches!(error, RecordError::InvalidTransition { .. }) {
            let current = self.record.get(id).await?;
            if current.status.is_terminal() {
                debug!(intent_id = %id, status = %current.status, "Intent settled concurrently");
                return Ok(current);
            }
        }
        Err(error.into())
    }

    fn track(&self, ids: &[IntentId]) -> InFlight<'_> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.extend(ids.iter().cloned());
        InFlight {
            set: &self.in_flight,
            ids: ids.to_vec(),
        }
    }
}

struct InFlight<'a> {
    set: &'a Mutex<HashSet<IntentId>>,
    ids: Vec<IntentId>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        for id in &self.ids {
            set.remove(id);
        }
    }
}

fn commit_reveal(intents: &[Intent]) -> Result<RoundOutcome, NettingError> {
    let mut round = NettingRound::new();
    let mut reveals = Vec::with_capacity(intents.len());

    for intent in intents {
        let (commitment, randomness) = commit(intent.amount, None)?.into_parts();
        round.submit_commitment(CommittedLeg {
            intent_id: intent.id.clone(),
            direction: intent.direction,
            commitment,
        })?;
        reveals.push((
            intent.id.clone(),
            Reveal {
                amount: intent.amount,
                randomness,
            },
        ));
    }

    for (id, reveal) in reveals {
        round.reveal(&id, reveal)?;
    }
    round.finalize()
}

fn same_market(a: &Intent, b: &Intent) -> bool {
    a.source_network == b.source_network
        && a.asset == b.asset
        && a.counter_asset == b.counter_asset
}

fn kind_label(kind: IntentKind) -> &'static str {
    match kind {
        IntentKind::Swap => "swap",
        IntentKind::Payment => "payment",
    }
}

/// Orchestrator errors
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid netting batch: {0}")]
    InvalidBatch(String),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Netting(#[from] NettingError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::Validation(_)
            | OrchestratorError::InvalidBatch(_)
            | OrchestratorError::Netting(_) => ErrorKind::Validation,
            OrchestratorError::Record(e) => e.kind(),
            OrchestratorError::Classifier(_) => ErrorKind::Network,
        }
    }
}
