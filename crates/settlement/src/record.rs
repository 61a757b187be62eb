use intent_settle_types::{
    now_millis, BridgeTransfer, ExecutionReceipt, Intent, IntentFailure, IntentId, IntentStatus,
    NewIntent, TimelineEntry,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::{IntentStore, RecordError};

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The intent had not started executing and is now `Failed`.
    Cancelled,
    /// The intent is executing; a later failure will be reported as cancelled.
    Queued,
}

/// Sole writer of intent state.
///
/// Every status change goes through here so that the lifecycle graph is
/// enforced in one place. Writes to the same intent are serialised with a
/// per-intent async mutex; reads go straight to the store and return a
/// snapshot.
pub struct IntentRecord {
    store: Arc<dyn IntentStore>,
    entry_locks: Mutex<HashMap<IntentId, Arc<tokio::sync::Mutex<()>>>>,
}

impl IntentRecord {
    pub fn new(store: Arc<dyn IntentStore>) -> Self {
        Self {
            store,
            entry_locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn create(&self, request: NewIntent) -> Result<IntentId, RecordError> {
        let id = IntentId::generate();
        let intent = Intent::from_request(id.clone(), request, now_millis());
        self.store.insert(&intent).await?;

        info!(
            intent_id = %id,
            kind = ?intent.kind,
            source_network = %intent.source_network,
            dest_network = %intent.dest_network,
            "Intent created"
        );
        Ok(id)
    }

    pub async fn get(&self, id: &IntentId) -> Result<Intent, RecordError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| RecordError::NotFound(id.clone()))
    }

    pub async fn list(&self, limit: usize) -> Result<Vec<Intent>, RecordError> {
        Ok(self.store.list(limit).await?)
    }

    pub async fn list_by_status(
        &self,
        status: IntentStatus,
        limit: usize,
    ) -> Result<Vec<Intent>, RecordError> {
        Ok(self.store.list_by_status(status, limit).await?)
    }

    /// Executing intents with a persisted bridge transfer not yet minted,
    /// attested or not.
    pub async fn pending_bridge_finalizations(&self) -> Result<Vec<Intent>, RecordError> {
        Ok(self
            .store
            .list_by_status(IntentStatus::Executing, usize::MAX)
            .await?
            .into_iter()
            .filter(|i| i.bridge_transfer.as_ref().is_some_and(|t| !t.finalized))
            .collect())
    }

    /// Move along a non-terminal edge. Terminal states are entered through
    /// [`attach_result`](Self::attach_result), [`attach_error`](Self::attach_error),
    /// [`reject`](Self::reject) and [`cancel`](Self::cancel).
    pub async fn transition(
        &self,
        id: &IntentId,
        next: IntentStatus,
        message: impl Into<String>,
    ) -> Result<Intent, RecordError> {
        let message = message.into();
        self.mutate(id, |intent| {
            let from = intent.status;
            if next.is_terminal() || !from.can_transition_to(next) {
                return Err(RecordError::InvalidTransition {
                    id: intent.id.clone(),
                    from,
                    to: next,
                });
            }
            enter(intent, next, message);
            Ok(())
        })
        .await
    }

    /// `Executing -> Completed`.
    pub async fn attach_result(
        &self,
        id: &IntentId,
        receipt: ExecutionReceipt,
    ) -> Result<Intent, RecordError> {
        self.mutate(id, |intent| {
            ensure_no_outcome(intent)?;
            ensure_status(intent, IntentStatus::Executing, IntentStatus::Completed)?;

            let message = match &receipt.tx_hash {
                Some(hash) => format!("executed in {hash}"),
                None => "settled by netting".to_string(),
            };
            intent.result = Some(receipt);
            enter(intent, IntentStatus::Completed, message);
            Ok(())
        })
        .await
    }

    /// `Executing -> Failed`. A queued cancellation turns the failure into
    /// a cancellation.
    pub async fn attach_error(
        &self,
        id: &IntentId,
        failure: IntentFailure,
    ) -> Result<Intent, RecordError> {
        self.mutate(id, |intent| {
            ensure_no_outcome(intent)?;
            ensure_status(intent, IntentStatus::Executing, IntentStatus::Failed)?;

            let failure = if intent.cancel_requested {
                IntentFailure::cancelled()
            } else {
                failure
            };
            let message = failure.to_string();
            intent.error = Some(failure);
            enter(intent, IntentStatus::Failed, message);
            Ok(())
        })
        .await
    }

    /// `Analyzing -> Failed`.
    pub async fn reject(
        &self,
        id: &IntentId,
        failure: IntentFailure,
    ) -> Result<Intent, RecordError> {
        self.mutate(id, |intent| {
            ensure_no_outcome(intent)?;
            ensure_status(intent, IntentStatus::Analyzing, IntentStatus::Failed)?;

            let message = failure.to_string();
            intent.error = Some(failure);
            enter(intent, IntentStatus::Failed, message);
            Ok(())
        })
        .await
    }

    pub async fn cancel(&self, id: &IntentId) -> Result<CancelOutcome, RecordError> {
        let mut outcome = CancelOutcome::Cancelled;
        self.mutate(id, |intent| {
            if intent.status.is_cancellable() {
                intent.error = Some(IntentFailure::cancelled());
                enter(intent, IntentStatus::Failed, "cancelled by request".to_string());
                outcome = CancelOutcome::Cancelled;
                Ok(())
            } else if intent.status == IntentStatus::Executing {
                intent.cancel_requested = true;
                intent.updated_at = next_timestamp(intent);
                outcome = CancelOutcome::Queued;
                Ok(())
            } else {
                Err(RecordError::InvalidTransition {
                    id: intent.id.clone(),
                    from: intent.status,
                    to: IntentStatus::Failed,
                })
            }
        })
        .await?;

        info!(intent_id = %id, outcome = ?outcome, "Cancellation handled");
        Ok(outcome)
    }

    /// Persist bridge progress. Replaces any earlier snapshot.
    pub async fn record_bridge_transfer(
        &self,
        id: &IntentId,
        transfer: BridgeTransfer,
    ) -> Result<Intent, RecordError> {
        self.mutate(id, |intent| {
            debug!(
                intent_id = %intent.id,
                burn_tx_hash = %transfer.burn_tx_hash,
                attested = transfer.attestation.is_some(),
                "Bridge transfer recorded"
            );
            intent.bridge_transfer = Some(transfer);
            intent.updated_at = next_timestamp(intent);
            Ok(())
        })
        .await
    }

    /// Mark the bridge transfer finalized. The first recorded mint hash wins.
    pub async fn record_mint(
        &self,
        id: &IntentId,
        mint_tx_hash: Option<String>,
    ) -> Result<Intent, RecordError> {
        self.mutate(id, |intent| {
            let updated_at = next_timestamp(intent);
            let transfer = intent.bridge_transfer.as_mut().ok_or_else(|| {
                violation(format!("mint recorded for {} without a bridge transfer", intent.id))
            })?;

            match (&transfer.mint_tx_hash, mint_tx_hash) {
                (Some(existing), Some(ignored)) if *existing != ignored => {
                    warn!(
                        intent_id = %intent.id,
                        existing = %existing,
                        ignored = %ignored,
                        "Mint already recorded"
                    );
                }
                (None, Some(hash)) => transfer.mint_tx_hash = Some(hash),
                _ => {}
            }
            transfer.finalized = true;
            intent.updated_at = updated_at;
            Ok(())
        })
        .await
    }

    /// Append a progress note under the current stage. Only non-terminal
    /// intents accept notes; the status is unchanged.
    pub async fn annotate(
        &self,
        id: &IntentId,
        message: impl Into<String>,
    ) -> Result<Intent, RecordError> {
        let message = message.into();
        self.mutate(id, |intent| {
            if intent.status.is_terminal() {
                return Err(RecordError::InvalidTransition {
                    id: intent.id.clone(),
                    from: intent.status,
                    to: intent.status,
                });
            }
            let timestamp = next_timestamp(intent);
            intent.timeline.push(TimelineEntry {
                stage: intent.status,
                message,
                timestamp_millis: timestamp,
            });
            intent.updated_at = timestamp;
            Ok(())
        })
        .await
    }

    async fn mutate<F>(&self, id: &IntentId, apply: F) -> Result<Intent, RecordError>
    where
        F: FnOnce(&mut Intent) -> Result<(), RecordError>,
    {
        let lock = self.entry_lock(id)?;
        let guard = lock.lock().await;

        let (result, settled) = match self.get(id).await {
            Ok(mut intent) => {
                let was_terminal = intent.status.is_terminal();
                match apply(&mut intent) {
                    Ok(()) => match self.store.update(&intent).await {
                        // Nothing but reads follow a terminal state.
                        Ok(()) => {
                            let settled = intent.status.is_terminal();
                            (Ok(intent), settled)
                        }
                        Err(e) => (Err(RecordError::from(e)), was_terminal),
                    },
                    Err(e) => (Err(e), was_terminal),
                }
            }
            // Unknown ids never get a writer.
            Err(e) => (Err(e), true),
        };

        drop(guard);
        if settled {
            self.release_entry_lock(id, lock);
        }
        result
    }

    fn entry_lock(&self, id: &IntentId) -> Result<Arc<tokio::sync::Mutex<()>>, RecordError> {
        let mut locks = self
            .entry_locks
            .lock()
            .map_err(|e| violation(format!("entry lock table poisoned: {e}")))?;
        Ok(locks.entry(id.clone()).or_default().clone())
    }

    /// Drop the entry unless another writer already holds a handle to it.
    fn release_entry_lock(&self, id: &IntentId, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.entry_locks.lock().unwrap_or_else(|e| e.into_inner());
        // One handle in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(id);
        }
    }
}

fn violation(message: String) -> RecordError {
    error!(error = %message, error_kind = "invariant_violation", "Intent invariant violated");
    RecordError::InvariantViolation(message)
}

fn ensure_no_outcome(intent: &Intent) -> Result<(), RecordError> {
    if intent.result.is_some() || intent.error.is_some() {
        return Err(violation(format!(
            "outcome already attached to {} in {}",
            intent.id, intent.status
        )));
    }
    Ok(())
}

fn ensure_status(
    intent: &Intent,
    expected: IntentStatus,
    next: IntentStatus,
) -> Result<(), RecordError> {
    if intent.status != expected {
        return Err(RecordError::InvalidTransition {
            id: intent.id.clone(),
            from: intent.status,
            to: next,
        });
    }
    Ok(())
}

/// Never earlier than the last timeline entry, even if the clock steps back.
fn next_timestamp(intent: &Intent) -> u64 {
    now_millis()
        .max(intent.last_timeline_timestamp())
        .max(intent.updated_at)
}

fn enter(intent: &mut Intent, next: IntentStatus, message: String) {
    let timestamp = next_timestamp(intent);
    info!(
        intent_id = %intent.id,
        from = %intent.status,
        to = %next,
        "Intent transitioned"
    );
    intent.status = next;
    intent.timeline.push(TimelineEntry {
        stage: next,
        message,
        timestamp_millis: timestamp,
    });
    intent.updated_at = timestamp;
}
