use std::time::Duration;

use intent_settle_types::{ErrorKind, IntentStatus};
use prometheus::{Encoder, TextEncoder};

use crate::metrics::*;

/// Outcome label for a bridge finalize attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeAttempt {
    Minted,
    AlreadyProcessed,
    Retrying,
    Failed,
}

impl FinalizeAttempt {
    fn as_str(self) -> &'static str {
        match self {
            FinalizeAttempt::Minted => "minted",
            FinalizeAttempt::AlreadyProcessed => "already_processed",
            FinalizeAttempt::Retrying => "retrying",
            FinalizeAttempt::Failed => "failed",
        }
    }
}

/// Metrics collector for the settlement engine.
///
/// Stateless handle over the process-wide registry; clone or share freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTENT METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_intent_created(&self) {
        INTENTS_CREATED.inc();
        ACTIVE_INTENTS.inc();
        INTENT_TRANSITIONS
            .with_label_values(&[IntentStatus::Created.as_str()])
            .inc();
    }

    /// Record an intent entering `status`.
    pub fn record_intent_status(&self, status: IntentStatus) {
        INTENT_TRANSITIONS.with_label_values(&[status.as_str()]).inc();
        if status.is_terminal() {
            ACTIVE_INTENTS.dec();
        }
    }

    /// Record an intent entering `Failed` with `kind`. Covers the status
    /// transition as well; do not also call `record_intent_status(Failed)`.
    pub fn record_intent_failed(&self, kind: ErrorKind) {
        INTENTS_FAILED.with_label_values(&[kind.as_str()]).inc();
        self.record_intent_status(IntentStatus::Failed);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // NETTING METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_netting_round(&self, batch_size: usize, efficiency: f64) {
        NETTING_ROUNDS.inc();
        NETTING_BATCH_SIZE.observe(batch_size as f64);
        NETTING_EFFICIENCY.observe(efficiency);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SUBMISSION METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_submission(&self, network: &str, kind: &str) {
        SUBMISSIONS.with_label_values(&[network, kind]).inc();
    }

    pub fn record_submission_failure(&self, network: &str, reason: &str) {
        SUBMISSION_FAILURES.with_label_values(&[network, reason]).inc();
    }

    pub fn record_stale_sequence_retry(&self, network: &str) {
        STALE_SEQUENCE_RETRIES.with_label_values(&[network]).inc();
    }

    pub fn record_lock_wait(&self, network: &str, waited: Duration) {
        LOCK_WAIT
            .with_label_values(&[network])
            .observe(waited.as_millis() as f64);
    }

    pub fn record_confirmation(&self, network: &str, latency: Duration) {
        CONFIRMATION_LATENCY
            .with_label_values(&[network])
            .observe(latency.as_millis() as f64);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BRIDGE METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_finalize_attempt(&self, network: &str, outcome: FinalizeAttempt) {
        FINALIZE_ATTEMPTS
            .with_label_values(&[network, outcome.as_str()])
            .inc();
    }

    pub fn record_attestation_wait(&self, waited: Duration) {
        ATTESTATION_WAIT.observe(waited.as_millis() as f64);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SYSTEM METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_execution(&self, kind: &str, duration: Duration) {
        EXECUTION_DURATION
            .with_label_values(&[kind])
            .observe(duration.as_millis() as f64);
    }

    pub fn record_error_logged(&self, kind: &str) {
        ERRORS_LOGGED.with_label_values(&[kind]).inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPORT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Export metrics in Prometheus text format
    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::EncodingError(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingError(e.to_string()))
    }
}

/// Metrics error types
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("encoding error: {0}")]
    EncodingError(String),
}
