use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

lazy_static! {
    // ═══════════════════════════════════════════════════════════════════════════
    // INTENT METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Total number of intents created
    pub static ref INTENTS_CREATED: IntCounter = register_int_counter!(
        "intent_settle_intents_created_total",
        "Total number of intents created"
    )
    .expect("intents_created metric registers");

    /// Status transitions by target status
    pub static ref INTENT_TRANSITIONS: IntCounterVec = register_int_counter_vec!(
        "intent_settle_intent_transitions_total",
        "Intent status transitions by target status",
        &["status"]
    )
    .expect("intent_transitions metric registers");

    /// Failed intents by error kind
    pub static ref INTENTS_FAILED: IntCounterVec = register_int_counter_vec!(
        "intent_settle_intents_failed_total",
        "Failed intents by error kind",
        &["kind"]
    )
    .expect("intents_failed metric registers");

    /// Intents not yet in a terminal state
    pub static ref ACTIVE_INTENTS: IntGauge = register_int_gauge!(
        "intent_settle_intents_active",
        "Current number of non-terminal intents"
    )
    .expect("intents_active metric registers");

    // ═══════════════════════════════════════════════════════════════════════════
    // NETTING METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub static ref NETTING_ROUNDS: IntCounter = register_int_counter!(
        "intent_settle_netting_rounds_total",
        "Total number of netting rounds executed"
    )
    .expect("netting_rounds metric registers");

    /// Fraction of gross volume offset internally
    pub static ref NETTING_EFFICIENCY: Histogram = register_histogram!(
        "intent_settle_netting_efficiency",
        "Netting efficiency per round",
        vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0]
    )
    .expect("netting_efficiency metric registers");

    pub static ref NETTING_BATCH_SIZE: Histogram = register_histogram!(
        "intent_settle_netting_batch_size",
        "Number of intents per netting round",
        vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]
    )
    .expect("netting_batch_size metric registers");

    // ═══════════════════════════════════════════════════════════════════════════
    // SUBMISSION METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Accepted submissions by network and transaction kind
    pub static ref SUBMISSIONS: IntCounterVec = register_int_counter_vec!(
        "intent_settle_submissions_total",
        "Transactions accepted by the node",
        &["network", "kind"]
    )
    .expect("submissions metric registers");

    pub static ref SUBMISSION_FAILURES: IntCounterVec = register_int_counter_vec!(
        "intent_settle_submission_failures_total",
        "Submissions the node refused",
        &["network", "reason"]
    )
    .expect("submission_failures metric registers");

    pub static ref STALE_SEQUENCE_RETRIES: IntCounterVec = register_int_counter_vec!(
        "intent_settle_stale_sequence_retries_total",
        "Resubmissions after a stale sequence number",
        &["network"]
    )
    .expect("stale_sequence_retries metric registers");

    /// Time spent waiting for a network lock
    pub static ref LOCK_WAIT: HistogramVec = register_histogram_vec!(
        "intent_settle_lock_wait_ms",
        "Network lock acquisition wait in milliseconds",
        &["network"],
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]
    )
    .expect("lock_wait metric registers");

    pub static ref CONFIRMATION_LATENCY: HistogramVec = register_histogram_vec!(
        "intent_settle_confirmation_latency_ms",
        "Submission to confirmation latency in milliseconds",
        &["network"],
        vec![100.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 30000.0, 60000.0]
    )
    .expect("confirmation_latency metric registers");

    // ═══════════════════════════════════════════════════════════════════════════
    // BRIDGE METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Finalize attempts by destination network and outcome
    pub static ref FINALIZE_ATTEMPTS: IntCounterVec = register_int_counter_vec!(
        "intent_settle_finalize_attempts_total",
        "Bridge finalize attempts by outcome",
        &["network", "outcome"]
    )
    .expect("finalize_attempts metric registers");

    pub static ref ATTESTATION_WAIT: Histogram = register_histogram!(
        "intent_settle_attestation_wait_ms",
        "Time from burn to attestation in milliseconds",
        vec![100.0, 1000.0, 5000.0, 15000.0, 30000.0, 60000.0, 300000.0]
    )
    .expect("attestation_wait metric registers");

    // ═══════════════════════════════════════════════════════════════════════════
    // SYSTEM METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub static ref EXECUTION_DURATION: HistogramVec = register_histogram_vec!(
        "intent_settle_execution_duration_ms",
        "End-to-end execution time by intent kind",
        &["kind"],
        vec![10.0, 100.0, 500.0, 1000.0, 5000.0, 15000.0, 60000.0]
    )
    .expect("execution_duration metric registers");

    /// Error-level log events by error kind
    pub static ref ERRORS_LOGGED: IntCounterVec = register_int_counter_vec!(
        "intent_settle_errors_logged_total",
        "Error events by error kind",
        &["kind"]
    )
    .expect("errors_logged metric registers");
}
