//! Lifecycle metrics against the process-wide registry. Kept to a single
//! test so nothing else in this binary moves the gauges.

use std::collections::HashSet;
use std::sync::Arc;

use cosmwasm_std::Uint256;
use intent_settle_metrics::metrics::{ACTIVE_INTENTS, INTENTS_FAILED, INTENT_TRANSITIONS};
use intent_settle_metrics::MetricsCollector;
use intent_settle_orchestrator::{IntentOrchestrator, IntentValidator, OrchestratorConfig};
use intent_settle_relayer::{MockAttestationService, MockChainClient};
use intent_settle_settlement::{CancelOutcome, InMemoryStore};
use intent_settle_types::{Direction, ErrorKind, IntentStatus, NetworkId, NewIntent};

const RECIPIENT: &str = "0x00000000000000000000000000000000000000aa";

fn swap(amount: u128) -> NewIntent {
    NewIntent::swap("base", Direction::Sell, "USDC", "WETH", Uint256::from(amount))
}

fn transitions(status: IntentStatus) -> u64 {
    INTENT_TRANSITIONS.with_label_values(&[status.as_str()]).get()
}

fn failures(kind: ErrorKind) -> u64 {
    INTENTS_FAILED.with_label_values(&[kind.as_str()]).get()
}

#[tokio::test]
async fn test_active_gauge_returns_to_zero() {
    let chain = Arc::new(MockChainClient::new());
    chain
        .set_pool_liquidity("base:USDC/WETH:3000", Uint256::from(1u128))
        .await;
    let orchestrator = IntentOrchestrator::builder()
        .with_chain(chain.clone())
        .with_attestations(Arc::new(MockAttestationService::new(chain)))
        .with_store(Arc::new(InMemoryStore::new()))
        .with_validator(IntentValidator::new(
            HashSet::from([NetworkId::from("base")]),
            Uint256::one(),
        ))
        .with_config(OrchestratorConfig::default())
        .with_metrics(MetricsCollector::new())
        .build()
        .unwrap();
    assert_eq!(ACTIVE_INTENTS.get(), 0);

    // Rejected during analysis.
    let rejected = orchestrator
        .submit_intent(NewIntent::payment(
            "base",
            "arbitrum",
            "USDC",
            RECIPIENT,
            Uint256::from(5u128),
        ))
        .await
        .unwrap();
    assert_eq!(rejected.status, IntentStatus::Failed);
    assert_eq!(ACTIVE_INTENTS.get(), 0);

    // Cancelled before execution.
    let cancelled = orchestrator.submit_intent(swap(1)).await.unwrap();
    assert_eq!(ACTIVE_INTENTS.get(), 1);
    assert_eq!(
        orchestrator.cancel_intent(&cancelled.id).await.unwrap(),
        CancelOutcome::Cancelled
    );
    assert_eq!(ACTIVE_INTENTS.get(), 0);

    // Failed on chain.
    let failed = orchestrator.submit_intent(swap(5)).await.unwrap();
    let failed = orchestrator.confirm_intent(&failed.id).await.unwrap();
    assert_eq!(failed.status, IntentStatus::Failed);
    assert_eq!(ACTIVE_INTENTS.get(), 0);

    let completed = orchestrator.submit_intent(swap(1)).await.unwrap();
    let completed = orchestrator.confirm_intent(&completed.id).await.unwrap();
    assert_eq!(completed.status, IntentStatus::Completed);
    assert_eq!(ACTIVE_INTENTS.get(), 0);

    assert_eq!(transitions(IntentStatus::Created), 4);
    assert_eq!(transitions(IntentStatus::Failed), 3);
    assert_eq!(transitions(IntentStatus::Completed), 1);
    assert_eq!(failures(ErrorKind::Validation), 1);
    assert_eq!(failures(ErrorKind::Cancelled), 1);
    assert_eq!(failures(ErrorKind::Liquidity), 1);
}
