//! Wiring an [`IntentOrchestrator`] from an [`AppConfig`].

use intent_settle_config::{AppConfig, StoreBackend, StoreConfig};
use intent_settle_metrics::MetricsCollector;
use intent_settle_orchestrator::{
    Accounts, BuilderError, ExecutionConfig, IntentOrchestrator, IntentValidator,
    OrchestratorConfig, PoolDescriptor, RecoveryConfig, StaticPoolDiscovery,
};
use intent_settle_relayer::{MockAttestationService, MockChainClient};
use intent_settle_settlement::{InMemoryStore, IntentStore, SqliteStore, StoreError};
use intent_settle_types::{NetworkId, TradingPair, Uint256};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Build(#[from] BuilderError),
}

/// A running engine over the simulated chain.
pub struct Engine {
    pub orchestrator: Arc<IntentOrchestrator>,
    pub chain: Arc<MockChainClient>,
    pub metrics: MetricsCollector,
}

pub fn orchestrator_config(config: &AppConfig) -> OrchestratorConfig {
    let accounts = config.networks.keys().fold(
        Accounts::new(config.execution.default_account.clone()),
        |accounts, network| {
            accounts.with_network(network.as_str(), config.account_for(network))
        },
    );

    OrchestratorConfig {
        execution: ExecutionConfig {
            accounts,
            lock_timeout: config.execution.lock_timeout(),
            confirmation_timeout: config.execution.confirmation_timeout(),
            submit_timeout: config.execution.submit_timeout(),
            attestation_timeout: config.bridge.attestation_timeout(),
            attestation_initial_backoff: config.bridge.attestation_initial_backoff(),
            attestation_max_backoff: config.bridge.attestation_max_backoff(),
        },
        recovery: RecoveryConfig {
            max_retries: config.bridge.finalize_max_retries,
            backoff_step: config.bridge.finalize_backoff_step(),
            backoff_max: config.bridge.finalize_backoff_max(),
            confirmation_timeout: config.execution.confirmation_timeout(),
        },
        max_batch_size: config.netting.max_batch_size,
    }
}

pub fn validator(config: &AppConfig) -> IntentValidator {
    IntentValidator::new(
        config.networks.keys().map(|n| NetworkId::from(n.as_str())).collect(),
        Uint256::from(u128::from(config.execution.min_amount)),
    )
}

pub fn pool_discovery(config: &AppConfig) -> StaticPoolDiscovery {
    let mut discovery = StaticPoolDiscovery::new();
    for (network, settings) in &config.networks {
        for pool in &settings.pools {
            discovery = discovery.with_pool(
                network.as_str(),
                PoolDescriptor {
                    pool_id: pool.pool_id.clone(),
                    pair: TradingPair::new(&pool.base, &pool.quote),
                    fee_tier_ppm: pool.fee_tier_ppm,
                },
            );
        }
    }
    discovery
}

pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn IntentStore>, AppError> {
    match (config.backend, config.path.as_deref()) {
        (StoreBackend::Sqlite, Some(path)) => {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            info!(path = %path, "Opening SQLite intent store");
            Ok(Arc::new(SqliteStore::new(path).await?))
        }
        (StoreBackend::Sqlite, None) => Err(StoreError::ConnectionError(
            "sqlite backend requires store.path".to_string(),
        )
        .into()),
        (StoreBackend::Memory, _) => {
            info!("Using in-memory intent store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

/// Build the engine over the simulated chain and attester.
pub async fn build_engine(config: &AppConfig, metrics: MetricsCollector) -> Result<Engine, AppError> {
    let store = open_store(&config.store).await?;
    let chain = Arc::new(
        MockChainClient::new()
            .with_latency(Duration::from_millis(config.service.simulated_latency_ms)),
    );
    let attestations = Arc::new(MockAttestationService::new(chain.clone()));

    let orchestrator = IntentOrchestrator::builder()
        .with_chain(chain.clone())
        .with_attestations(attestations)
        .with_store(store)
        .with_pool_discovery(Arc::new(pool_discovery(config)))
        .with_validator(validator(config))
        .with_config(orchestrator_config(config))
        .with_metrics(metrics)
        .build()?;

    Ok(Engine {
        orchestrator: Arc::new(orchestrator),
        chain,
        metrics,
    })
}
