//! Configuration structures for the settlement engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Service surface: environment, logging, listen address
    pub service: ServiceConfig,

    /// Networks the engine settles on, keyed by network id
    pub networks: BTreeMap<String, NetworkConfig>,

    pub netting: NettingConfig,

    pub execution: ExecutionSettings,

    /// Cross-network transfer settings
    pub bridge: BridgeConfig,

    /// Intent persistence
    pub store: StoreConfig,
}

impl AppConfig {
    /// Network ids in key order.
    pub fn network_ids(&self) -> Vec<String> {
        self.networks.keys().cloned().collect()
    }

    /// Signing account per network, falling back to the execution default.
    pub fn account_for(&self, network: &str) -> &str {
        self.networks
            .get(network)
            .and_then(|n| n.account.as_deref())
            .unwrap_or(&self.execution.default_account)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Environment type (mainnet, testnet, local)
    pub environment: Environment,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format
    pub log_format: LogFormat,

    /// HTTP API and /metrics listen address
    pub listen_addr: String,

    /// Enable metrics collection
    pub metrics_enabled: bool,

    /// Latency the simulated chain adds to each submission
    pub simulated_latency_ms: u64,
}

/// Environment types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Mainnet,
    Testnet,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Per-network settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Signing account; defaults to `execution.default_account`
    pub account: Option<String>,

    /// Known pools. Pairs without an entry use the default fee tier.
    pub pools: Vec<PoolConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub pool_id: String,
    pub base: String,
    pub quote: String,
    /// Fee in parts per million, e.g. 3000 for 0.30%
    #[serde(default = "default_fee_tier_ppm")]
    pub fee_tier_ppm: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NettingConfig {
    /// Maximum intents per netting round
    pub max_batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub default_account: String,

    /// Smallest accepted amount in base units (dust guard)
    pub min_amount: u64,

    /// Bound on waiting for a network's submission lock
    pub lock_timeout_secs: u64,

    /// Bound on the sequence read and on each broadcast
    pub submit_timeout_secs: u64,

    /// Bound on waiting for one confirmation
    pub confirmation_timeout_secs: u64,
}

impl ExecutionSettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Overall bound on waiting for a burn attestation
    pub attestation_timeout_secs: u64,

    pub attestation_initial_backoff_ms: u64,

    pub attestation_max_backoff_ms: u64,

    /// Finalize retries after the first attempt
    pub finalize_max_retries: u32,

    /// Linear backoff step between finalize attempts
    pub finalize_backoff_step_secs: u64,

    pub finalize_backoff_max_secs: u64,

    /// Interval of the background recovery sweep; 0 disables it
    pub sweep_interval_secs: u64,
}

impl BridgeConfig {
    pub fn attestation_timeout(&self) -> Duration {
        Duration::from_secs(self.attestation_timeout_secs)
    }

    pub fn attestation_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.attestation_initial_backoff_ms)
    }

    pub fn attestation_max_backoff(&self) -> Duration {
        Duration::from_millis(self.attestation_max_backoff_ms)
    }

    pub fn finalize_backoff_step(&self) -> Duration {
        Duration::from_secs(self.finalize_backoff_step_secs)
    }

    pub fn finalize_backoff_max(&self) -> Duration {
        Duration::from_secs(self.finalize_backoff_max_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// SQLite database file, required for the sqlite backend
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_account() -> String {
    "settlement-engine".to_string()
}

fn default_fee_tier_ppm() -> u32 {
    3000
}

fn default_max_batch_size() -> usize {
    100
}

fn default_lock_timeout_secs() -> u64 {
    30
}

fn default_submit_timeout_secs() -> u64 {
    15
}

fn default_confirmation_timeout_secs() -> u64 {
    60
}

fn default_attestation_timeout_secs() -> u64 {
    1800 // 30 minutes
}

fn default_finalize_max_retries() -> u32 {
    3
}

fn default_finalize_backoff_step_secs() -> u64 {
    5
}

fn default_finalize_backoff_max_secs() -> u64 {
    15
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Local,
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            listen_addr: default_listen_addr(),
            metrics_enabled: true,
            simulated_latency_ms: 0,
        }
    }
}

impl Default for NettingConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            default_account: default_account(),
            min_amount: 1,
            lock_timeout_secs: default_lock_timeout_secs(),
            submit_timeout_secs: default_submit_timeout_secs(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            attestation_timeout_secs: default_attestation_timeout_secs(),
            attestation_initial_backoff_ms: 2000,
            attestation_max_backoff_ms: 30_000,
            finalize_max_retries: default_finalize_max_retries(),
            finalize_backoff_step_secs: default_finalize_backoff_step_secs(),
            finalize_backoff_max_secs: default_finalize_backoff_max_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: None,
        }
    }
}
