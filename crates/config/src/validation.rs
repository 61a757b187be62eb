//! Configuration validation

use crate::{AppConfig, ConfigError, NetworkConfig, Result, StoreBackend};
use std::net::SocketAddr;

/// Validation error details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every problem with `config`, in field order. Empty when valid.
pub fn collect_errors(config: &AppConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(e) = validate_log_level(&config.service.log_level) {
        errors.push(e);
    }
    if config.service.listen_addr.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "service.listen_addr",
            format!("'{}' is not a socket address", config.service.listen_addr),
        ));
    }

    if config.networks.is_empty() {
        errors.push(ValidationError::new(
            "networks",
            "at least one network must be configured",
        ));
    }
    for (name, network) in &config.networks {
        errors.extend(validate_network(name, network));
    }

    if config.netting.max_batch_size == 0 {
        errors.push(ValidationError::new(
            "netting.max_batch_size",
            "must be greater than 0",
        ));
    }

    if config.execution.default_account.trim().is_empty() {
        errors.push(ValidationError::new(
            "execution.default_account",
            "signing account is required",
        ));
    }
    if config.execution.min_amount == 0 {
        errors.push(ValidationError::new(
            "execution.min_amount",
            "must be greater than 0",
        ));
    }
    for (field, value) in [
        ("execution.lock_timeout_secs", config.execution.lock_timeout_secs),
        ("execution.submit_timeout_secs", config.execution.submit_timeout_secs),
        (
            "execution.confirmation_timeout_secs",
            config.execution.confirmation_timeout_secs,
        ),
        (
            "bridge.attestation_timeout_secs",
            config.bridge.attestation_timeout_secs,
        ),
        (
            "bridge.attestation_initial_backoff_ms",
            config.bridge.attestation_initial_backoff_ms,
        ),
        (
            "bridge.finalize_backoff_step_secs",
            config.bridge.finalize_backoff_step_secs,
        ),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if config.bridge.attestation_max_backoff_ms < config.bridge.attestation_initial_backoff_ms {
        errors.push(ValidationError::new(
            "bridge.attestation_max_backoff_ms",
            "must not be below attestation_initial_backoff_ms",
        ));
    }
    if config.bridge.finalize_backoff_max_secs < config.bridge.finalize_backoff_step_secs {
        errors.push(ValidationError::new(
            "bridge.finalize_backoff_max_secs",
            "must not be below finalize_backoff_step_secs",
        ));
    }
    if config.bridge.finalize_max_retries > 10 {
        errors.push(ValidationError::new(
            "bridge.finalize_max_retries",
            "must be <= 10",
        ));
    }

    if config.store.backend == StoreBackend::Sqlite
        && config.store.path.as_deref().map_or(true, |p| p.trim().is_empty())
    {
        errors.push(ValidationError::new(
            "store.path",
            "sqlite backend requires a database path",
        ));
    }

    errors
}

/// Validate the entire application configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let errors = collect_errors(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_msg = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    Err(ConfigError::ValidationError(error_msg))
}

fn validate_network(name: &str, network: &NetworkConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if name.trim().is_empty() || name.chars().any(char::is_whitespace) {
        errors.push(ValidationError::new(
            format!("networks.{name}"),
            "network id must be a single non-empty token",
        ));
    }
    if let Some(account) = &network.account {
        if account.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("networks.{name}.account"),
                "account must not be blank",
            ));
        }
    }
    for (idx, pool) in network.pools.iter().enumerate() {
        let field = format!("networks.{name}.pools[{idx}]");
        if pool.pool_id.trim().is_empty() {
            errors.push(ValidationError::new(&field, "pool_id is required"));
        }
        if pool.base.trim().is_empty() || pool.quote.trim().is_empty() {
            errors.push(ValidationError::new(&field, "base and quote are required"));
        } else if pool.base == pool.quote {
            errors.push(ValidationError::new(&field, "base and quote must differ"));
        }
        if pool.fee_tier_ppm >= 1_000_000 {
            errors.push(ValidationError::new(&field, "fee_tier_ppm must be below 1000000"));
        }
    }

    errors
}

fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "service.log_level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PoolConfig, ServiceConfig, StoreConfig};

    fn valid() -> AppConfig {
        let mut config = AppConfig::default();
        config
            .networks
            .insert("base".to_string(), NetworkConfig::default());
        config
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = AppConfig {
            service: ServiceConfig {
                log_level: "loud".to_string(),
                ..Default::default()
            },
            ..valid()
        };
        let errors = collect_errors(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "service.log_level");
    }

    #[test]
    fn test_errors_accumulate() {
        let mut config = AppConfig::default();
        config.netting.max_batch_size = 0;
        config.execution.lock_timeout_secs = 0;
        config.store = StoreConfig {
            backend: StoreBackend::Sqlite,
            path: None,
        };

        let fields: Vec<_> = collect_errors(&config)
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            vec![
                "networks",
                "netting.max_batch_size",
                "execution.lock_timeout_secs",
                "store.path",
            ]
        );

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("store.path"));
    }

    #[test]
    fn test_validate_network_entries() {
        let mut config = valid();
        config.networks.insert(
            "arbitrum".to_string(),
            NetworkConfig {
                account: Some("  ".to_string()),
                pools: vec![PoolConfig {
                    pool_id: "arb-weth".to_string(),
                    base: "WETH".to_string(),
                    quote: "WETH".to_string(),
                    fee_tier_ppm: 1_000_000,
                }],
            },
        );

        let fields: Vec<_> = collect_errors(&config)
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            vec![
                "networks.arbitrum.account",
                "networks.arbitrum.pools[0]",
                "networks.arbitrum.pools[0]",
            ]
        );
    }

    #[test]
    fn test_backoff_bounds() {
        let mut config = valid();
        config.bridge.finalize_backoff_step_secs = 20;
        config.bridge.attestation_max_backoff_ms = 10;

        let fields: Vec<_> = collect_errors(&config)
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            vec![
                "bridge.attestation_max_backoff_ms",
                "bridge.finalize_backoff_max_secs"
            ]
        );
    }
}
