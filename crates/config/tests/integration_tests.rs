//! Integration tests for the config crate

use intent_settle_config::{
    validate_config, ConfigError, ConfigLoader, Environment, LogFormat, StoreBackend,
};
use std::io::Write;
use std::path::{Path, PathBuf};

fn preset(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../config")
        .join(name)
}

#[test]
fn test_load_mainnet_config() {
    let config = ConfigLoader::from_file(&preset("mainnet.toml"))
        .expect("Failed to load mainnet config");

    assert_eq!(config.service.environment, Environment::Mainnet);
    assert_eq!(config.service.log_format, LogFormat::Json);
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
    assert!(config.networks.values().all(|n| !n.pools.is_empty()));
    validate_config(&config).unwrap();
}

#[test]
fn test_load_testnet_config() {
    let config = ConfigLoader::from_file(&preset("testnet.toml"))
        .expect("Failed to load testnet config");

    assert_eq!(config.service.environment, Environment::Testnet);
    assert_eq!(config.service.log_level, "debug");
    validate_config(&config).unwrap();
}

#[test]
fn test_load_local_config() {
    let config =
        ConfigLoader::from_file(&preset("local.toml")).expect("Failed to load local config");

    assert_eq!(config.service.environment, Environment::Local);
    assert_eq!(config.service.log_level, "trace");
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(config.network_ids(), vec!["arbitrum", "base", "ethereum"]);
    assert_eq!(config.service.simulated_latency_ms, 25);
    validate_config(&config).unwrap();
}

#[test]
fn test_layered_load_keeps_file_values() {
    let config = ConfigLoader::load(Some(&preset("local.toml")), "INTENT_SETTLE_TEST_UNSET")
        .expect("Failed to load layered config");

    assert_eq!(config.service.log_level, "trace");
    assert_eq!(config.bridge.finalize_backoff_step_secs, 1);
    assert_eq!(config.store.backend, StoreBackend::Memory);
}

#[test]
fn test_layered_load_without_file_uses_defaults() {
    let config = ConfigLoader::load(None, "INTENT_SETTLE_TEST_UNSET").unwrap();

    assert_eq!(config.service.log_level, "info");
    assert_eq!(config.netting.max_batch_size, 100);
    assert!(config.networks.is_empty());
    // Defaults alone are incomplete: no network is configured.
    assert!(matches!(
        validate_config(&config),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn test_yaml_file() {
    let yaml = r#"
service:
  environment: testnet
  log_level: info
networks:
  base:
    account: "0x00000000000000000000000000000000000000e1"
store:
  backend: sqlite
  path: "intents.db"
"#;

    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let config = ConfigLoader::from_file(file.path()).unwrap();
    assert_eq!(config.store.path.as_deref(), Some("intents.db"));
    validate_config(&config).unwrap();
}

#[test]
fn test_invalid_file_reports_every_problem() {
    let toml = r#"
[service]
log_level = "verbose"
listen_addr = "localhost"

[[networks.base.pools]]
pool_id = "p"
base = "USDC"
quote = "USDC"

[store]
backend = "sqlite"
"#;

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(toml.as_bytes()).unwrap();

    let config = ConfigLoader::from_file(file.path()).unwrap();
    let message = validate_config(&config).unwrap_err().to_string();
    for field in [
        "service.log_level",
        "service.listen_addr",
        "networks.base.pools[0]",
        "store.path",
    ] {
        assert!(message.contains(field), "{field} missing from: {message}");
    }
}

#[test]
fn test_malformed_toml() {
    assert!(matches!(
        ConfigLoader::from_toml("[service\nlog_level = 1"),
        Err(ConfigError::TomlError(_))
    ));
}
