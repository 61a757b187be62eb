//! Intent settlement engine - main entry point
//!
//! Loads layered configuration, initialises tracing and metrics, finalizes
//! bridge transfers left over from a previous run, then serves the HTTP API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use intent_settle::{api::build_router, app::build_engine};
use intent_settle_config::{validate_config, ConfigLoader, LogFormat, ENV_PREFIX};
use intent_settle_metrics::{init_tracing_with_metrics, MetricsCollector};
use intent_settle_orchestrator::IntentOrchestrator;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, env = "INTENT_SETTLE_CONFIG")]
    config: Option<PathBuf>,

    /// Override `service.listen_addr`
    #[arg(long)]
    listen: Option<String>,

    /// Override `service.log_level`
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ConfigLoader::load(args.config.as_deref(), ENV_PREFIX)
        .context("failed to load configuration")?;
    if let Some(listen) = args.listen {
        config.service.listen_addr = listen;
    }
    if let Some(level) = args.log_level {
        config.service.log_level = level;
    }
    if args.json_logs {
        config.service.log_format = LogFormat::Json;
    }
    validate_config(&config).context("invalid configuration")?;

    let metrics = MetricsCollector::new();
    let format = match config.service.log_format {
        LogFormat::Json => intent_settle_metrics::LogFormat::Json,
        LogFormat::Pretty => intent_settle_metrics::LogFormat::Pretty,
    };
    init_tracing_with_metrics(metrics, &config.service.log_level, format)?;

    info!(
        environment = ?config.service.environment,
        networks = ?config.network_ids(),
        store = ?config.store.backend,
        "Starting intent settlement engine"
    );

    let engine = build_engine(&config, metrics).await?;

    match engine.orchestrator.recover_pending_bridges().await {
        Ok(report) => info!(
            finalized = report.finalized.len(),
            completed = report.completed.len(),
            awaiting_attestation = report.awaiting_attestation.len(),
            failed = report.failed.len(),
            "Startup bridge recovery finished"
        ),
        Err(e) => warn!(error = %e, "Startup bridge recovery failed"),
    }

    if let Some(interval) = config.bridge.sweep_interval() {
        tokio::spawn(run_recovery_sweep(engine.orchestrator.clone(), interval));
    }

    let metrics = config.service.metrics_enabled.then_some(engine.metrics);
    let app = build_router(engine.orchestrator, metrics);
    let listener = tokio::net::TcpListener::bind(&config.service.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.service.listen_addr))?;
    info!(addr = %config.service.listen_addr, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_recovery_sweep(orchestrator: Arc<IntentOrchestrator>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately; startup already swept.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match orchestrator.recover_pending_bridges().await {
            Ok(report) if !report.finalized.is_empty() || !report.failed.is_empty() => info!(
                finalized = report.finalized.len(),
                completed = report.completed.len(),
                awaiting_attestation = report.awaiting_attestation.len(),
                failed = report.failed.len(),
                "Bridge recovery sweep"
            ),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Bridge recovery sweep failed"),
        }
    }
}
