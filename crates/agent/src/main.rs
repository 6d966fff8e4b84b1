//! Capacity autopause agent
//!
//! Checks the configured capacity every few minutes and suspends it once
//! it has been idle for the configured window.

use anyhow::{Context, Result};
use autopause_agent::api;
use autopause_lib::{
    engine::{CycleLoop, PauseCycle},
    health::HealthRegistry,
    observability::{AutopauseMetrics, CycleLogger},
    settings::Settings,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Optional config file layered under the environment
const CONFIG_PATH_VAR: &str = "AUTOPAUSE_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting capacity-autopause agent");

    let config_path = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref()).context("invalid configuration")?;
    info!(
        resource_id = %settings.resource,
        credential = %settings.credential.describe(),
        dry_run = settings.dry_run,
        "Agent configured"
    );

    let cycle = Arc::new(PauseCycle::from_settings(&settings)?);

    let health_registry = HealthRegistry::new();

    let metrics = AutopauseMetrics::new();

    let logger = CycleLogger::new(settings.resource.to_string());
    logger.log_startup(
        AGENT_VERSION,
        settings.check_interval.as_secs(),
        settings.dry_run,
    );

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics.clone()));
    let api_port = settings.api_port;
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "API server exited");
        }
    });

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let cycle_loop =
        CycleLoop::new(cycle, health_registry, metrics).with_interval(settings.check_interval);
    let loop_handle = tokio::spawn(cycle_loop.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    // The loop finishes any in-flight cycle before it sees the signal
    let _ = shutdown_tx.send(());
    loop_handle.await?;
    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}
