use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use envnode_core::TracingSink;
use envnode_runtime::{
    config_path_from_env, load_config, simulated_link, Agent, ProcessInfo, SimulatedSensorBus,
};

/// Set to `1` to run without a sensor on the simulated bus.
const SENSOR_ABSENT_ENV_VAR: &str = "ENVNODE_SENSOR_ABSENT";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,envnode=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("envnode agent starting...");

    let config_path = config_path_from_env();
    let config = load_config(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("failed to load configuration from {}", path.display()),
        None => "failed to load default configuration".to_string(),
    })?;

    let sensor_present = std::env::var(SENSOR_ABSENT_ENV_VAR).map_or(true, |v| v != "1");
    if !sensor_present {
        tracing::warn!("simulated sensor is absent, every cycle will be skipped");
    }

    let mut agent = Agent::new(
        SimulatedSensorBus::new(sensor_present),
        ProcessInfo::new(config.device_id.clone()),
        Arc::new(TracingSink),
        config,
    )
    .context("invalid agent configuration")?;

    // Host event channel fed by the simulated network stack
    let (event_tx, event_rx) = mpsc::channel(64);
    let link_handle = tokio::spawn(simulated_link(event_tx, agent.wifi_token()));

    tracing::info!(
        device_id = %agent.config().device_id,
        interval_ms = agent.config().sample_interval_ms,
        settle_ms = agent.config().settle_delay_ms,
        sensor_address = agent.config().sensor_address,
        "agent ready"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down...");
    };

    agent.run(event_rx, shutdown).await;
    link_handle.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}
