//! # hushbotd: hushbot daemon
//!
//! Composition root that wires the adapters into the automation engine.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Initialise `tracing`
//! - Construct the virtual device adapters with the configured grants
//! - Start the automation engine and its transition loop
//! - Register the configured geofences
//! - Optionally replay a route through the mock location harness
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing_subscriber::EnvFilter;

use hushbot_adapter_virtual::{
    VirtualDevice, VirtualGeofencingProvider, VirtualLocationProvider, VirtualPolicyController,
};
use hushbot_app::automation_engine::AutomationEngine;
use hushbot_app::event_bus::InProcessEventBus;
use hushbot_app::transition_channel;

use crate::config::{Config, MockConfig};

type Engine = AutomationEngine<
    Arc<VirtualGeofencingProvider>,
    Arc<VirtualLocationProvider>,
    Arc<VirtualPolicyController>,
    Arc<InProcessEventBus>,
>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Device
    let device = VirtualDevice::default();
    if !config.permissions.location_granted {
        device.geofencing.revoke_location();
    }
    if !config.permissions.policy_granted {
        device.policy.revoke();
    }
    device.location.set_position(config.location);

    // Event bus
    let event_bus = Arc::new(InProcessEventBus::new(config.engine.event_bus_capacity));
    let event_logger = tokio::spawn(log_events(BroadcastStream::new(event_bus.subscribe())));

    // Engine
    let (sink, queue) = transition_channel::channel();
    let engine: Arc<Engine> = Arc::new(
        AutomationEngine::start(
            Arc::clone(&device.geofencing),
            Arc::clone(&device.location),
            Arc::clone(&device.policy),
            Arc::clone(&event_bus),
            sink,
        )
        .await,
    );
    let runner = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.run(queue).await }
    });

    if !engine.has_policy_capability().await {
        tracing::warn!("do-not-disturb access not granted, transitions will not change the policy");
    }

    let seeds = config
        .seed_geofences()
        .context("invalid geofence in configuration")?;
    for geofence in seeds {
        let id = geofence.id.clone();
        let registration = engine
            .add_or_update_geofence(geofence)
            .await
            .with_context(|| format!("failed to save geofence {id}"))?;
        tracing::info!(geofence_id = %id, %registration, "geofence seeded");
    }

    if config.mock.enabled {
        replay_route(&engine, &config.mock).await?;
    }

    tracing::info!("hushbotd running, press ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    log_status(&engine).await;
    if let Some(change) = event_bus.last_policy_applied() {
        tracing::info!(at = %change.timestamp, data = %change.data, "last DND change");
    }
    runner.abort();
    event_logger.abort();
    tracing::info!("hushbotd stopped");
    Ok(())
}

async fn replay_route(engine: &Engine, mock: &MockConfig) -> anyhow::Result<()> {
    let step = Duration::from_millis(mock.step_interval_ms);
    engine.enable_mock_location().await;
    tracing::info!(points = mock.route.len(), "replaying mock route");

    for point in &mock.route {
        let crossings = engine
            .set_mock_position(point.latitude, point.longitude)
            .await
            .context("failed to inject mock position")?;
        tracing::info!(
            latitude = point.latitude,
            longitude = point.longitude,
            crossings = crossings.len(),
            "mock position"
        );
        tokio::time::sleep(step).await;
    }

    log_status(engine).await;
    Ok(())
}

async fn log_status(engine: &Engine) {
    for status in engine.geofence_statuses().await {
        tracing::info!(
            geofence_id = %status.geofence.id,
            name = %status.geofence.name,
            registration = %status.registration,
            "geofence status"
        );
    }
    let policy = engine.policy_status().await;
    tracing::info!(
        dnd_enabled = policy.state.dnd_enabled,
        last_applied_by = ?policy.state.last_applied_by.as_ref().map(ToString::to_string),
        has_capability = policy.has_capability,
        last_failure = ?policy.last_failure,
        anomalies = engine.anomaly_count().await,
        "policy status"
    );
}

async fn log_events(mut events: BroadcastStream<hushbot_domain::event::Event>) {
    while let Some(item) = events.next().await {
        match item {
            Ok(event) => tracing::info!(
                event_type = %event.event_type,
                geofence_id = ?event.geofence_id.as_ref().map(ToString::to_string),
                data = %event.data,
                "engine event"
            ),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event logger lagged behind");
            }
        }
    }
}
