//! LabWatch Client
//!
//! Main entry point: wires the backend client, session controller and log
//! renderer together and runs until interrupted.

use labwatch_client::{
    alert_tracker::AlertTracker,
    backend_client::BackendClient,
    renderer,
    session_controller::SessionController,
    snapshot::SnapshotStore,
    state::AppConfig,
    view_hub::ViewHub,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "labwatch_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting LabWatch client v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        backend_url = %config.backend_url,
        total_cameras = config.total_cameras,
        station_capacity = config.station_capacity,
        "Configuration loaded"
    );

    // Initialize components
    let backend = Arc::new(BackendClient::new(
        config.backend_url.clone(),
        config.station_capacity,
    )?);
    let snapshots = Arc::new(SnapshotStore::new());
    let alerts = Arc::new(AlertTracker::new());
    let hub = Arc::new(ViewHub::new());

    let controller = SessionController::new(
        config.session_settings(),
        backend.clone(),
        snapshots,
        alerts,
        hub.clone(),
    );
    tracing::info!("SessionController initialized");

    // Attach the log renderer before any loop produces data
    let renderer_task = renderer::spawn(hub.clone());

    // The overview loop runs for the whole client session
    controller.start_overview().await;

    if let Some(ref room) = config.initial_room {
        controller.enter_room(room.clone()).await;
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    controller.shutdown().await;
    renderer_task.abort();

    Ok(())
}
