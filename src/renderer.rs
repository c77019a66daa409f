//! Log Renderer
//!
//! Stand-in for the real display surface: drains the view hub and logs
//! each update with structured fields. The orchestrator stays unaware of
//! how snapshots are drawn.

use crate::backend_client::StreamPayload;
use crate::view_hub::{ViewHub, ViewMessage};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Subscribe to the hub and log every update until the hub drops
pub fn spawn(hub: Arc<ViewHub>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (id, mut rx) = hub.register().await;
        tracing::debug!(subscriber_id = %id, "Log renderer attached");

        while let Some(message) = rx.recv().await {
            match message {
                ViewMessage::SnapshotUpdated(snapshot) => {
                    if snapshot.degraded {
                        tracing::warn!(
                            stream = %snapshot.stream,
                            version = snapshot.version,
                            reason = snapshot.degraded_reason.as_deref().unwrap_or("unknown"),
                            "Stream degraded, showing last good data"
                        );
                    } else {
                        log_payload(&snapshot);
                    }
                }
                ViewMessage::FreshAlerts(alerts) => {
                    for alert in &alerts {
                        tracing::info!(
                            alert_id = alert.id,
                            kind = ?alert.kind,
                            message = %alert.message,
                            "Alert"
                        );
                    }
                }
                ViewMessage::ContextChanged(context) => {
                    tracing::info!(
                        room = context.room.as_deref().unwrap_or("-"),
                        camera = context.camera,
                        mode = ?context.mode,
                        "Context changed"
                    );
                }
            }
        }
    })
}

fn log_payload(snapshot: &crate::snapshot::StreamSnapshot) {
    match snapshot.data {
        Some(StreamPayload::FrameMetrics(ref data)) => {
            tracing::info!(
                version = snapshot.version,
                num_people = data.metrics.num_people,
                avg_confidence = data.metrics.avg_confidence,
                used = data.usage.used,
                free = data.usage.free,
                usage_percent = data.usage.usage_percent,
                frame_bytes = data.frame.len(),
                "Frame/metrics updated"
            );
        }
        Some(StreamPayload::Chart(ref data)) => {
            tracing::info!(
                version = snapshot.version,
                points = data.series.labels.len(),
                activities = data.activities.len(),
                "Chart updated"
            );
        }
        Some(StreamPayload::Alerts(ref batch)) => {
            tracing::debug!(
                version = snapshot.version,
                delivered = batch.alerts.len(),
                "Alert feed polled"
            );
        }
        Some(StreamPayload::Overview(ref data)) => {
            tracing::info!(
                version = snapshot.version,
                rooms = data.labs.len(),
                "Overview updated"
            );
        }
        None => {}
    }
}
