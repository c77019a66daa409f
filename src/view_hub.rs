//! ViewHub - Snapshot Distribution
//!
//! ## Responsibilities
//!
//! - Subscriber registration for renderers
//! - Broadcast of immutable snapshots and fresh alerts
//!
//! The orchestrator only ever emits complete [`StreamSnapshot`]s and
//! already-deduplicated alerts; renderers decide how to draw them. The hub
//! never blocks a poll loop: subscribers get unbounded channels and slow
//! consumers only grow their own queue.

use crate::backend_client::Alert;
use crate::models::SessionContext;
use crate::snapshot::StreamSnapshot;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Messages delivered to renderers
#[derive(Debug, Clone)]
pub enum ViewMessage {
    /// A stream's snapshot was replaced or marked degraded
    SnapshotUpdated(StreamSnapshot),
    /// Alerts newer than the watermark, ascending by id
    FreshAlerts(Vec<Alert>),
    /// The navigation context changed (room enter/leave, camera, mode)
    ContextChanged(SessionContext),
}

struct Subscriber {
    id: Uuid,
    tx: mpsc::UnboundedSender<ViewMessage>,
}

/// ViewHub instance
pub struct ViewHub {
    subscribers: RwLock<HashMap<Uuid, Subscriber>>,
    subscriber_count: AtomicU64,
}

impl ViewHub {
    /// Create new ViewHub
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            subscriber_count: AtomicU64::new(0),
        }
    }

    /// Register a renderer
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<ViewMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut subscribers = self.subscribers.write().await;
            subscribers.insert(id, Subscriber { id, tx });
        }

        self.subscriber_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(subscriber_id = %id, "Renderer subscribed");

        (id, rx)
    }

    /// Unregister a renderer
    pub async fn unregister(&self, id: &Uuid) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.remove(id).is_some() {
            self.subscriber_count.fetch_sub(1, Ordering::Relaxed);
            tracing::debug!(subscriber_id = %id, "Renderer unsubscribed");
        }
    }

    /// Broadcast a message to all renderers
    pub async fn broadcast(&self, message: ViewMessage) {
        let subscribers = self.subscribers.read().await;
        for subscriber in subscribers.values() {
            if subscriber.tx.send(message.clone()).is_err() {
                tracing::warn!(
                    subscriber_id = %subscriber.id,
                    "Dropping message for closed renderer channel"
                );
            }
        }
    }

    /// Number of registered renderers
    pub fn subscriber_count(&self) -> u64 {
        self.subscriber_count.load(Ordering::Relaxed)
    }
}

impl Default for ViewHub {
    fn default() -> Self {
        Self::new()
    }
}
