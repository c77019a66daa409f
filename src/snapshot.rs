//! SnapshotStore - Latest Stream Values
//!
//! ## Responsibilities
//!
//! - Keep the most recent successfully parsed value per stream
//! - Retain stale-but-valid data across fetch failures (degraded flag)
//! - Drop room-scoped entries on room leave

use crate::backend_client::StreamPayload;
use crate::models::StreamId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Versioned immutable value for one stream
///
/// `data` is `None` until the first successful fetch; after that it always
/// holds the latest success, even while `degraded` is set.
#[derive(Debug, Clone)]
pub struct StreamSnapshot {
    pub stream: StreamId,
    /// Incremented on every successful replacement
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub degraded: bool,
    pub degraded_reason: Option<String>,
    pub data: Option<StreamPayload>,
}

impl StreamSnapshot {
    fn empty(stream: StreamId) -> Self {
        Self {
            stream,
            version: 0,
            updated_at: Utc::now(),
            degraded: false,
            degraded_reason: None,
            data: None,
        }
    }
}

/// Latest snapshot per stream
pub struct SnapshotStore {
    snapshots: RwLock<HashMap<StreamId, StreamSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the snapshot with a fresh payload and clear degradation
    pub async fn record_success(&self, stream: StreamId, payload: StreamPayload) -> StreamSnapshot {
        let mut snapshots = self.snapshots.write().await;
        let entry = snapshots
            .entry(stream)
            .or_insert_with(|| StreamSnapshot::empty(stream));

        entry.version += 1;
        entry.updated_at = Utc::now();
        entry.degraded = false;
        entry.degraded_reason = None;
        entry.data = Some(payload);

        entry.clone()
    }

    /// Mark the stream degraded, keeping the previous data
    pub async fn record_failure(&self, stream: StreamId, reason: String) -> StreamSnapshot {
        let mut snapshots = self.snapshots.write().await;
        let entry = snapshots
            .entry(stream)
            .or_insert_with(|| StreamSnapshot::empty(stream));

        entry.degraded = true;
        entry.degraded_reason = Some(reason);

        entry.clone()
    }

    /// Latest snapshot for a stream, if any fetch has completed
    pub async fn get(&self, stream: StreamId) -> Option<StreamSnapshot> {
        self.snapshots.read().await.get(&stream).cloned()
    }

    /// Drop the room-scoped snapshots on room leave
    ///
    /// The overview snapshot survives; it is not tied to a room context.
    pub async fn clear_room_streams(&self) {
        let mut snapshots = self.snapshots.write().await;
        for stream in StreamId::ROOM_SET {
            snapshots.remove(&stream);
        }
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
