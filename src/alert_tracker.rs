//! Alert Watermark Tracker
//!
//! Tracks the highest alert id already delivered to this session so each
//! poll only requests strictly newer alerts. The watermark is owned
//! exclusively by the alert loop and is monotonically non-decreasing for
//! the lifetime of a room session.

use crate::backend_client::{Alert, AlertBatch};
use std::sync::atomic::{AtomicU64, Ordering};

/// Watermark cursor over the incremental alert feed
pub struct AlertTracker {
    watermark: AtomicU64,
}

impl AlertTracker {
    /// Create a new tracker with the watermark at 0
    pub fn new() -> Self {
        Self {
            watermark: AtomicU64::new(0),
        }
    }

    /// Cursor for the next `GET /alerts?since_id=` poll
    pub fn since_id(&self) -> u64 {
        self.watermark.load(Ordering::Acquire)
    }

    /// Ingest one poll response
    ///
    /// Returns the batch's alerts sorted by ascending id for the renderer
    /// (the backend is trusted to exclude ids at or below `since_id`), then
    /// advances the watermark to the reported `latest_id`:
    /// - advances even when the alert list is empty but `latest_id` is
    ///   higher (backend-side compaction or skipped ids);
    /// - a `latest_id` below the current watermark is a regression
    ///   anomaly: logged, watermark unchanged;
    /// - an absent `latest_id` leaves the watermark unchanged.
    pub fn ingest(&self, batch: AlertBatch) -> Vec<Alert> {
        let mut alerts = batch.alerts;
        alerts.sort_by_key(|a| a.id);

        if let Some(latest_id) = batch.latest_id {
            let current = self.watermark.load(Ordering::Acquire);
            if latest_id > current {
                self.watermark.store(latest_id, Ordering::Release);
                tracing::debug!(
                    watermark = latest_id,
                    delivered = alerts.len(),
                    "Alert watermark advanced"
                );
            } else if latest_id < current {
                tracing::warn!(
                    reported = latest_id,
                    watermark = current,
                    "Backend reported a lower latest_id than the held watermark, keeping cursor"
                );
            }
        } else {
            tracing::debug!(
                delivered = alerts.len(),
                "Alert response without latest_id, keeping cursor"
            );
        }

        alerts
    }

    /// Re-arm the cursor at 0 (room leave)
    pub fn reset(&self) {
        self.watermark.store(0, Ordering::Release);
    }
}

impl Default for AlertTracker {
    fn default() -> Self {
        Self::new()
    }
}
