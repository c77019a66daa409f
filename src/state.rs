//! Application configuration
//!
//! Env-var driven settings with logged defaults.

use crate::session_controller::SessionSettings;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Backend base URL, no trailing slash
    pub backend_url: String,
    /// Cameras per room (wraparound bound)
    pub total_cameras: u32,
    /// Workstations per room for usage derivation
    pub station_capacity: u32,
    /// Frame/metrics poll period
    pub frame_period_ms: u64,
    /// Chart + activity log poll period
    pub chart_period_ms: u64,
    /// Alert poll period
    pub alert_period_ms: u64,
    /// Overview poll period
    pub overview_period_ms: u64,
    /// Directory for exported reports
    pub report_dir: PathBuf,
    /// Room to enter at startup, if any
    pub initial_room: Option<String>,
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: std::env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5000/api".to_string()),
            total_cameras: env_u32("TOTAL_CAMERAS", 2),
            station_capacity: env_u32("STATION_CAPACITY", 30),
            frame_period_ms: env_u64("FRAME_PERIOD_MS", 2000),
            chart_period_ms: env_u64("CHART_PERIOD_MS", 2000),
            alert_period_ms: env_u64("ALERT_PERIOD_MS", 3000),
            overview_period_ms: env_u64("OVERVIEW_PERIOD_MS", 8000),
            report_dir: std::env::var("REPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            initial_room: std::env::var("ROOM").ok(),
        }
    }
}

impl AppConfig {
    /// Cadence settings for the session controller
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            total_cameras: self.total_cameras,
            frame_period: Duration::from_millis(self.frame_period_ms),
            chart_period: Duration::from_millis(self.chart_period_ms),
            alert_period: Duration::from_millis(self.alert_period_ms),
            overview_period: Duration::from_millis(self.overview_period_ms),
        }
    }
}
