//! BackendClient - Sensing Backend Adapter
//!
//! ## Responsibilities
//!
//! - One outstanding typed request per call against the backend HTTP API
//! - Response parsing and success/failure classification
//! - Soft failures (backend `error` field) vs transport failures

use crate::error::{Error, Result};
use crate::models::{DisplayMode, RoomUsage, StreamId};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Occupancy metrics for one camera (`GET /data/{room}/{camera}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsData {
    pub num_people: u32,

    #[serde(default)]
    pub avg_confidence: f32,

    #[serde(default)]
    pub detected_objects: u32,

    /// Backend-reported soft failure
    #[serde(default)]
    pub error: Option<String>,
}

/// Per-behavior head counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSummary {
    #[serde(default)]
    pub attentive: u32,
    #[serde(default)]
    pub sleeping: u32,
    #[serde(default)]
    pub looking_down: u32,
    #[serde(default)]
    pub looking_away: u32,
}

/// Behavior analysis for one camera (`GET /behavior/{room}/{camera}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorData {
    pub total_people: u32,

    #[serde(default)]
    pub attention_rate: f32,

    #[serde(default)]
    pub summary: BehaviorSummary,

    #[serde(default)]
    pub error: Option<String>,
}

/// Chart time-series for a room (`GET /stats/{room}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartSeries {
    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub attention_rates: Vec<f32>,

    #[serde(default)]
    pub people_counts: Vec<u32>,

    #[serde(default)]
    pub latest_summary: Option<BehaviorSummary>,
}

/// One activity log entry (`GET /activities/{room}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub time: String,

    #[serde(rename = "type")]
    pub kind: String,

    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ActivitiesResponse {
    #[serde(default)]
    activities: Vec<ActivityEntry>,
}

/// Alert severity as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Info,
    Warning,
    Alert,
}

/// One alert feed entry
///
/// Ids are monotonically increasing within a session; the backend never
/// redelivers an id below the requested `since_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,

    #[serde(rename = "type")]
    pub kind: AlertKind,

    pub message: String,

    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Alert poll response (`GET /alerts?since_id=N`)
///
/// `latest_id` may be absent; the watermark is left unchanged in that
/// case rather than guessed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertBatch {
    #[serde(default)]
    pub alerts: Vec<Alert>,

    #[serde(default)]
    pub latest_id: Option<u64>,
}

/// Per-room overview entry (`GET /overview`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomOverview {
    #[serde(default)]
    pub has_data: bool,

    #[serde(default)]
    pub total_people: u32,

    #[serde(default)]
    pub attention_rate: f32,

    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Overview response covering all rooms
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverviewData {
    #[serde(default)]
    pub labs: HashMap<String, RoomOverview>,
}

/// One history point in an export snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub time: String,

    #[serde(default)]
    pub attention_rate: f32,

    #[serde(default)]
    pub total_people: u32,
}

/// Export snapshot for report generation (`GET /export/{room}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportData {
    #[serde(default)]
    pub summary: serde_json::Value,

    #[serde(default)]
    pub history: Vec<HistoryPoint>,
}

/// Combined frame + metrics result for the selected camera
///
/// The frame endpoint follows the display mode; behavior numbers are only
/// fetched in behavior-analysis mode.
#[derive(Debug, Clone)]
pub struct FrameMetricsData {
    pub frame: Vec<u8>,
    pub metrics: MetricsData,
    pub behavior: Option<BehaviorData>,
    pub usage: RoomUsage,
}

/// Chart series bundled with the activity log (one loop refreshes both)
#[derive(Debug, Clone)]
pub struct ChartData {
    pub series: ChartSeries,
    pub activities: Vec<ActivityEntry>,
}

/// Latest parsed value carried by a stream snapshot
#[derive(Debug, Clone)]
pub enum StreamPayload {
    FrameMetrics(FrameMetricsData),
    Chart(ChartData),
    Alerts(AlertBatch),
    Overview(OverviewData),
}

impl StreamPayload {
    pub fn stream(&self) -> StreamId {
        match self {
            StreamPayload::FrameMetrics(_) => StreamId::FrameMetrics,
            StreamPayload::Chart(_) => StreamId::Chart,
            StreamPayload::Alerts(_) => StreamId::Alerts,
            StreamPayload::Overview(_) => StreamId::Overview,
        }
    }
}

/// Fetch seam between poll loops and the backend
///
/// The production implementation is [`BackendClient`]; tests substitute
/// stub sources with controlled latency and failure injection.
pub trait StreamSource: Send + Sync + 'static {
    /// Frame + metrics (+ behavior in behavior mode) for one camera
    fn fetch_frame_metrics(
        &self,
        room: &str,
        camera: u32,
        mode: DisplayMode,
    ) -> BoxFuture<'static, Result<FrameMetricsData>>;

    /// Chart series and activity log for a room
    fn fetch_chart(&self, room: &str) -> BoxFuture<'static, Result<ChartData>>;

    /// Alerts strictly newer than `since_id`
    fn fetch_alerts(&self, since_id: u64) -> BoxFuture<'static, Result<AlertBatch>>;

    /// Overview of all rooms
    fn fetch_overview(&self) -> BoxFuture<'static, Result<OverviewData>>;
}

/// Backend HTTP client
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    station_capacity: u32,
}

impl BackendClient {
    /// Create a new client against `base_url` (no trailing slash)
    pub fn new(base_url: String, station_capacity: u32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            http,
            base_url,
            station_capacity,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: String) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(Error::Status {
                endpoint: path,
                status: resp.status(),
            });
        }

        Ok(resp.json::<T>().await?)
    }

    async fn get_bytes(&self, path: String) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(Error::Status {
                endpoint: path,
                status: resp.status(),
            });
        }

        Ok(resp.bytes().await?.to_vec())
    }

    /// Raw annotated frame for one camera
    pub async fn frame(&self, room: &str, camera: u32) -> Result<Vec<u8>> {
        self.get_bytes(format!("/frame/{}/{}", room, camera)).await
    }

    /// Behavior-annotated frame for one camera
    pub async fn behavior_frame(&self, room: &str, camera: u32) -> Result<Vec<u8>> {
        self.get_bytes(format!("/behavior-frame/{}/{}", room, camera))
            .await
    }

    /// Occupancy metrics for one camera
    pub async fn metrics(&self, room: &str, camera: u32) -> Result<MetricsData> {
        let data: MetricsData = self.get_json(format!("/data/{}/{}", room, camera)).await?;
        if let Some(ref message) = data.error {
            return Err(Error::Payload(message.clone()));
        }
        Ok(data)
    }

    /// Behavior analysis for one camera
    pub async fn behavior(&self, room: &str, camera: u32) -> Result<BehaviorData> {
        let data: BehaviorData = self
            .get_json(format!("/behavior/{}/{}", room, camera))
            .await?;
        if let Some(ref message) = data.error {
            return Err(Error::Payload(message.clone()));
        }
        Ok(data)
    }

    /// Chart time-series for a room
    pub async fn stats(&self, room: &str) -> Result<ChartSeries> {
        self.get_json(format!("/stats/{}", room)).await
    }

    /// Activity log for a room
    pub async fn activities(&self, room: &str) -> Result<Vec<ActivityEntry>> {
        let resp: ActivitiesResponse = self.get_json(format!("/activities/{}", room)).await?;
        Ok(resp.activities)
    }

    /// Alerts strictly newer than `since_id`
    pub async fn alerts(&self, since_id: u64) -> Result<AlertBatch> {
        self.get_json(format!("/alerts?since_id={}", since_id)).await
    }

    /// Overview of all rooms
    pub async fn overview(&self) -> Result<OverviewData> {
        self.get_json("/overview".to_string()).await
    }

    /// Export snapshot for report generation (on demand, never polled)
    pub async fn export(&self, room: &str) -> Result<ExportData> {
        self.get_json(format!("/export/{}", room)).await
    }
}

impl StreamSource for BackendClient {
    fn fetch_frame_metrics(
        &self,
        room: &str,
        camera: u32,
        mode: DisplayMode,
    ) -> BoxFuture<'static, Result<FrameMetricsData>> {
        let client = self.clone();
        let room = room.to_string();
        let capacity = self.station_capacity;

        Box::pin(async move {
            let frame = match mode {
                DisplayMode::RawCount => client.frame(&room, camera).await?,
                DisplayMode::BehaviorAnalysis => client.behavior_frame(&room, camera).await?,
            };
            let metrics = client.metrics(&room, camera).await?;
            let behavior = match mode {
                DisplayMode::RawCount => None,
                DisplayMode::BehaviorAnalysis => Some(client.behavior(&room, camera).await?),
            };
            let usage = RoomUsage::derive(metrics.num_people, capacity);

            Ok(FrameMetricsData {
                frame,
                metrics,
                behavior,
                usage,
            })
        })
    }

    fn fetch_chart(&self, room: &str) -> BoxFuture<'static, Result<ChartData>> {
        let client = self.clone();
        let room = room.to_string();

        Box::pin(async move {
            let series = client.stats(&room).await?;
            let activities = client.activities(&room).await?;
            Ok(ChartData { series, activities })
        })
    }

    fn fetch_alerts(&self, since_id: u64) -> BoxFuture<'static, Result<AlertBatch>> {
        let client = self.clone();
        Box::pin(async move { client.alerts(since_id).await })
    }

    fn fetch_overview(&self) -> BoxFuture<'static, Result<OverviewData>> {
        let client = self.clone();
        Box::pin(async move { client.overview().await })
    }
}
