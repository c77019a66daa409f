//! SessionController - Navigation State Machine
//!
//! ## Responsibilities
//!
//! - Idle ⇄ Active(room, camera, mode) transitions
//! - Ownership of the live poll loops for the current context (registry)
//! - Camera switching with wraparound, display mode toggling
//! - Stale-result discard: every fetch is tagged with the context
//!   generation at dispatch, results from abandoned contexts are dropped
//!
//! The controller is the only writer of the session context. Loops read
//! it through dispatch-time [`ContextTag`]s and never mutate it. The
//! overview loop is started once at client init and survives every room
//! transition.

use crate::alert_tracker::AlertTracker;
use crate::backend_client::{AlertBatch, StreamPayload, StreamSource};
use crate::error::{Error, Result};
use crate::models::{
    CameraDirection, ContextTag, DisplayMode, RoomId, SessionContext, StreamId,
};
use crate::poll_loop::{ApplyFn, FetchFn, PollLoop, TickOutcome};
use crate::snapshot::SnapshotStore;
use crate::view_hub::{ViewHub, ViewMessage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cadence and room-shape settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Number of cameras per room, wraparound bound for switching
    pub total_cameras: u32,
    pub frame_period: Duration,
    pub chart_period: Duration,
    pub alert_period: Duration,
    pub overview_period: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            total_cameras: 2,
            frame_period: Duration::from_millis(2000),
            chart_period: Duration::from_millis(2000),
            alert_period: Duration::from_millis(3000),
            overview_period: Duration::from_millis(8000),
        }
    }
}

impl SessionSettings {
    fn period_for(&self, stream: StreamId) -> Duration {
        match stream {
            StreamId::FrameMetrics => self.frame_period,
            StreamId::Chart => self.chart_period,
            StreamId::Alerts => self.alert_period,
            StreamId::Overview => self.overview_period,
        }
    }
}

/// SessionController instance
pub struct SessionController {
    settings: SessionSettings,
    source: Arc<dyn StreamSource>,
    snapshots: Arc<SnapshotStore>,
    alerts: Arc<AlertTracker>,
    hub: Arc<ViewHub>,
    context: RwLock<SessionContext>,
    /// Bumped on every transition; stamps [`ContextTag`]s for staleness
    generation: AtomicU64,
    /// Live room loops, keyed by stream (empty while Idle)
    loops: RwLock<HashMap<StreamId, Arc<PollLoop>>>,
    overview: Arc<PollLoop>,
}

impl SessionController {
    /// Create a new controller (no loops running yet)
    pub fn new(
        settings: SessionSettings,
        source: Arc<dyn StreamSource>,
        snapshots: Arc<SnapshotStore>,
        alerts: Arc<AlertTracker>,
        hub: Arc<ViewHub>,
    ) -> Arc<Self> {
        let overview = Arc::new(PollLoop::new(
            StreamId::Overview,
            settings.overview_period,
        ));
        Arc::new(Self {
            settings,
            source,
            snapshots,
            alerts,
            hub,
            context: RwLock::new(SessionContext::default()),
            generation: AtomicU64::new(0),
            loops: RwLock::new(HashMap::new()),
            overview,
        })
    }

    /// Current navigation context
    pub async fn context(&self) -> SessionContext {
        self.context.read().await.clone()
    }

    /// Start the room-independent overview loop (client init)
    pub async fn start_overview(self: &Arc<Self>) {
        self.overview
            .start(self.make_fetch(StreamId::Overview), self.make_apply())
            .await;
        tracing::info!(
            period_ms = self.settings.overview_period.as_millis() as u64,
            "Overview loop started"
        );
    }

    /// Enter a room, starting its full loop set
    ///
    /// Re-entrant safe: entering while already active tears the previous
    /// room's loops down first. No loop of the old room is still armed
    /// when this returns.
    pub async fn enter_room(self: &Arc<Self>, room: impl Into<RoomId>) {
        let room = room.into();

        self.stop_room_loops().await;

        {
            let mut context = self.context.write().await;
            context.room = Some(room.clone());
            context.camera = 1;
            context.mode = DisplayMode::BehaviorAnalysis;
        }
        let generation = self.bump_generation();
        self.alerts.reset();
        self.snapshots.clear_room_streams().await;

        tracing::info!(room = %room, generation, "Entering room");

        let apply = self.make_apply();
        {
            let mut loops = self.loops.write().await;
            for stream in StreamId::ROOM_SET {
                let poll = Arc::new(PollLoop::new(stream, self.settings.period_for(stream)));
                poll.start(self.make_fetch(stream), apply.clone()).await;
                loops.insert(stream, poll);
            }
        }

        self.broadcast_context().await;
    }

    /// Leave the active room, returning to Idle
    ///
    /// No-op when already Idle.
    pub async fn leave_room(&self) {
        let room = {
            let context = self.context.read().await;
            match context.room {
                Some(ref room) => room.clone(),
                None => return,
            }
        };

        self.stop_room_loops().await;

        {
            let mut context = self.context.write().await;
            context.room = None;
            context.camera = 1;
        }
        let generation = self.bump_generation();
        self.alerts.reset();
        self.snapshots.clear_room_streams().await;

        tracing::info!(room = %room, generation, "Left room");
        self.broadcast_context().await;
    }

    /// Switch the selected camera, wrapping over `[1, total_cameras]`
    ///
    /// Triggers an immediate out-of-band frame refresh so the view does
    /// not wait for the next period.
    pub async fn switch_camera(&self, direction: CameraDirection) -> Result<u32> {
        let total = self.settings.total_cameras;
        let camera = {
            let mut context = self.context.write().await;
            if context.room.is_none() {
                return Err(Error::NoRoomSelected("camera switch".to_string()));
            }
            context.camera = match direction {
                CameraDirection::Next => {
                    if context.camera < total {
                        context.camera + 1
                    } else {
                        1
                    }
                }
                CameraDirection::Previous => {
                    if context.camera > 1 {
                        context.camera - 1
                    } else {
                        total
                    }
                }
            };
            context.camera
        };
        self.bump_generation();

        tracing::debug!(camera, total, "Camera switched");
        self.refresh_stream(StreamId::FrameMetrics).await;
        self.broadcast_context().await;

        Ok(camera)
    }

    /// Flip the frame display mode
    ///
    /// Immediate frame refresh; the periodic schedule is undisturbed.
    pub async fn toggle_display_mode(&self) -> Result<DisplayMode> {
        let mode = {
            let mut context = self.context.write().await;
            if context.room.is_none() {
                return Err(Error::NoRoomSelected("display mode toggle".to_string()));
            }
            context.mode = context.mode.toggled();
            context.mode
        };
        self.bump_generation();

        tracing::debug!(mode = ?mode, "Display mode toggled");
        self.refresh_stream(StreamId::FrameMetrics).await;
        self.broadcast_context().await;

        Ok(mode)
    }

    /// Manual refresh of the active room's streams (frame + chart)
    pub async fn refresh_room(&self) -> Result<()> {
        if self.context.read().await.room.is_none() {
            return Err(Error::NoRoomSelected("manual refresh".to_string()));
        }
        self.refresh_stream(StreamId::FrameMetrics).await;
        self.refresh_stream(StreamId::Chart).await;
        Ok(())
    }

    /// Stop every loop, including the overview (client shutdown)
    pub async fn shutdown(&self) {
        self.leave_room().await;
        self.overview.stop().await;
        tracing::info!("Session controller shut down");
    }

    /// Whether a stream's loop is currently armed
    pub async fn is_loop_running(&self, stream: StreamId) -> bool {
        if stream == StreamId::Overview {
            return self.overview.is_running().await;
        }
        match self.loops.read().await.get(&stream) {
            Some(poll) => poll.is_running().await,
            None => false,
        }
    }

    async fn stop_room_loops(&self) {
        let drained: Vec<(StreamId, Arc<PollLoop>)> =
            self.loops.write().await.drain().collect();
        for (stream, poll) in drained {
            poll.stop().await;
            tracing::debug!(stream = %stream, "Room loop stopped");
        }
    }

    async fn refresh_stream(&self, stream: StreamId) {
        if let Some(poll) = self.loops.read().await.get(&stream) {
            poll.refresh_now();
        }
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    async fn broadcast_context(&self) {
        let context = self.context.read().await.clone();
        self.hub.broadcast(ViewMessage::ContextChanged(context)).await;
    }

    /// Context copy stamped with the current generation, taken at dispatch
    async fn current_tag(&self) -> ContextTag {
        let context = self.context.read().await;
        ContextTag::new(&context, self.generation.load(Ordering::Acquire))
    }

    /// Freshness check for a resolved fetch
    ///
    /// Any transition bumps the generation, so results dispatched under an
    /// abandoned room/camera/mode never reach the view. The overview
    /// stream is exempt; it is not tied to room context.
    fn is_fresh(&self, outcome: &TickOutcome) -> bool {
        outcome.stream == StreamId::Overview
            || outcome.tag.generation == self.generation.load(Ordering::Acquire)
    }

    fn make_apply(self: &Arc<Self>) -> ApplyFn {
        let controller = self.clone();
        Arc::new(move |outcome| {
            let controller = controller.clone();
            Box::pin(async move { controller.apply_outcome(outcome).await })
        })
    }

    async fn apply_outcome(&self, outcome: TickOutcome) {
        if !self.is_fresh(&outcome) {
            // Expected race, not a fault: the context moved on while the
            // fetch was in flight.
            tracing::trace!(
                stream = %outcome.stream,
                tag_generation = outcome.tag.generation,
                "Discarding stale fetch result"
            );
            return;
        }

        match outcome.payload {
            Ok(StreamPayload::Alerts(batch)) => {
                let latest_id = batch.latest_id;
                let fresh = self.alerts.ingest(batch);
                let snapshot = self
                    .snapshots
                    .record_success(
                        StreamId::Alerts,
                        StreamPayload::Alerts(AlertBatch {
                            alerts: fresh.clone(),
                            latest_id,
                        }),
                    )
                    .await;
                self.hub
                    .broadcast(ViewMessage::SnapshotUpdated(snapshot))
                    .await;
                if !fresh.is_empty() {
                    self.hub.broadcast(ViewMessage::FreshAlerts(fresh)).await;
                }
            }
            Ok(payload) => {
                let snapshot = self.snapshots.record_success(outcome.stream, payload).await;
                self.hub
                    .broadcast(ViewMessage::SnapshotUpdated(snapshot))
                    .await;
            }
            Err(error) => {
                if error.is_soft() {
                    tracing::debug!(stream = %outcome.stream, error = %error, "Backend reported degraded data");
                } else {
                    tracing::warn!(stream = %outcome.stream, error = %error, "Stream fetch failed");
                }
                let snapshot = self
                    .snapshots
                    .record_failure(outcome.stream, error.to_string())
                    .await;
                self.hub
                    .broadcast(ViewMessage::SnapshotUpdated(snapshot))
                    .await;
            }
        }
    }

    fn make_fetch(self: &Arc<Self>, stream: StreamId) -> FetchFn {
        let controller = self.clone();
        Arc::new(move || {
            let controller = controller.clone();
            Box::pin(async move {
                let tag = controller.current_tag().await;
                let payload = controller.fetch_for(stream, &tag).await;
                TickOutcome {
                    stream,
                    tag,
                    payload,
                }
            })
        })
    }

    async fn fetch_for(&self, stream: StreamId, tag: &ContextTag) -> Result<StreamPayload> {
        match stream {
            StreamId::FrameMetrics => {
                let room = tag
                    .room
                    .as_deref()
                    .ok_or_else(|| Error::NoRoomSelected("frame fetch".to_string()))?;
                self.source
                    .fetch_frame_metrics(room, tag.camera, tag.mode)
                    .await
                    .map(StreamPayload::FrameMetrics)
            }
            StreamId::Chart => {
                let room = tag
                    .room
                    .as_deref()
                    .ok_or_else(|| Error::NoRoomSelected("chart fetch".to_string()))?;
                self.source.fetch_chart(room).await.map(StreamPayload::Chart)
            }
            StreamId::Alerts => self
                .source
                .fetch_alerts(self.alerts.since_id())
                .await
                .map(StreamPayload::Alerts),
            StreamId::Overview => self
                .source
                .fetch_overview()
                .await
                .map(StreamPayload::Overview),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend_client::{
        Alert, AlertKind, ChartData, ChartSeries, FrameMetricsData, MetricsData, OverviewData,
    };
    use crate::models::RoomUsage;
    use futures::future::BoxFuture;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Scriptable backend stub
    ///
    /// Frame fetches encode the requested room in `num_people` via
    /// `room_people` so tests can tell whose data landed in a snapshot.
    struct StubSource {
        frame_delay: Duration,
        alert_delay: Duration,
        room_people: StdMutex<HashMap<String, u32>>,
        frame_fetches: StdMutex<Vec<(String, u32, DisplayMode)>>,
        alert_since_ids: StdMutex<Vec<u64>>,
        alert_script: StdMutex<VecDeque<AlertBatch>>,
    }

    impl StubSource {
        fn new() -> Arc<Self> {
            Self::with_delays(Duration::ZERO, Duration::ZERO)
        }

        fn with_frame_delay(delay: Duration) -> Arc<Self> {
            Self::with_delays(delay, Duration::ZERO)
        }

        fn with_alert_delay(delay: Duration) -> Arc<Self> {
            Self::with_delays(Duration::ZERO, delay)
        }

        fn with_delays(frame_delay: Duration, alert_delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                frame_delay,
                alert_delay,
                room_people: StdMutex::new(HashMap::new()),
                frame_fetches: StdMutex::new(Vec::new()),
                alert_since_ids: StdMutex::new(Vec::new()),
                alert_script: StdMutex::new(VecDeque::new()),
            })
        }

        fn set_people(&self, room: &str, count: u32) {
            self.room_people
                .lock()
                .unwrap()
                .insert(room.to_string(), count);
        }

        fn script_alerts(&self, batch: AlertBatch) {
            self.alert_script.lock().unwrap().push_back(batch);
        }

        fn frame_fetch_count(&self) -> usize {
            self.frame_fetches.lock().unwrap().len()
        }
    }

    impl StreamSource for StubSource {
        fn fetch_frame_metrics(
            &self,
            room: &str,
            camera: u32,
            mode: DisplayMode,
        ) -> BoxFuture<'static, Result<FrameMetricsData>> {
            self.frame_fetches
                .lock()
                .unwrap()
                .push((room.to_string(), camera, mode));
            let num_people = self
                .room_people
                .lock()
                .unwrap()
                .get(room)
                .copied()
                .unwrap_or(0);
            let delay = self.frame_delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(FrameMetricsData {
                    frame: vec![0xFF, 0xD8],
                    metrics: MetricsData {
                        num_people,
                        avg_confidence: 90.0,
                        detected_objects: num_people,
                        error: None,
                    },
                    behavior: None,
                    usage: RoomUsage::derive(num_people, 30),
                })
            })
        }

        fn fetch_chart(&self, _room: &str) -> BoxFuture<'static, Result<ChartData>> {
            Box::pin(async move {
                Ok(ChartData {
                    series: ChartSeries::default(),
                    activities: Vec::new(),
                })
            })
        }

        fn fetch_alerts(&self, since_id: u64) -> BoxFuture<'static, Result<AlertBatch>> {
            self.alert_since_ids.lock().unwrap().push(since_id);
            let batch = self
                .alert_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();
            let delay = self.alert_delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(batch)
            })
        }

        fn fetch_overview(&self) -> BoxFuture<'static, Result<OverviewData>> {
            Box::pin(async move { Ok(OverviewData::default()) })
        }
    }

    fn controller_with(source: Arc<StubSource>) -> Arc<SessionController> {
        SessionController::new(
            SessionSettings::default(),
            source,
            Arc::new(SnapshotStore::new()),
            Arc::new(AlertTracker::new()),
            Arc::new(ViewHub::new()),
        )
    }

    fn snapshot_people(snapshot: &crate::snapshot::StreamSnapshot) -> Option<u32> {
        match snapshot.data {
            Some(StreamPayload::FrameMetrics(ref data)) => Some(data.metrics.num_people),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_wraparound_two_cameras() {
        let controller = controller_with(StubSource::new());
        controller.enter_room("lab1").await;

        assert_eq!(controller.context().await.camera, 1);
        assert_eq!(
            controller.switch_camera(CameraDirection::Next).await.unwrap(),
            2
        );
        assert_eq!(
            controller.switch_camera(CameraDirection::Next).await.unwrap(),
            1,
            "next past the last camera wraps to 1"
        );
        assert_eq!(
            controller
                .switch_camera(CameraDirection::Previous)
                .await
                .unwrap(),
            2,
            "previous from camera 1 wraps to the last camera"
        );
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_then_previous_returns_to_start() {
        let controller = controller_with(StubSource::new());
        controller.enter_room("lab1").await;

        let start = controller.context().await.camera;
        controller.switch_camera(CameraDirection::Next).await.unwrap();
        controller
            .switch_camera(CameraDirection::Previous)
            .await
            .unwrap();
        assert_eq!(controller.context().await.camera, start);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_switch_requires_active_room() {
        let controller = controller_with(StubSource::new());
        let result = controller.switch_camera(CameraDirection::Next).await;
        assert!(matches!(result, Err(Error::NoRoomSelected(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reenter_before_first_tick_leaves_one_loop_set() {
        let source = StubSource::with_frame_delay(Duration::from_millis(500));
        source.set_people("lab1", 11);
        source.set_people("lab2", 22);
        let controller = controller_with(source.clone());

        controller.enter_room("lab1").await;
        controller.enter_room("lab2").await;

        // Exactly one set of room loops is armed.
        assert_eq!(controller.loops.read().await.len(), StreamId::ROOM_SET.len());
        for stream in StreamId::ROOM_SET {
            assert!(controller.is_loop_running(stream).await);
        }
        assert_eq!(controller.context().await.room.as_deref(), Some("lab2"));

        // Let the lab1 in-flight fetch resolve; it must never reach the view.
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let snapshot = controller
            .snapshots
            .get(StreamId::FrameMetrics)
            .await
            .expect("lab2 fetch should have landed");
        assert_eq!(snapshot_people(&snapshot), Some(22));
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_room_twice_is_noop() {
        let controller = controller_with(StubSource::new());
        controller.enter_room("lab1").await;

        controller.leave_room().await;
        assert!(controller.context().await.room.is_none());
        assert!(controller.loops.read().await.is_empty());

        // Second leave from Idle: no panic, still Idle.
        controller.leave_room().await;
        assert!(controller.context().await.room.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_poll_advances_watermark_to_latest_id() {
        let source = StubSource::new();
        source.script_alerts(AlertBatch {
            alerts: vec![Alert {
                id: 3,
                kind: AlertKind::Warning,
                message: "low attention".to_string(),
                timestamp: None,
            }],
            latest_id: Some(5),
        });
        let controller = controller_with(source.clone());

        controller.enter_room("lab1").await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(controller.alerts.since_id(), 5, "watermark follows latest_id");

        // Next alert poll (3s period) must request since_id=5.
        tokio::time::sleep(Duration::from_millis(3000)).await;
        let since_ids = source.alert_since_ids.lock().unwrap().clone();
        assert_eq!(since_ids, vec![0, 5]);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_room_discards_late_alert_result() {
        let source = StubSource::with_alert_delay(Duration::from_millis(500));
        source.script_alerts(AlertBatch {
            alerts: vec![],
            latest_id: Some(9),
        });
        let controller = controller_with(source.clone());

        controller.enter_room("lab1").await;
        // Leave while the first alert poll is still in flight.
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.leave_room().await;
        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert_eq!(
            controller.alerts.since_id(),
            0,
            "late alert batch must not advance the cleared watermark"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_mode_refreshes_without_waiting_period() {
        let source = StubSource::new();
        let controller = controller_with(source.clone());

        controller.enter_room("lab1").await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        let before = source.frame_fetch_count();

        let mode = controller.toggle_display_mode().await.unwrap();
        assert_eq!(mode, DisplayMode::RawCount);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            source.frame_fetch_count(),
            before + 1,
            "mode toggle must refresh immediately, not at the next period"
        );

        let fetches = source.frame_fetches.lock().unwrap().clone();
        assert_eq!(fetches.last().unwrap().2, DisplayMode::RawCount);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_switch_discards_in_flight_frame_result() {
        let source = StubSource::with_frame_delay(Duration::from_millis(500));
        source.set_people("lab1", 11);
        let controller = controller_with(source.clone());

        controller.enter_room("lab1").await;
        // Switch while the camera-1 fetch is still in flight; its result is
        // tagged with the old generation and must never land.
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.switch_camera(CameraDirection::Next).await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(
            controller.snapshots.get(StreamId::FrameMetrics).await.is_none(),
            "camera-1 result resolved after the switch must be discarded"
        );

        // The next periodic tick fetches camera 2 and lands normally.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let snapshot = controller.snapshots.get(StreamId::FrameMetrics).await;
        assert!(snapshot.is_some());
        let fetches = source.frame_fetches.lock().unwrap().clone();
        assert_eq!(fetches.last().unwrap().1, 2);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_overview_loop_survives_room_transitions() {
        let controller = controller_with(StubSource::new());
        controller.start_overview().await;

        controller.enter_room("lab1").await;
        assert!(controller.is_loop_running(StreamId::Overview).await);

        controller.leave_room().await;
        assert!(controller.is_loop_running(StreamId::Overview).await);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(
            controller.snapshots.get(StreamId::Overview).await.is_some(),
            "overview results apply regardless of room transitions"
        );
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_room_requires_active_room() {
        let controller = controller_with(StubSource::new());
        assert!(matches!(
            controller.refresh_room().await,
            Err(Error::NoRoomSelected(_))
        ));

        controller.enter_room("lab1").await;
        assert!(controller.refresh_room().await.is_ok());
        controller.shutdown().await;
    }
}
