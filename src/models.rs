//! Shared domain types
//!
//! Value types used across the orchestrator: stream identities, the
//! session context and its dispatch-time tag, and derived room usage.

use serde::{Deserialize, Serialize};

/// Room identifier (e.g. "lab1")
pub type RoomId = String;

/// Logical polled stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamId {
    /// Camera frame + occupancy/behavior metrics for the selected camera
    FrameMetrics,
    /// Chart time-series, bundled with the activity log refresh
    Chart,
    /// Incremental alert feed
    Alerts,
    /// Room overview grid, independent of the selected room
    Overview,
}

impl StreamId {
    /// Streams started per room on `enter_room`, in start order
    pub const ROOM_SET: [StreamId; 3] = [StreamId::FrameMetrics, StreamId::Chart, StreamId::Alerts];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamId::FrameMetrics => "frame_metrics",
            StreamId::Chart => "chart",
            StreamId::Alerts => "alerts",
            StreamId::Overview => "overview",
        }
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame display mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Raw annotated frame with person-count overlay
    RawCount,
    /// Behavior-analysis frame with attention overlay
    BehaviorAnalysis,
}

impl DisplayMode {
    pub fn toggled(self) -> Self {
        match self {
            DisplayMode::RawCount => DisplayMode::BehaviorAnalysis,
            DisplayMode::BehaviorAnalysis => DisplayMode::RawCount,
        }
    }
}

/// Camera switch direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraDirection {
    Next,
    Previous,
}

/// Current navigation context
///
/// Mutated only by the SessionController; loops receive immutable
/// [`ContextTag`] copies at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Selected room, `None` while on the overview screen
    pub room: Option<RoomId>,
    /// Selected camera, always in `[1, total_cameras]`
    pub camera: u32,
    /// Current frame display mode
    pub mode: DisplayMode,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            room: None,
            camera: 1,
            mode: DisplayMode::BehaviorAnalysis,
        }
    }
}

/// Immutable copy of the context taken when a fetch is dispatched
///
/// `generation` is the controller's transition counter at dispatch time;
/// a result whose tag generation no longer matches is stale and must be
/// discarded instead of rendered. The overview stream is tagged with
/// [`ContextTag::overview`] and is exempt from the generation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextTag {
    pub room: Option<RoomId>,
    pub camera: u32,
    pub mode: DisplayMode,
    pub generation: u64,
}

impl ContextTag {
    pub fn new(context: &SessionContext, generation: u64) -> Self {
        Self {
            room: context.room.clone(),
            camera: context.camera,
            mode: context.mode,
            generation,
        }
    }

    /// Tag for the room-independent overview stream
    pub fn overview() -> Self {
        Self {
            room: None,
            camera: 0,
            mode: DisplayMode::RawCount,
            generation: 0,
        }
    }
}

/// Derived workstation usage for a room
///
/// The room has a fixed number of workstations; occupancy is clamped to
/// capacity so a crowded room never reports negative free seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUsage {
    pub capacity: u32,
    pub used: u32,
    pub free: u32,
    pub usage_percent: u32,
}

impl RoomUsage {
    /// Derive usage from a detected people count
    pub fn derive(num_people: u32, capacity: u32) -> Self {
        let used = num_people.min(capacity);
        let free = capacity - used;
        let usage_percent = if capacity == 0 {
            0
        } else {
            ((used as f64 / capacity as f64) * 100.0).round() as u32
        };
        Self {
            capacity,
            used,
            free,
            usage_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_clamps_over_capacity() {
        let usage = RoomUsage::derive(35, 30);
        assert_eq!(usage.used, 30);
        assert_eq!(usage.free, 0);
        assert_eq!(usage.usage_percent, 100);
    }

    #[test]
    fn test_usage_partial_room() {
        let usage = RoomUsage::derive(12, 30);
        assert_eq!(usage.used, 12);
        assert_eq!(usage.free, 18);
        assert_eq!(usage.usage_percent, 40);
    }

    #[test]
    fn test_usage_empty_and_zero_capacity() {
        let empty = RoomUsage::derive(0, 30);
        assert_eq!(empty.used, 0);
        assert_eq!(empty.free, 30);
        assert_eq!(empty.usage_percent, 0);

        let degenerate = RoomUsage::derive(5, 0);
        assert_eq!(degenerate.usage_percent, 0);
    }

    #[test]
    fn test_display_mode_toggle_round_trip() {
        let mode = DisplayMode::BehaviorAnalysis;
        assert_eq!(mode.toggled().toggled(), mode);
    }
}
