//! Read-only views handed to renderers and API clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PanEventType, PanLocation, ReplayConfig, TargetZone};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PanView {
    pub protein_pan: String,
    pub protein_name: String,
    pub display_name: String,
    pub location: PanLocation,
    pub x: f32,
    pub y: f32,
    pub next_x: Option<f32>,
    pub next_y: Option<f32>,
    pub expire_date: Option<DateTime<Utc>>,
    /// Seconds left in the holding cabinet, capped at the holding time. Negative once expired.
    pub expires_in_seconds: Option<i64>,
    pub expired: bool,
}

impl PanView {
    pub fn is_transitioning(&self) -> bool {
        self.next_x.is_some() || self.next_y.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MachineView {
    pub slot: usize,
    pub open_mode: bool,
    pub cooking: bool,
    pub cooking_protein: Option<String>,
    pub cooking_finish_time: Option<DateTime<Utc>>,
    pub remaining_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRef {
    pub event_type: PanEventType,
    pub timestamp: DateTime<Utc>,
    pub protein_pan: String,
    pub protein_name: String,
    pub target_zone: TargetZone,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationView {
    pub message: String,
    pub remaining_frames: f32,
    pub event: EventRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplaySnapshot {
    pub schema_version: String,
    pub location_id: String,
    pub second: u64,
    pub duration_seconds: u64,
    pub simulation_time: DateTime<Utc>,
    /// Progress of the render animation for pans carrying `next_x/next_y`, in `[0, 1]`.
    pub transition_progress: f32,
    pub current_breader: Option<String>,
    pub pans: Vec<PanView>,
    pub machines: Vec<MachineView>,
    pub notifications: Vec<NotificationView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackStatus {
    pub schema_version: String,
    pub second: u64,
    pub duration_seconds: u64,
    pub playing: bool,
    pub speed: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub simulation_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplaySummary {
    pub schema_version: String,
    pub location_id: String,
    pub date: DateTime<Utc>,
    pub cycle_count: usize,
    pub pan_count: usize,
    pub event_count: usize,
    pub rejected_event_count: usize,
    pub skipped_row_count: usize,
    pub duplicate_row_count: usize,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub duration_seconds: u64,
    pub config: ReplayConfig,
}
