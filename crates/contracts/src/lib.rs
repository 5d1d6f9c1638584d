//! v1 cross-boundary contracts for the replay core, API, and renderers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod snapshot;

pub use snapshot::{
    EventRef, MachineView, NotificationView, PanView, PlaybackStatus, ReplaySnapshot,
    ReplaySummary,
};

pub const SCHEMA_VERSION_V1: &str = "1.0";
pub const MACHINE_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReplayConfig {
    /// Spicy machines occupy the left three slots and spicy pans sort first.
    pub spicy_left: bool,
    /// Queued pans step forward when the pan ahead of them leaves the queue.
    pub use_breading_queue: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            spicy_left: true,
            use_breading_queue: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PanLocation {
    #[default]
    Unknown,
    Queue,
    Funnel,
    Holding,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TargetZone {
    TooLittle,
    SlightlyTooLittle,
    OnTarget,
    SlightlyTooMuch,
    TooMuch,
    #[default]
    Unknown,
}

impl TargetZone {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::TooLittle,
            1 => Self::SlightlyTooLittle,
            2 => Self::OnTarget,
            3 => Self::SlightlyTooMuch,
            4 => Self::TooMuch,
            _ => Self::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::TooLittle => "Too Little",
            Self::SlightlyTooLittle => "Slightly Too Little",
            Self::OnTarget => "On Target",
            Self::SlightlyTooMuch => "Slightly Too Much",
            Self::TooMuch => "Too Much",
            Self::Unknown => "",
        }
    }

    /// How the scan-out compared to ideal cook completion.
    pub fn scan_out_description(self) -> &'static str {
        match self {
            Self::TooLittle => "Early",
            Self::SlightlyTooLittle => "Slightly Early",
            Self::OnTarget => "On Time",
            Self::SlightlyTooMuch => "Slightly Late",
            Self::TooMuch => "Late",
            Self::Unknown => "",
        }
    }

    pub fn marker_severity(self) -> Option<MarkerSeverity> {
        match self {
            Self::TooLittle | Self::TooMuch => Some(MarkerSeverity::Critical),
            Self::SlightlyTooLittle | Self::SlightlyTooMuch => Some(MarkerSeverity::Warning),
            Self::OnTarget => Some(MarkerSeverity::OnTarget),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PanEventType {
    Cook,
    Fill,
    Start,
    Stop,
}

impl PanEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cook => "cook",
            Self::Fill => "fill",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for PanEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarkerSeverity {
    Critical,
    Warning,
    OnTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineMarker {
    /// Fractional second on the timeline where the cycle was scanned out.
    pub second: f64,
    pub severity: MarkerSeverity,
    pub protein_pan: String,
    pub stop_timestamp: DateTime<Utc>,
    pub target_zone: TargetZone,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ReplayNotFound,
    InvalidRequest,
    NoData,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}
