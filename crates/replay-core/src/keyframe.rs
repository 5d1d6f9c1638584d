//! Keyframe compilation: four derived events per cycle, bucketed by whole second.

use chrono::{DateTime, Duration, Utc};
use contracts::{PanEventType, TimelineMarker};

use crate::error::{ReplayError, Result};
use crate::normalize::CycleRecord;
use crate::protein::cook_seconds;

pub const WINDOW_PADDING_SECONDS: i64 = 5 * 60;
pub const FILL_LEAD_SECONDS: i64 = 10;
pub const EVENTS_PER_CYCLE: usize = 4;
/// Longest scan-in to scan-out span accepted as a real cycle.
pub const MAX_CYCLE_SECONDS: i64 = 4 * 60 * 60;
/// Longest simulation window a dataset may span.
pub const MAX_WINDOW_SECONDS: u64 = 2 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanEvent {
    pub event_type: PanEventType,
    pub timestamp: DateTime<Utc>,
    /// Index of the originating record in the dataset.
    pub cycle: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyframe {
    pub events: Vec<PanEvent>,
}

impl Keyframe {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The bucket fell outside the simulation window.
    OutsideWindow,
    /// The cycle stops before it starts, or runs longer than [`MAX_CYCLE_SECONDS`].
    ImplausibleCycle,
}

/// An event that is never applied, with the offset it would have had from the window start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEvent {
    pub event: PanEvent,
    pub offset_seconds: i64,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    duration_seconds: u64,
    keyframes: Vec<Keyframe>,
    rejected: Vec<RejectedEvent>,
}

/// The four events of one cycle, in chronological order: cook, fill, start, stop.
pub fn derive_events(cycle: usize, record: &CycleRecord) -> [PanEvent; EVENTS_PER_CYCLE] {
    let start = record.start_timestamp;
    let cook_lead = Duration::seconds(cook_seconds(&record.protein_name) + FILL_LEAD_SECONDS);
    let event = |event_type, timestamp| PanEvent {
        event_type,
        timestamp,
        cycle,
    };
    [
        event(PanEventType::Cook, start - cook_lead),
        event(PanEventType::Fill, start - Duration::seconds(FILL_LEAD_SECONDS)),
        event(PanEventType::Start, start),
        event(PanEventType::Stop, record.stop_timestamp),
    ]
}

/// Whole-second offset from `origin`, rounding halves up.
fn bucket_offset(origin: DateTime<Utc>, timestamp: DateTime<Utc>) -> i64 {
    (timestamp - origin).num_milliseconds().saturating_add(500).div_euclid(1000)
}

fn is_plausible(record: &CycleRecord) -> bool {
    let span = record.stop_timestamp - record.start_timestamp;
    span >= Duration::zero() && span <= Duration::seconds(MAX_CYCLE_SECONDS)
}

impl Timeline {
    /// Buckets the events of every plausible cycle into one keyframe per window second.
    ///
    /// Implausible cycles do not shape the window; their events are reported as rejected.
    pub fn compile(records: &[CycleRecord]) -> Result<Self> {
        let plausible = records.iter().map(is_plausible).collect::<Vec<_>>();
        let kept = || {
            records
                .iter()
                .zip(&plausible)
                .filter(|(_, plausible)| **plausible)
                .map(|(record, _)| record)
        };

        let padding = Duration::seconds(WINDOW_PADDING_SECONDS);
        let (Some(earliest), Some(latest)) = (
            kept().map(|record| record.start_timestamp).min(),
            kept().map(|record| record.stop_timestamp).max(),
        ) else {
            return Err(ReplayError::NoData {
                total_rows: records.len(),
                skipped_rows: records.len(),
            });
        };
        let window_start = earliest - padding;
        let window_end = latest + padding;

        let duration_seconds = (window_end - window_start).num_milliseconds().div_euclid(1000);
        if duration_seconds < 1 {
            return Err(ReplayError::EmptyWindow);
        }
        let duration_seconds = duration_seconds as u64;
        if duration_seconds > MAX_WINDOW_SECONDS {
            return Err(ReplayError::WindowTooLarge {
                seconds: duration_seconds,
                max_seconds: MAX_WINDOW_SECONDS,
            });
        }

        let mut keyframes = vec![Keyframe::default(); duration_seconds as usize];
        let mut rejected = Vec::new();
        for (cycle, (record, plausible)) in records.iter().zip(plausible).enumerate() {
            if !plausible {
                tracing::warn!(
                    protein_pan = %record.protein_pan,
                    start = %record.start_timestamp,
                    stop = %record.stop_timestamp,
                    "cycle span is implausible, rejecting its events"
                );
            }
            for event in derive_events(cycle, record) {
                let offset = bucket_offset(window_start, event.timestamp);
                if !plausible {
                    rejected.push(RejectedEvent {
                        event,
                        offset_seconds: offset,
                        reason: RejectReason::ImplausibleCycle,
                    });
                    continue;
                }
                match usize::try_from(offset)
                    .ok()
                    .and_then(|index| keyframes.get_mut(index))
                {
                    Some(keyframe) => keyframe.events.push(event),
                    None => {
                        tracing::warn!(
                            protein_pan = %record.protein_pan,
                            event_type = %event.event_type,
                            offset,
                            duration_seconds,
                            "event falls outside the simulation window"
                        );
                        rejected.push(RejectedEvent {
                            event,
                            offset_seconds: offset,
                            reason: RejectReason::OutsideWindow,
                        });
                    }
                }
            }
        }

        for keyframe in &mut keyframes {
            keyframe.events.sort_by_key(|event| event.timestamp);
        }

        Ok(Self {
            window_start,
            window_end,
            duration_seconds,
            keyframes,
            rejected,
        })
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    pub fn window_end(&self) -> DateTime<Utc> {
        self.window_end
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    pub fn last_second(&self) -> u64 {
        self.duration_seconds.saturating_sub(1)
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn keyframe(&self, second: u64) -> Option<&Keyframe> {
        usize::try_from(second)
            .ok()
            .and_then(|index| self.keyframes.get(index))
    }

    pub fn rejected(&self) -> &[RejectedEvent] {
        &self.rejected
    }

    pub fn event_count(&self) -> usize {
        self.keyframes.iter().map(|keyframe| keyframe.events.len()).sum()
    }

    pub fn clamp_second(&self, second: i64) -> u64 {
        second.clamp(0, self.last_second() as i64) as u64
    }

    pub fn time_at(&self, second: u64) -> DateTime<Utc> {
        self.window_start + Duration::seconds(second as i64)
    }

    /// One marker per scored cycle, placed at its scan-out on the timeline.
    pub fn markers(&self, records: &[CycleRecord]) -> Vec<TimelineMarker> {
        let total_ms = (self.window_end - self.window_start).num_milliseconds().max(1) as f64;
        records
            .iter()
            .filter(|record| is_plausible(record))
            .filter_map(|record| {
                let severity = record.target_zone.marker_severity()?;
                let offset_ms =
                    (record.stop_timestamp - self.window_start).num_milliseconds() as f64;
                Some(TimelineMarker {
                    second: offset_ms / total_ms * self.duration_seconds as f64,
                    severity,
                    protein_pan: record.protein_pan.clone(),
                    stop_timestamp: record.stop_timestamp,
                    target_zone: record.target_zone,
                })
            })
            .collect()
    }
}
