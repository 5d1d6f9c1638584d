use chrono::{DateTime, Utc};
use contracts::{
    EventRef, MachineView, NotificationView, PanLocation, PanView, ReplaySnapshot, ReplaySummary,
    SCHEMA_VERSION_V1,
};

use super::apply::HOLDING_MINUTES;
use super::ReplayEngine;
use crate::keyframe::PanEvent;
use crate::normalize::NormalizeReport;
use crate::protein::pan_label;
use crate::registry::{Machine, Pan};

fn whole_seconds_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (deadline - now).num_milliseconds().div_euclid(1000)
}

fn pan_view(pan: &Pan, now: DateTime<Utc>) -> PanView {
    let holding_expiry = pan
        .expire_date
        .filter(|_| pan.location == PanLocation::Holding);
    PanView {
        protein_pan: pan.protein_pan.clone(),
        protein_name: pan.protein_name.clone(),
        display_name: pan_label(&pan.protein_name, &pan.protein_pan, true),
        location: pan.location,
        x: pan.position.x,
        y: pan.position.y,
        next_x: pan.next.map(|next| next.x),
        next_y: pan.next.map(|next| next.y),
        expire_date: pan.expire_date,
        expires_in_seconds: holding_expiry
            .map(|expiry| whole_seconds_until(expiry, now).min(HOLDING_MINUTES * 60)),
        expired: holding_expiry.is_some_and(|expiry| now >= expiry),
    }
}

fn machine_view(slot: usize, machine: &Machine, now: DateTime<Utc>) -> MachineView {
    MachineView {
        slot,
        open_mode: machine.open_mode,
        cooking: machine.cooking,
        cooking_protein: machine.cooking_protein.clone(),
        cooking_finish_time: machine.cooking_finish_time,
        remaining_seconds: machine
            .cooking_finish_time
            .filter(|_| machine.cooking)
            .map(|finish| whole_seconds_until(finish, now).max(0)),
    }
}

impl ReplayEngine {
    pub fn simulation_time(&self) -> DateTime<Utc> {
        self.timeline.time_at(self.current_second)
    }

    fn event_ref(&self, event: &PanEvent) -> Option<EventRef> {
        let record = self.dataset.records.get(event.cycle)?;
        Some(EventRef {
            event_type: event.event_type,
            timestamp: event.timestamp,
            protein_pan: record.protein_pan.clone(),
            protein_name: record.protein_name.clone(),
            target_zone: record.target_zone,
        })
    }

    /// Committed registry state plus the pending transitions of the current frame.
    pub fn snapshot(&self) -> ReplaySnapshot {
        let now = self.simulation_time();
        let registry = &self.registry;
        ReplaySnapshot {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            location_id: self.dataset.location_id.clone(),
            second: self.current_second,
            duration_seconds: self.timeline.duration_seconds(),
            simulation_time: now,
            transition_progress: 0.0,
            current_breader: registry.current_breader().map(str::to_string),
            pans: registry.pans().iter().map(|pan| pan_view(pan, now)).collect(),
            machines: registry
                .machines()
                .iter()
                .enumerate()
                .map(|(slot, machine)| machine_view(slot, machine, now))
                .collect(),
            notifications: registry
                .notifications()
                .iter()
                .filter_map(|notification| {
                    Some(NotificationView {
                        message: notification.message.clone(),
                        remaining_frames: notification.duration,
                        event: self.event_ref(&notification.event)?,
                    })
                })
                .collect(),
        }
    }

    /// Dataset and window facts. Row counts are zero when the engine was built from records.
    pub fn summary(&self, report: Option<&NormalizeReport>) -> ReplaySummary {
        ReplaySummary {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            location_id: self.dataset.location_id.clone(),
            date: self.dataset.date,
            cycle_count: self.dataset.records.len(),
            pan_count: self.registry.pans().len(),
            event_count: self.timeline.event_count(),
            rejected_event_count: self.timeline.rejected().len(),
            skipped_row_count: report.map_or(0, |report| report.skipped.len()),
            duplicate_row_count: report.map_or(0, |report| report.duplicate_rows),
            window_start: self.timeline.window_start(),
            window_end: self.timeline.window_end(),
            duration_seconds: self.timeline.duration_seconds(),
            config: self.config(),
        }
    }
}
