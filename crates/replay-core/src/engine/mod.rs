//! State reconstruction: replays keyframes into the entity registry up to a target second.
//!
//! Frames strictly before the target are fully resolved (events applied, notifications
//! decayed, pending positions committed). The events of the target frame are applied but left
//! in their transition state so a renderer can animate them.

mod apply;
mod snapshot;

use contracts::{ReplayConfig, TimelineMarker};

use crate::error::Result;
use crate::keyframe::Timeline;
use crate::normalize::{normalize_rows, NormalizeReport, RawRow, ReplayDataset};
use crate::registry::EntityRegistry;

pub use apply::EventOutcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeekReport {
    pub from_second: u64,
    pub to_second: u64,
    pub full_rebuild: bool,
    pub replayed_frames: u64,
    pub applied_events: u64,
    pub repeated_events: u64,
    pub skipped_events: u64,
}

#[derive(Debug, Clone)]
pub struct ReplayEngine {
    dataset: ReplayDataset,
    timeline: Timeline,
    registry: EntityRegistry,
    current_second: u64,
}

impl ReplayEngine {
    pub fn new(dataset: ReplayDataset, config: ReplayConfig) -> Result<Self> {
        let timeline = Timeline::compile(&dataset.records)?;
        let registry = EntityRegistry::new(&dataset.records, config);
        tracing::info!(
            location_id = %dataset.location_id,
            cycles = dataset.records.len(),
            pans = registry.pans().len(),
            events = timeline.event_count(),
            rejected = timeline.rejected().len(),
            duration_seconds = timeline.duration_seconds(),
            "replay dataset loaded"
        );
        Ok(Self {
            dataset,
            timeline,
            registry,
            current_second: 0,
        })
    }

    /// Normalizes raw rows and builds an engine positioned at second zero.
    pub fn from_rows(rows: &[RawRow], config: ReplayConfig) -> Result<(Self, NormalizeReport)> {
        let report = normalize_rows(rows)?;
        let engine = Self::new(report.dataset.clone(), config)?;
        Ok((engine, report))
    }

    pub fn dataset(&self) -> &ReplayDataset {
        &self.dataset
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn config(&self) -> ReplayConfig {
        self.registry.config()
    }

    pub fn current_second(&self) -> u64 {
        self.current_second
    }

    pub fn markers(&self) -> Vec<TimelineMarker> {
        self.timeline.markers(&self.dataset.records)
    }

    /// True when the frame at `second` carries events a renderer should animate.
    pub fn frame_has_events(&self, second: u64) -> bool {
        self.timeline
            .keyframe(second)
            .is_some_and(|keyframe| !keyframe.is_empty())
    }

    pub fn reset(&mut self) {
        self.registry.reset_all(&self.dataset.records);
        self.current_second = 0;
    }

    /// Moves the simulation to `target_second`, clamped to the window.
    ///
    /// Forward seeks continue from the current second; backward seeks rebuild from zero.
    pub fn seek(&mut self, target_second: i64) -> SeekReport {
        let target = self.timeline.clamp_second(target_second);
        let from = self.current_second;
        let full_rebuild = target < from;
        let start = if full_rebuild {
            self.reset();
            0
        } else {
            from
        };

        let mut report = SeekReport {
            from_second: from,
            to_second: target,
            full_rebuild,
            ..SeekReport::default()
        };

        for second in start..target {
            self.apply_frame(second, &mut report);
            self.registry.decay_notifications();
            self.registry.commit_positions();
            report.replayed_frames += 1;
        }
        self.apply_frame(target, &mut report);
        self.current_second = target;

        tracing::debug!(
            from = report.from_second,
            to = report.to_second,
            full_rebuild = report.full_rebuild,
            frames = report.replayed_frames,
            applied = report.applied_events,
            skipped = report.skipped_events,
            "seek complete"
        );
        report
    }

    fn apply_frame(&mut self, second: u64, report: &mut SeekReport) {
        let Some(keyframe) = self.timeline.keyframe(second) else {
            return;
        };
        for event in &keyframe.events {
            let Some(record) = self.dataset.records.get(event.cycle) else {
                tracing::warn!(
                    cycle = event.cycle,
                    second,
                    "event references a missing cycle record"
                );
                report.skipped_events += 1;
                continue;
            };
            match self.registry.apply_event(event, record) {
                EventOutcome::Applied | EventOutcome::AlreadyCooking => report.applied_events += 1,
                EventOutcome::AlreadyApplied => report.repeated_events += 1,
                EventOutcome::PanNotFound | EventOutcome::NoMachineAvailable => {
                    report.skipped_events += 1
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
