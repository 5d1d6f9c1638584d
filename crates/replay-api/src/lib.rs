//! In-process replay facade over a loaded dataset and its playback driver, plus the HTTP and
//! WebSocket surface that exposes it.

mod ingest;
mod server;

use std::time::Instant;

use contracts::{PlaybackStatus, ReplayConfig, ReplaySnapshot, ReplaySummary, TimelineMarker};
use replay_core::{
    PlaybackDriver, PollOutcome, RawRow, Renderer, ReplayEngine, ReplayError, SeekReport,
};

pub use ingest::{parse_csv, IngestError};
pub use server::{serve, ServerError};

/// Error raised while loading a replay from CSV text.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Replay(#[from] ReplayError),
}

/// Collects every snapshot the driver paints until the caller drains them.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<ReplaySnapshot>,
}

impl FrameBuffer {
    pub fn drain(&mut self) -> Vec<ReplaySnapshot> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Renderer for FrameBuffer {
    fn render(&mut self, snapshot: &ReplaySnapshot) {
        self.pending.push(snapshot.clone());
    }
}

pub struct ReplayApi {
    replay_id: String,
    summary: ReplaySummary,
    driver: PlaybackDriver<FrameBuffer>,
}

impl ReplayApi {
    pub fn from_rows(
        replay_id: impl Into<String>,
        rows: &[RawRow],
        config: ReplayConfig,
    ) -> Result<Self, ReplayError> {
        let (engine, report) = ReplayEngine::from_rows(rows, config)?;
        let summary = engine.summary(Some(&report));
        let replay_id = replay_id.into();
        tracing::info!(
            replay_id = %replay_id,
            rows = report.total_rows,
            duplicates = report.duplicate_rows,
            skipped = report.skipped.len(),
            "replay loaded"
        );
        Ok(Self {
            replay_id,
            summary,
            driver: PlaybackDriver::new(engine, FrameBuffer::default()),
        })
    }

    pub fn from_csv(
        replay_id: impl Into<String>,
        text: &str,
        config: ReplayConfig,
    ) -> Result<Self, LoadError> {
        let rows = parse_csv(text)?;
        Ok(Self::from_rows(replay_id, &rows, config)?)
    }

    pub fn replay_id(&self) -> &str {
        &self.replay_id
    }

    pub fn summary(&self) -> &ReplaySummary {
        &self.summary
    }

    pub fn markers(&self) -> Vec<TimelineMarker> {
        self.driver.engine().markers()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.driver.status()
    }

    pub fn snapshot(&self, now: Instant) -> ReplaySnapshot {
        self.driver.snapshot(now)
    }

    pub fn engine(&self) -> &ReplayEngine {
        self.driver.engine()
    }

    pub fn seek(&mut self, second: i64, now: Instant) -> SeekReport {
        self.driver.seek(second, now)
    }

    pub fn play_pause(&mut self, now: Instant) -> bool {
        self.driver.play_pause(now)
    }

    /// Positive `seconds` skip forward, negative skip backward.
    pub fn skip(&mut self, seconds: i64, now: Instant) -> SeekReport {
        if seconds < 0 {
            self.driver.skip_backward(seconds.saturating_neg(), now)
        } else {
            self.driver.skip_forward(seconds, now)
        }
    }

    pub fn set_playback_speed(&mut self, multiplier: f64) -> f64 {
        self.driver.set_playback_speed(multiplier)
    }

    pub fn poll(&mut self, now: Instant) -> PollOutcome {
        self.driver.poll(now)
    }

    /// Snapshots painted since the last drain, oldest first.
    pub fn drain_frames(&mut self) -> Vec<ReplaySnapshot> {
        self.driver.renderer_mut().drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "location_id,protein_name,protein_pan,start_timestamp,stop_timestamp,\
        duration,tzi_target_zone,breader_id\n\
        loc-3,nuggets,Nuggets 1,2024-05-01 10:00:00,2024-05-01 10:05:00,300,4,B7,\n\
        loc-3,spicy,Spicy 1,2024-05-01 10:02:00,2024-05-01 10:06:00,240,2,B7,\n";

    #[test]
    fn csv_load_produces_summary_and_markers() {
        let api = ReplayApi::from_csv("r1", CSV, ReplayConfig::default()).expect("load");
        assert_eq!(api.replay_id(), "r1");
        assert_eq!(api.summary().location_id, "loc-3");
        assert_eq!(api.summary().cycle_count, 2);
        assert_eq!(api.summary().event_count, 8);
        assert_eq!(api.markers().len(), 2);
        assert_eq!(api.status().second, 0);
    }

    #[test]
    fn control_calls_queue_frames_for_the_stream() {
        let mut api = ReplayApi::from_csv("r1", CSV, ReplayConfig::default()).expect("load");
        let now = Instant::now();
        assert_eq!(api.drain_frames().len(), 1);

        api.seek(120, now);
        api.skip(-15, now);
        api.skip(15, now);
        let frames = api.drain_frames();
        let seconds = frames.iter().map(|frame| frame.second).collect::<Vec<_>>();
        assert_eq!(seconds, vec![120, 105, 120]);
        assert!(api.drain_frames().is_empty());
    }

    #[test]
    fn header_only_csv_has_no_data() {
        let err = ReplayApi::from_csv("r1", "location_id,protein_pan\n", ReplayConfig::default())
            .err()
            .expect("no rows");
        assert!(matches!(err, LoadError::Replay(ReplayError::NoData { total_rows: 0, .. })));
    }
}
