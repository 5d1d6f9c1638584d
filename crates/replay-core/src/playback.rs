//! Timer-driven playback over a [`ReplayEngine`].
//!
//! The driver owns no clock. Callers hand it an [`Instant`] on every control call and poll it
//! once per display refresh; it applies every step whose interval has elapsed and drives the
//! short render animation for transitions committed by the latest seek.

use std::time::{Duration, Instant};

use contracts::{PlaybackStatus, ReplaySnapshot, SCHEMA_VERSION_V1};

use crate::engine::{ReplayEngine, SeekReport};

pub const BASE_STEP_INTERVAL: Duration = Duration::from_millis(50);
pub const ANIMATION_DURATION: Duration = Duration::from_millis(200);
pub const DEFAULT_SKIP_SECONDS: i64 = 15;
pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 20.0;

/// Receives every snapshot the driver decides to paint.
pub trait Renderer {
    fn render(&mut self, snapshot: &ReplaySnapshot);
}

impl<F> Renderer for F
where
    F: FnMut(&ReplaySnapshot),
{
    fn render(&mut self, snapshot: &ReplaySnapshot) {
        (self)(snapshot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RenderAnimation {
    started_at: Instant,
}

impl RenderAnimation {
    fn progress(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f32() / ANIMATION_DURATION.as_secs_f32()).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub stepped_to: Option<u64>,
    pub rendered: bool,
    /// Playback reached the last second during this poll and stopped itself.
    pub stopped_at_end: bool,
    /// Seconds advanced by this poll.
    pub steps: u64,
}

pub struct PlaybackDriver<R> {
    engine: ReplayEngine,
    renderer: R,
    playing: bool,
    speed: f64,
    last_step: Option<Instant>,
    animation: Option<RenderAnimation>,
}

impl<R: Renderer> PlaybackDriver<R> {
    /// Wraps an engine and paints its current state once.
    pub fn new(engine: ReplayEngine, renderer: R) -> Self {
        let mut driver = Self {
            engine,
            renderer,
            playing: false,
            speed: 1.0,
            last_step: None,
            animation: None,
        };
        driver.paint(1.0);
        driver
    }

    pub fn engine(&self) -> &ReplayEngine {
        &self.engine
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn step_interval(&self) -> Duration {
        BASE_STEP_INTERVAL.div_f64(self.speed)
    }

    /// Scrubs to `second`. Scrubbing while playing pauses first.
    pub fn seek(&mut self, second: i64, now: Instant) -> SeekReport {
        if self.playing {
            self.pause();
        }
        self.go_to(second, now)
    }

    /// Toggles playback and returns whether it is now playing. Playing from the last second
    /// starts over from zero.
    pub fn play_pause(&mut self, now: Instant) -> bool {
        if self.playing {
            self.pause();
            return false;
        }
        if self.at_last_second() {
            self.go_to(0, now);
        }
        self.playing = true;
        self.last_step = Some(now);
        tracing::debug!(
            second = self.engine.current_second(),
            speed = self.speed,
            "playback started"
        );
        true
    }

    pub fn skip_forward(&mut self, seconds: i64, now: Instant) -> SeekReport {
        let target = self.current_second_i64().saturating_add(seconds);
        self.go_to(target, now)
    }

    pub fn skip_backward(&mut self, seconds: i64, now: Instant) -> SeekReport {
        let target = self.current_second_i64().saturating_sub(seconds);
        self.go_to(target, now)
    }

    /// Sets the playback multiplier, clamped to `[MIN_SPEED, MAX_SPEED]`. Non-finite input
    /// leaves the speed unchanged. Returns the speed in effect.
    pub fn set_playback_speed(&mut self, multiplier: f64) -> f64 {
        if multiplier.is_finite() {
            self.speed = multiplier.clamp(MIN_SPEED, MAX_SPEED);
        } else {
            tracing::warn!(multiplier, "ignoring non-finite playback speed");
        }
        self.speed
    }

    /// Advances playback and the render animation to `now`.
    ///
    /// Every step that fell due since the last poll is applied, keeping the step clock on
    /// whole intervals, so the playback rate does not depend on how often the caller polls.
    /// The resulting state is rendered once.
    pub fn poll(&mut self, now: Instant) -> PollOutcome {
        let mut outcome = PollOutcome::default();

        if self.playing {
            let steps = self.catch_up(now);
            if steps > 0 {
                outcome.steps = steps;
                outcome.stepped_to = Some(self.engine.current_second());
                outcome.rendered = true;
                self.present(now);
                if self.at_last_second() {
                    self.pause();
                    outcome.stopped_at_end = true;
                }
                return outcome;
            }
        }

        if let Some(animation) = self.animation {
            let progress = animation.progress(now);
            if progress >= 1.0 {
                self.animation = None;
            }
            self.paint(progress);
            outcome.rendered = true;
        }
        outcome
    }

    pub fn status(&self) -> PlaybackStatus {
        let timeline = self.engine.timeline();
        PlaybackStatus {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            second: self.engine.current_second(),
            duration_seconds: timeline.duration_seconds(),
            playing: self.playing,
            speed: self.speed,
            window_start: timeline.window_start(),
            window_end: timeline.window_end(),
            simulation_time: self.engine.simulation_time(),
        }
    }

    /// Current snapshot with the animation progress the renderer last saw.
    pub fn snapshot(&self, now: Instant) -> ReplaySnapshot {
        let mut snapshot = self.engine.snapshot();
        snapshot.transition_progress = self
            .animation
            .map_or(1.0, |animation| animation.progress(now));
        snapshot
    }

    fn current_second_i64(&self) -> i64 {
        i64::try_from(self.engine.current_second()).unwrap_or(i64::MAX)
    }

    fn at_last_second(&self) -> bool {
        self.engine.current_second() >= self.engine.timeline().last_second()
    }

    /// Applies every step due by `now` without rendering and returns how many were taken.
    fn catch_up(&mut self, now: Instant) -> u64 {
        let interval = self.step_interval();
        let mut last_step = *self.last_step.get_or_insert(now);
        let mut steps = 0;
        while now.saturating_duration_since(last_step) >= interval && !self.at_last_second() {
            let next = self.engine.current_second() + 1;
            self.engine.seek(next as i64);
            last_step += interval;
            steps += 1;
        }
        if steps > 0 {
            self.last_step = Some(last_step);
            if self.animation.take().is_some() {
                tracing::trace!("render animation cancelled by playback step");
            }
        }
        steps
    }

    fn pause(&mut self) {
        self.playing = false;
        self.last_step = None;
        tracing::debug!(second = self.engine.current_second(), "playback paused");
    }

    /// A new seek always drops the animation in flight before replaying.
    fn go_to(&mut self, second: i64, now: Instant) -> SeekReport {
        if self.animation.take().is_some() {
            tracing::trace!("render animation cancelled by seek");
        }
        let report = self.engine.seek(second);
        self.present(now);
        report
    }

    /// Renders the state after a seek, starting the animation when pans are in motion.
    fn present(&mut self, now: Instant) {
        let mut snapshot = self.engine.snapshot();
        if snapshot.pans.iter().any(|pan| pan.is_transitioning()) {
            self.animation = Some(RenderAnimation { started_at: now });
            snapshot.transition_progress = 0.0;
        } else {
            snapshot.transition_progress = 1.0;
        }
        self.renderer.render(&snapshot);
    }

    fn paint(&mut self, progress: f32) {
        let mut snapshot = self.engine.snapshot();
        snapshot.transition_progress = progress;
        self.renderer.render(&snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use contracts::{ReplayConfig, TargetZone};

    use crate::normalize::{CycleRecord, ReplayDataset};

    #[derive(Default)]
    struct Recorder {
        frames: Vec<(u64, f32)>,
    }

    impl Renderer for Recorder {
        fn render(&mut self, snapshot: &ReplaySnapshot) {
            self.frames.push((snapshot.second, snapshot.transition_progress));
        }
    }

    fn driver() -> PlaybackDriver<Recorder> {
        // 900 second window: cook at 110, fill at 290, start at 300, stop at 600
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let record = CycleRecord {
            protein_name: "nuggets".to_string(),
            protein_pan: "Nuggets 1".to_string(),
            duration: 300,
            start_timestamp: start,
            stop_timestamp: start + ChronoDuration::seconds(300),
            is_long_cycle_error: false,
            is_short_cycle_error: false,
            is_missed_checkout_error: false,
            target_zone: TargetZone::OnTarget,
            breader_id: "B1".to_string(),
        };
        let dataset = ReplayDataset {
            location_id: "loc-7".to_string(),
            date: start,
            records: vec![record],
        };
        let engine = ReplayEngine::new(dataset, ReplayConfig::default()).expect("engine");
        PlaybackDriver::new(engine, Recorder::default())
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn new_driver_paints_the_initial_state() {
        let driver = driver();
        assert_eq!(driver.renderer().frames, vec![(0, 1.0)]);
        assert!(!driver.is_playing());
    }

    #[test]
    fn playing_steps_once_per_interval() {
        let mut driver = driver();
        let t = Instant::now();
        assert!(driver.play_pause(t));
        assert_eq!(driver.poll(t + ms(10)).stepped_to, None);
        assert_eq!(driver.poll(t + ms(50)).stepped_to, Some(1));
        assert_eq!(driver.poll(t + ms(60)).stepped_to, None);
        assert_eq!(driver.poll(t + ms(100)).stepped_to, Some(2));
        assert_eq!(driver.status().second, 2);
    }

    fn seconds_stepped_over_refreshes(speed: f64, refreshes: u64) -> u64 {
        let mut driver = driver();
        driver.set_playback_speed(speed);
        let t = Instant::now();
        driver.play_pause(t);
        let stepped = (1..=refreshes)
            .map(|frame| driver.poll(t + ms(16 * frame)).steps)
            .sum::<u64>();
        assert_eq!(stepped, driver.engine().current_second());
        stepped
    }

    #[test]
    fn display_refresh_polling_keeps_the_playback_rate() {
        // 62 refreshes of 16 ms cover 992 ms of wall time
        assert_eq!(seconds_stepped_over_refreshes(1.0, 62), 19);
        assert_eq!(seconds_stepped_over_refreshes(4.0, 62), 79);
        assert_eq!(seconds_stepped_over_refreshes(MAX_SPEED, 62), 396);
    }

    #[test]
    fn a_late_poll_catches_up_and_renders_once() {
        let mut driver = driver();
        let t = Instant::now();
        driver.play_pause(t);
        let painted = driver.renderer().frames.len();

        let outcome = driver.poll(t + ms(130));
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.stepped_to, Some(2));
        assert_eq!(driver.renderer().frames.len(), painted + 1);

        // the step clock stays on whole intervals: the third step is due at 150 ms
        assert_eq!(driver.poll(t + ms(149)).steps, 0);
        assert_eq!(driver.poll(t + ms(150)).stepped_to, Some(3));
    }

    #[test]
    fn catching_up_stops_at_the_last_second() {
        let mut driver = driver();
        let t = Instant::now();
        driver.seek(890, t);
        driver.play_pause(t);
        let outcome = driver.poll(t + ms(1_000));
        assert_eq!(outcome.steps, 9);
        assert_eq!(outcome.stepped_to, Some(899));
        assert!(outcome.stopped_at_end);
        assert!(!driver.is_playing());
    }

    #[test]
    fn speed_scales_the_step_interval() {
        let mut driver = driver();
        assert_eq!(driver.set_playback_speed(2.0), 2.0);
        assert_eq!(driver.step_interval(), ms(25));
        assert_eq!(driver.set_playback_speed(f64::NAN), 2.0);
        assert_eq!(driver.set_playback_speed(1_000.0), MAX_SPEED);
        assert_eq!(driver.set_playback_speed(0.0), MIN_SPEED);
    }

    #[test]
    fn scrubbing_pauses_playback() {
        let mut driver = driver();
        let t = Instant::now();
        driver.play_pause(t);
        let report = driver.seek(400, t + ms(5));
        assert_eq!(report.to_second, 400);
        assert!(!driver.is_playing());
        assert_eq!(driver.poll(t + ms(500)).stepped_to, None);
    }

    #[test]
    fn skips_clamp_to_the_window_and_keep_playing() {
        let mut driver = driver();
        let t = Instant::now();
        driver.play_pause(t);
        assert_eq!(driver.skip_backward(DEFAULT_SKIP_SECONDS, t).to_second, 0);
        assert_eq!(driver.skip_forward(DEFAULT_SKIP_SECONDS, t).to_second, 15);
        assert_eq!(driver.skip_forward(10_000, t).to_second, 899);
        assert!(driver.is_playing());
    }

    #[test]
    fn playback_stops_itself_at_the_last_second() {
        let mut driver = driver();
        let t = Instant::now();
        driver.seek(898, t);
        driver.play_pause(t);
        let outcome = driver.poll(t + ms(50));
        assert_eq!(outcome.stepped_to, Some(899));
        assert!(outcome.stopped_at_end);
        assert!(!driver.is_playing());
    }

    #[test]
    fn play_at_the_end_restarts_from_zero() {
        let mut driver = driver();
        let t = Instant::now();
        driver.seek(899, t);
        assert!(driver.play_pause(t));
        assert_eq!(driver.engine().current_second(), 0);
        assert_eq!(driver.engine().registry().executed_count(), 0);
    }

    #[test]
    fn transitions_animate_over_the_animation_window() {
        let mut driver = driver();
        let t = Instant::now();
        driver.seek(290, t);
        assert!(driver.is_animating());
        assert_eq!(driver.renderer().frames.last(), Some(&(290, 0.0)));

        assert!(driver.poll(t + ms(100)).rendered);
        let (_, halfway) = driver.renderer().frames.last().copied().expect("frame");
        assert!((halfway - 0.5).abs() < 1e-3);

        driver.poll(t + ms(250));
        assert_eq!(driver.renderer().frames.last(), Some(&(290, 1.0)));
        assert!(!driver.is_animating());
        assert!(!driver.poll(t + ms(300)).rendered);
    }

    #[test]
    fn a_new_seek_cancels_the_running_animation() {
        let mut driver = driver();
        let t = Instant::now();
        driver.seek(290, t);
        driver.seek(291, t + ms(20));
        assert!(!driver.is_animating());
        assert_eq!(driver.renderer().frames.last(), Some(&(291, 1.0)));
    }

    #[test]
    fn closures_render_too() {
        let mut seconds = Vec::new();
        {
            let engine = driver().engine().clone();
            let mut driver = PlaybackDriver::new(engine, |snapshot: &ReplaySnapshot| {
                seconds.push(snapshot.second)
            });
            driver.seek(42, Instant::now());
        }
        assert_eq!(seconds, vec![0, 42]);
    }
}
