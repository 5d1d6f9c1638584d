use super::*;
use chrono::{DateTime, Duration, TimeZone, Utc};
use contracts::{PanLocation, TargetZone};

use crate::layout::{queue_slot, Position, FUNNEL_ROW, HOLDING_ROW, QUEUE_ROW};
use crate::normalize::CycleRecord;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
}

fn cycle(pan: &str, protein: &str, start_offset: i64, stop_offset: i64) -> CycleRecord {
    let start = t0() + Duration::seconds(start_offset);
    let stop = t0() + Duration::seconds(stop_offset);
    CycleRecord {
        protein_name: protein.to_string(),
        protein_pan: pan.to_string(),
        duration: stop_offset - start_offset,
        start_timestamp: start,
        stop_timestamp: stop,
        is_long_cycle_error: false,
        is_short_cycle_error: false,
        is_missed_checkout_error: false,
        target_zone: TargetZone::OnTarget,
        breader_id: "B1".to_string(),
    }
}

fn engine(records: Vec<CycleRecord>, config: ReplayConfig) -> ReplayEngine {
    let dataset = ReplayDataset {
        location_id: "loc-7".to_string(),
        date: records[0].start_timestamp,
        records,
    };
    ReplayEngine::new(dataset, config).expect("engine builds")
}

fn single_nuggets() -> ReplayEngine {
    // cook at 110, fill at 290, start at 300, stop at 600
    engine(vec![cycle("Nuggets 1", "nuggets", 0, 300)], ReplayConfig::default())
}

fn pan<'a>(engine: &'a ReplayEngine, id: &str) -> &'a crate::registry::Pan {
    engine.registry().pan(id).expect("pan exists")
}

#[test]
fn cook_assigns_a_machine_without_moving_the_pan() {
    let mut engine = single_nuggets();
    let report = engine.seek(110);
    assert_eq!(report.applied_events, 1);
    assert_eq!(report.replayed_frames, 110);

    // non-spicy machines sit on the right when spicy is on the left
    assert_eq!(engine.registry().machine_for("Nuggets 1"), Some(3));
    let nuggets = pan(&engine, "Nuggets 1");
    assert_eq!(nuggets.location, PanLocation::Queue);
    assert!(nuggets.next.is_none());

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.machines[3].remaining_seconds, Some(180));
    assert_eq!(snapshot.machines[0].remaining_seconds, None);
}

#[test]
fn target_frame_transitions_stay_pending_until_the_next_frame() {
    let mut engine = single_nuggets();
    engine.seek(290);
    let home = queue_slot(0);
    let nuggets = pan(&engine, "Nuggets 1");
    assert_eq!(nuggets.location, PanLocation::Funnel);
    assert_eq!(nuggets.position, home);
    assert_eq!(nuggets.next, Some(home.with_y(FUNNEL_ROW)));
    assert_eq!(engine.registry().machine_for("Nuggets 1"), None);

    engine.seek(291);
    let nuggets = pan(&engine, "Nuggets 1");
    assert_eq!(nuggets.position, home.with_y(FUNNEL_ROW));
    assert!(nuggets.next.is_none());
}

#[test]
fn scan_in_holds_the_pan_for_twenty_minutes() {
    let mut engine = single_nuggets();
    engine.seek(300);
    let nuggets = pan(&engine, "Nuggets 1");
    assert_eq!(nuggets.location, PanLocation::Holding);
    assert_eq!(nuggets.expire_date, Some(t0() + Duration::minutes(20)));
    assert_eq!(nuggets.next.map(|next| next.y), Some(HOLDING_ROW));
    assert_eq!(engine.registry().current_breader(), Some("B1"));

    engine.seek(360);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.simulation_time, t0() + Duration::seconds(60));
    assert_eq!(snapshot.pans[0].expires_in_seconds, Some(1_140));
    assert!(!snapshot.pans[0].expired);
}

#[test]
fn stop_frame_shows_the_pan_back_in_the_queue() {
    let mut engine = single_nuggets();
    engine.seek(600);
    let nuggets = pan(&engine, "Nuggets 1");
    assert_eq!(nuggets.location, PanLocation::Queue);
    assert_eq!(nuggets.position.y, HOLDING_ROW);
    assert_eq!(nuggets.next, Some(queue_slot(0)));
}

#[test]
fn pans_left_in_holding_past_the_limit_are_expired() {
    let mut engine = engine(vec![cycle("Filets 1", "filets", 0, 1_500)], ReplayConfig::default());
    engine.seek(300 + 1_250);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.pans[0].location, PanLocation::Holding);
    assert!(snapshot.pans[0].expired);
    assert_eq!(snapshot.pans[0].expires_in_seconds, Some(-50));
}

#[test]
fn repeated_seek_to_the_same_second_changes_nothing() {
    let mut engine = single_nuggets();
    engine.seek(300);
    let first = engine.snapshot();
    let report = engine.seek(300);
    assert_eq!(report.applied_events, 0);
    assert_eq!(report.repeated_events, 1);
    assert_eq!(report.replayed_frames, 0);
    assert_eq!(engine.snapshot(), first);
}

#[test]
fn backward_then_forward_matches_a_fresh_seek() {
    let records = vec![
        cycle("Nuggets 1", "nuggets", 0, 300),
        cycle("Spicy 1", "spicy", 120, 500),
        cycle("Nuggets 1", "nuggets", 700, 900),
    ];
    let mut scrubbed = engine(records.clone(), ReplayConfig::default());
    scrubbed.seek(1_100);
    let report = scrubbed.seek(350);
    assert!(report.full_rebuild);
    scrubbed.seek(800);

    let mut fresh = engine(records, ReplayConfig::default());
    fresh.seek(800);
    assert_eq!(scrubbed.snapshot(), fresh.snapshot());
    assert_eq!(
        scrubbed.registry().executed_count(),
        fresh.registry().executed_count()
    );
}

#[test]
fn forward_seek_in_steps_matches_one_long_seek() {
    let records = vec![
        cycle("Nuggets 1", "nuggets", 0, 300),
        cycle("Nuggets 2", "nuggets", 40, 260),
    ];
    let mut stepped = engine(records.clone(), ReplayConfig::default());
    for second in [110, 150, 290, 300, 301, 500] {
        stepped.seek(second);
    }
    let mut direct = engine(records, ReplayConfig::default());
    direct.seek(500);
    assert_eq!(stepped.snapshot(), direct.snapshot());
}

#[test]
fn cook_is_skipped_when_every_matching_machine_is_busy() {
    let records = (1..=4)
        .map(|n| cycle(&format!("Nuggets {n}"), "nuggets", 0, 300))
        .collect::<Vec<_>>();
    let mut engine = engine(records, ReplayConfig::default());
    let report = engine.seek(110);
    assert_eq!(report.applied_events, 3);
    assert_eq!(report.skipped_events, 1);
    assert_eq!(engine.registry().machine_for("Nuggets 4"), None);
    assert!(engine.registry().machines()[3..].iter().all(|machine| machine.cooking));
    assert!(engine.registry().machines()[..3].iter().all(|machine| !machine.cooking));
    // a skipped event is still marked as executed
    assert_eq!(engine.registry().executed_count(), 4);

    engine.seek(290);
    assert_eq!(pan(&engine, "Nuggets 4").location, PanLocation::Funnel);
}

#[test]
fn spicy_pans_cook_on_open_machines_wherever_they_sit() {
    let records = vec![cycle("Spicy 1", "spicy", 0, 300)];
    let mut left = engine(records.clone(), ReplayConfig::default());
    left.seek(10);
    assert_eq!(left.registry().machine_for("Spicy 1"), Some(0));

    let mut right = engine(
        records,
        ReplayConfig {
            spicy_left: false,
            use_breading_queue: false,
        },
    );
    right.seek(10);
    assert_eq!(right.registry().machine_for("Spicy 1"), Some(3));
}

#[test]
fn a_pan_already_cooking_keeps_its_single_machine() {
    // second cook lands at 210, before the first fill at 290
    let records = vec![
        cycle("Nuggets 1", "nuggets", 0, 50),
        cycle("Nuggets 1", "nuggets", 100, 400),
    ];
    let mut engine = engine(records, ReplayConfig::default());
    engine.seek(210);
    let cooking = engine
        .registry()
        .machines()
        .iter()
        .filter(|machine| machine.cooking)
        .count();
    assert_eq!(cooking, 1);
}

#[test]
fn breading_queue_shifts_pans_forward_and_returns_to_the_tail() {
    let config = ReplayConfig {
        spicy_left: false,
        use_breading_queue: true,
    };
    let records = vec![
        cycle("Filets 1", "filets", 0, 300),
        cycle("Filets 2", "filets", 1_000, 1_300),
        cycle("Filets 3", "filets", 1_000, 1_300),
    ];
    let mut engine = engine(records, config);

    engine.seek(290);
    assert_eq!(pan(&engine, "Filets 1").next, Some(Position::new(10.0, FUNNEL_ROW)));
    assert_eq!(pan(&engine, "Filets 2").next, Some(queue_slot(0)));
    assert_eq!(pan(&engine, "Filets 3").next, Some(queue_slot(1)));

    engine.seek(600);
    assert_eq!(pan(&engine, "Filets 2").position, queue_slot(0));
    assert_eq!(pan(&engine, "Filets 3").position, queue_slot(1));
    assert_eq!(pan(&engine, "Filets 1").location, PanLocation::Queue);
    assert_eq!(pan(&engine, "Filets 1").next, Some(Position::new(190.0, QUEUE_ROW)));
}

#[test]
fn notifications_decay_once_per_replayed_frame() {
    let mut engine = single_nuggets();
    engine.seek(300);
    let messages = engine
        .registry()
        .notifications()
        .iter()
        .map(|notification| (notification.message.as_str(), notification.duration))
        .collect::<Vec<_>>();
    // the cook notice from frame 110 has already run out
    assert_eq!(
        messages,
        vec![
            ("NUGGETS 1 finished cooking", 90.0),
            ("NUGGETS 1 scanned in", 100.0)
        ]
    );

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.notifications.len(), 2);
    assert_eq!(snapshot.notifications[1].event.protein_pan, "Nuggets 1");
}

#[test]
fn every_event_executes_exactly_once_by_the_last_second() {
    let records = vec![
        cycle("Nuggets 1", "nuggets", 0, 300),
        cycle("Spicy 1", "spicy", 120, 500),
        cycle("Filets 1", "filets", 130, 700),
    ];
    let mut engine = engine(records, ReplayConfig::default());
    let last = engine.timeline().last_second();
    engine.seek(last as i64 + 50);
    assert_eq!(engine.current_second(), last);
    assert_eq!(engine.registry().executed_count(), 12);
    assert_eq!(engine.timeline().event_count(), 12);
    assert!(engine
        .registry()
        .pans()
        .iter()
        .all(|pan| pan.location == PanLocation::Queue));
}

#[test]
fn reset_returns_to_the_initial_layout() {
    let mut engine = single_nuggets();
    let initial = engine.snapshot();
    engine.seek(450);
    engine.reset();
    assert_eq!(engine.current_second(), 0);
    assert_eq!(engine.registry().executed_count(), 0);
    assert_eq!(engine.snapshot(), initial);
    assert_eq!(engine.seek(-20).to_second, 0);
}

#[test]
fn frames_with_events_are_reported() {
    let engine = single_nuggets();
    assert!(engine.frame_has_events(110));
    assert!(!engine.frame_has_events(111));
    assert!(!engine.frame_has_events(10_000));
}

#[test]
fn summary_reports_rows_and_window() {
    let row = |pan: &str, start: &str, stop: &str| {
        [
            ("location_id", "loc-7"),
            ("protein_name", "nuggets"),
            ("protein_pan", pan),
            ("start_timestamp", start),
            ("stop_timestamp", stop),
            ("duration", "300"),
            ("tzi_target_zone", "3"),
            ("breader_id", "B1"),
        ]
        .into_iter()
        .map(|(column, value)| (column.to_string(), value.to_string()))
        .collect::<RawRow>()
    };
    let rows = vec![
        row("Nuggets 1", "2024-05-01 10:00:00", "2024-05-01 10:05:00"),
        row("Nuggets 1", "2024-05-01 10:00:00", "2024-05-01 10:05:00"),
        row("Nuggets 2", "not a time", "2024-05-01 10:05:00"),
        row("Nuggets 2", "2024-05-01 10:01:00", "2024-05-01 10:04:00"),
    ];
    let (engine, report) =
        ReplayEngine::from_rows(&rows, ReplayConfig::default()).expect("rows load");
    let summary = engine.summary(Some(&report));
    assert_eq!(summary.location_id, "loc-7");
    assert_eq!(summary.cycle_count, 2);
    assert_eq!(summary.pan_count, 2);
    assert_eq!(summary.event_count, 8);
    assert_eq!(summary.duplicate_row_count, 1);
    assert_eq!(summary.skipped_row_count, 1);
    assert_eq!(summary.window_start, t0() - Duration::minutes(5));
    assert_eq!(summary.window_end, t0() + Duration::minutes(10));
    assert_eq!(summary.duration_seconds, 900);
}

#[test]
fn snapshot_survives_the_wire() {
    let mut engine = single_nuggets();
    engine.seek(290);
    let snapshot = engine.snapshot();
    let encoded = serde_json::to_string(&snapshot).expect("serialize");
    let decoded: contracts::ReplaySnapshot = serde_json::from_str(&encoded).expect("deserialize");
    assert_eq!(decoded, snapshot);
    assert!(decoded.pans[0].is_transitioning());
}
