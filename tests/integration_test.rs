// Integration tests for a complete regularity rally session
//
// This test suite validates the complete workflow:
// 1. Parse a rally config
// 2. Drive the lap plan forward with a manual clock
// 3. Capture marks on the set lap and freeze the reference
// 4. Collect countdown announcements across the confirmation lap
// 5. Write the session log and read it back

use std::sync::mpsc;
use std::thread;

use pacenote::clock::{Clock, ManualClock};
use pacenote::config::RallyConfig;
use pacenote::display::compose_frame;
use pacenote::session::{Announcement, LapType, Session};
use pacenote::writer::{LapRecord, SessionRecord, write_session};

const STAGE_CONFIG: &str = "\
2341

[marks]
bridge =
hairpin =
";

/// Helper to build a session driven by a manual clock.
fn session_from_config(text: &str) -> (Session, ManualClock) {
    let clock = ManualClock::new();
    let mut session = Session::with_clock(Box::new(clock.clone()));
    session
        .load_config(RallyConfig::parse(text).expect("config should parse"))
        .expect("config should load");
    (session, clock)
}

/// Helper to tick the session every `step_s` for `duration_s`, collecting
/// every announcement that fires along the way.
fn drive(session: &mut Session, clock: &ManualClock, duration_s: f64, step_s: f64) -> Vec<Announcement> {
    let mut events = Vec::new();
    let steps = (duration_s / step_s).round() as usize;
    for _ in 0..steps {
        clock.advance_secs(step_s);
        events.extend(session.tick(clock.now()).events);
    }
    events
}

#[test]
fn test_full_session_announces_countdown_in_order() {
    let (mut session, clock) = session_from_config(STAGE_CONFIG);

    // untimed warm-up lap
    let (started, completed) = session.advance().unwrap();
    assert_eq!(started, LapType::UntimedLap);
    assert_eq!(completed, None);
    let events = drive(&mut session, &clock, 60.0, 0.5);
    assert!(events.is_empty(), "no announcements on an untimed lap");

    // set lap: marks at 30 s and 90 s, lap time 95 s
    let (started, completed) = session.advance().unwrap();
    assert_eq!(started, LapType::SetLap);
    assert!((completed.unwrap() - 60.0).abs() < 1e-9);
    drive(&mut session, &clock, 30.0, 0.5);
    session.mark_reached().unwrap();
    drive(&mut session, &clock, 60.0, 0.5);
    session.mark_reached().unwrap();
    drive(&mut session, &clock, 5.0, 0.5);

    // confirmation lap against the frozen reference
    let (started, completed) = session.advance().unwrap();
    assert_eq!(started, LapType::ConfirmationLap);
    assert!((completed.unwrap() - 95.0).abs() < 1e-9);

    let reference = session.reference().expect("set lap should freeze a reference");
    println!(
        "reference: {:.1} s, {} marks",
        reference.set_duration_s,
        reference.marks.len()
    );
    assert!((reference.set_duration_s - 95.0).abs() < 1e-9);
    assert!((reference.marks[0].threshold_s - 65.0).abs() < 1e-9);
    assert!((reference.marks[1].threshold_s - 5.0).abs() < 1e-9);

    let events = drive(&mut session, &clock, 96.0, 0.1);
    for event in &events {
        println!("announced: {}", event);
    }
    assert_eq!(
        events,
        vec![
            Announcement::Mark("bridge".to_string()),
            Announcement::Count(10),
            Announcement::Count(9),
            Announcement::Count(8),
            Announcement::Count(7),
            Announcement::Count(6),
            Announcement::Count(5),
            Announcement::Mark("hairpin".to_string()),
            Announcement::Count(4),
            Announcement::Count(3),
            Announcement::Count(2),
            Announcement::Count(1),
            Announcement::Zero,
        ]
    );

    // past the plan the session keeps timing fast laps
    let (started, completed) = session.advance().unwrap();
    assert_eq!(started, LapType::FastLap);
    assert!((completed.unwrap() - 96.0).abs() < 1e-9);
    assert_eq!(session.lap_log().lap_count(), 3);
}

#[test]
fn test_display_follows_the_confirmation_lap() {
    let (mut session, clock) =
        session_from_config("34\n[marks]\nbridge =\n[misc]\ncountdown_from = 5\n");

    session.advance().unwrap();
    clock.advance_secs(20.0);
    session.mark_reached().unwrap();
    clock.advance_secs(70.0);
    session.advance().unwrap();

    // 6 s to go: the mark has come due, the counts have not
    clock.advance_secs(84.0);
    let tick = session.tick(clock.now());
    assert_eq!(tick.events, vec![Announcement::Mark("bridge".to_string())]);
    let frame = compose_frame(&session, &tick);
    assert_eq!(frame.line1, "01:24.0  01:30.0");
    assert_eq!(frame.line2, "06.0  2 C FINISH");

    // 0.8 s to go: every remaining count has fired
    clock.advance_secs(5.2);
    let tick = session.tick(clock.now());
    assert_eq!(tick.events.len(), 5);
    let frame = compose_frame(&session, &tick);
    assert_eq!(frame.line1, "01:29.2  01:30.0");
    assert_eq!(frame.line2, "00.8  2 C FINISH");
}

#[test]
fn test_plan_exhaustion_and_reset() {
    let (mut session, clock) = session_from_config("31\n");

    session.advance().unwrap();
    clock.advance_secs(50.0);
    session.advance().unwrap();
    assert!(session.reference().is_some());

    clock.advance_secs(40.0);
    let (started, _) = session.advance().unwrap();
    assert_eq!(started, LapType::FastLap, "past the plan laps run fast");
    clock.advance_secs(40.0);
    let (started, _) = session.advance().unwrap();
    assert_eq!(started, LapType::FastLap);
    assert_eq!(session.lap_log().lap_count(), 3);

    session.reset();
    assert_eq!(session.current_lap_type(), LapType::Ready);
    assert!(session.reference().is_none());
    assert_eq!(session.lap_log().lap_count(), 0);

    // the plan restarts from the top
    let (started, completed) = session.advance().unwrap();
    assert_eq!(started, LapType::SetLap);
    assert_eq!(completed, None);
}

#[test]
fn test_session_log_round_trip() {
    let (mut session, clock) = session_from_config("231\n");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stage.jsonl");
    let (record_tx, record_rx) = mpsc::channel();
    let writer_path = path.clone();
    let writer = thread::spawn(move || write_session(&writer_path, record_rx));

    record_tx
        .send(SessionRecord::SessionStart {
            config: session.config().unwrap().clone(),
        })
        .unwrap();

    session.advance().unwrap();
    for seconds in [45.5, 92.25, 88.0] {
        let ended = session.current_lap_type();
        clock.advance_secs(seconds);
        let (_, completed) = session.advance().unwrap();
        record_tx
            .send(SessionRecord::Lap(LapRecord {
                lap_no: session.lap_log().lap_count(),
                lap_type: ended,
                seconds: completed.unwrap(),
            }))
            .unwrap();
        if ended == LapType::SetLap {
            record_tx
                .send(SessionRecord::Reference(
                    session.reference().unwrap().clone(),
                ))
                .unwrap();
        }
    }
    drop(record_tx);
    writer.join().unwrap().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let records: Vec<SessionRecord> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 5);

    match &records[0] {
        SessionRecord::SessionStart { config } => assert_eq!(config.sequence.len(), 3),
        other => panic!("expected a session start record, got {other:?}"),
    }
    match &records[3] {
        SessionRecord::Reference(reference) => {
            assert!((reference.set_duration_s - 92.25).abs() < 1e-9);
            assert!(reference.marks.is_empty());
        }
        other => panic!("expected the frozen reference, got {other:?}"),
    }
    let expected = [
        (1, LapType::UntimedLap, 45.5),
        (2, LapType::SetLap, 92.25),
        (3, LapType::FastLap, 88.0),
    ];
    let lap_records: Vec<&LapRecord> = records
        .iter()
        .filter_map(|record| match record {
            SessionRecord::Lap(lap) => Some(lap),
            _ => None,
        })
        .collect();
    assert_eq!(lap_records.len(), 3);
    for (lap, (lap_no, lap_type, seconds)) in lap_records.iter().zip(expected) {
        assert_eq!(lap.lap_no, lap_no);
        assert_eq!(lap.lap_type, lap_type);
        assert!((lap.seconds - seconds).abs() < 1e-9);
    }
}
