use playhead_core::{
    ClockError, ClockState, CueKind, PracticeConfig, ScrollClock, Subdivision, Teleport,
};
use playhead_domain_score::{PracticeScore, ScoreSlot, TimelineError};
use playhead_ports::layout::{BeatAnchor, ViewGeometry};
use playhead_ports::types::BeatState;
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

fn slot(measure: u32, position: f64, pitch: u8) -> ScoreSlot {
    ScoreSlot {
        measure,
        position_beats: position,
        duration_beats: 1.0,
        pitches: vec![pitch],
        element: position as u64,
    }
}

/// Two measures of two beats each at 60 bpm.
fn score() -> PracticeScore {
    PracticeScore {
        title: None,
        bpm: 60.0,
        beats_per_pass: 4.0,
        slots: vec![
            slot(1, 0.0, 60),
            slot(1, 1.0, 62),
            slot(2, 2.0, 64),
            slot(2, 3.0, 65),
        ],
    }
}

fn geometry() -> ViewGeometry {
    ViewGeometry {
        viewport_width_px: 1200.0,
        target_x_px: 200.0,
        px_per_beat: 100.0,
    }
}

/// First beat drawn 200 px right of the line: 2000 ms of approach at 0.1 px/ms.
fn anchors() -> Vec<BeatAnchor> {
    vec![BeatAnchor {
        global_index: 0,
        screen_x: 400.0,
    }]
}

fn ms(base: Instant, offset: u64) -> Instant {
    base + Duration::from_millis(offset)
}

fn clock(config: PracticeConfig) -> ScrollClock {
    ScrollClock::new(score(), &config, geometry()).expect("clock")
}

fn state_of(clock: &ScrollClock, index: u64) -> BeatState {
    clock
        .timeline()
        .and_then(|timeline| timeline.get(index))
        .map(|beat| beat.state())
        .expect("materialized beat")
}

#[test]
fn start_uses_anchor_for_approach_and_materializes_the_window() {
    let base = Instant::now();
    let mut clock = clock(PracticeConfig::new(150.0));

    let report = clock.start(base, &anchors()).expect("start");

    assert_eq!(report.approach_ms, 2000.0);
    assert_eq!(report.elapsed_ms, 0.0);
    assert!(report.skipped.is_empty());
    assert_eq!(clock.state(), ClockState::Playing);
    assert_eq!(clock.timeline().map(|t| t.index_range()), Some(0..12));
    assert_eq!(clock.elapsed_at(ms(base, 500)), 500.0);
}

#[test]
fn approach_falls_back_to_viewport_edge() {
    let mut clock = clock(PracticeConfig::new(150.0));
    let report = clock.start(Instant::now(), &[]).expect("start");
    assert_eq!(report.approach_ms, 10_000.0);
}

#[test]
fn teleport_retires_oldest_pass_and_keeps_new_beats_ahead() {
    let base = Instant::now();
    let mut clock = clock(PracticeConfig::new(150.0));
    clock.start(base, &anchors()).expect("start");

    let before = clock.tick(ms(base, 9_999));
    assert!(before.teleports.is_empty());
    assert_eq!(before.changes.len(), 8);
    assert!(before
        .changes
        .iter()
        .all(|change| change.state == BeatState::Missed));

    let report = clock.tick(ms(base, 10_000));
    assert_eq!(
        report.teleports,
        vec![Teleport {
            loop_count: 1,
            origin_px: -400.0,
            new_pass: 3,
            copy: 0,
            elapsed_ms: 10_000.0,
        }]
    );
    assert_eq!(report.scroll_offset_px, -400.0 + 10_000.0 * 0.1);
    assert_eq!(report.retired, vec![0]);

    let timeline = clock.timeline().expect("timeline");
    assert_eq!(timeline.index_range(), 4..16);
    let first_new = timeline.get(12).expect("new pass");
    assert_eq!(first_new.state(), BeatState::Pending);
    assert!(first_new.target_time_ms > report.elapsed_ms);
}

#[test]
fn pending_beats_outlive_their_pass_until_grace_expires() {
    let base = Instant::now();
    let mut config = PracticeConfig::new(150.0);
    config.grace_ms = 20_000.0;
    let mut clock = clock(config);
    clock.start(base, &anchors()).expect("start");

    let report = clock.tick(ms(base, 10_000));
    assert_eq!(report.teleports.len(), 1);
    assert!(report.changes.is_empty());
    assert!(report.retired.is_empty());
    assert_eq!(state_of(&clock, 0), BeatState::Pending);

    assert!(clock.tick(ms(base, 22_000)).changes.is_empty());

    let report = clock.tick(ms(base, 22_001));
    let missed: Vec<u64> = report.changes.iter().map(|c| c.global_index).collect();
    assert_eq!(missed, vec![0]);
    assert!(report.retired.is_empty());
    assert_eq!(clock.timeline().and_then(|t| t.first_pass()), Some(0));
}

/// One beat per pass at 240 bpm: 250 ms passes, 500 ms approach at 0.4 px/ms.
fn short_loop_clock(grace_ms: f64) -> ScrollClock {
    let score = PracticeScore {
        title: None,
        bpm: 240.0,
        beats_per_pass: 1.0,
        slots: vec![slot(1, 0.0, 60)],
    };
    let mut config = PracticeConfig::new(grace_ms);
    config.timing_window_ms = 100.0;
    ScrollClock::new(score, &config, geometry()).expect("clock")
}

#[test]
fn short_pass_is_held_until_its_beat_expires() {
    let base = Instant::now();
    let mut clock = short_loop_clock(600.0);
    let report = clock.start(base, &anchors()).expect("start");
    assert_eq!(report.approach_ms, 500.0);

    let report = clock.tick(ms(base, 1_020));
    assert_eq!(report.teleports.len(), 1);
    assert!(report.changes.is_empty());
    assert_eq!(state_of(&clock, 0), BeatState::Pending);

    let report = clock.tick(ms(base, 1_101));
    let missed: Vec<u64> = report.changes.iter().map(|c| c.global_index).collect();
    assert_eq!(missed, vec![0]);
    assert_eq!(report.retired, vec![0]);
}

#[test]
fn no_beat_is_missed_before_its_grace_across_many_loops() {
    let base = Instant::now();
    let grace_ms = 600.0;
    let mut clock = short_loop_clock(grace_ms);
    clock.start(base, &anchors()).expect("start");

    let mut missed = 0u64;
    let mut teleports = 0;
    for offset in (0..6_000).step_by(16) {
        let report = clock.tick(ms(base, offset));
        teleports += report.teleports.len();
        for change in &report.changes {
            assert_eq!(change.state, BeatState::Missed);
            let target = 500.0 + change.global_index as f64 * 250.0;
            assert!(
                target + grace_ms < report.elapsed_ms,
                "beat {} missed at {}",
                change.global_index,
                report.elapsed_ms
            );
            assert_eq!(change.global_index, missed);
            missed += 1;
        }
    }

    assert!(teleports > 10);
    // Every beat whose grace ended before the last tick (5984 ms) has been reported.
    assert_eq!(missed, 20);
}

#[test]
fn pause_freezes_and_resume_continues_from_same_point() {
    let base = Instant::now();
    let mut clock = clock(PracticeConfig::new(150.0));
    clock.start(base, &anchors()).expect("start");

    let report = clock.tick(ms(base, 2_500));
    assert_eq!(report.changes.len(), 1);

    assert_eq!(clock.pause(ms(base, 3_000)), Ok(3_000.0));
    assert_eq!(clock.elapsed_at(ms(base, 10_000)), 3_000.0);
    assert!(clock.tick(ms(base, 9_000)).changes.is_empty());

    assert_eq!(clock.resume(ms(base, 10_000)), Ok(3_000.0));
    assert_eq!(clock.elapsed_at(ms(base, 10_500)), 3_500.0);
    assert!(clock.tick(ms(base, 10_000)).changes.is_empty());
    assert_eq!(state_of(&clock, 0), BeatState::Missed);
    assert_eq!(state_of(&clock, 1), BeatState::Pending);
}

#[test]
fn pause_and_resume_require_the_right_state() {
    let mut clock = clock(PracticeConfig::new(150.0));
    assert_eq!(
        clock.pause(Instant::now()),
        Err(ClockError::InvalidState {
            action: "pause",
            state: ClockState::Stopped
        })
    );
    clock.start(Instant::now(), &anchors()).expect("start");
    assert!(clock.resume(Instant::now()).is_err());
}

#[test]
fn start_from_measure_skips_earlier_first_pass_beats() {
    let base = Instant::now();
    let mut clock = clock(PracticeConfig::new(150.0));

    let report = clock.start_from_measure(2, base, &anchors()).expect("start");

    assert_eq!(report.hide_before, Some(2));
    assert_eq!(report.elapsed_ms, 2_000.0);
    let skipped: Vec<u64> = report.skipped.iter().map(|c| c.global_index).collect();
    assert_eq!(skipped, vec![0, 1]);

    let timeline = clock.timeline().expect("timeline");
    let resumed = timeline.get(2).expect("beat");
    assert_eq!(resumed.target_time_ms - report.elapsed_ms, report.approach_ms);
    assert_eq!(timeline.get(4).map(|b| b.state()), Some(BeatState::Pending));
    assert_eq!(clock.elapsed_at(base), 2_000.0);
}

#[test]
fn start_from_unknown_measure_fails() {
    let mut clock = clock(PracticeConfig::new(150.0));
    assert_eq!(
        clock
            .start_from_measure(7, Instant::now(), &anchors())
            .unwrap_err(),
        ClockError::Timeline(TimelineError::UnknownMeasure(7))
    );
    assert_eq!(clock.state(), ClockState::Stopped);
}

#[test]
fn bounded_session_finishes_after_last_beat() {
    let base = Instant::now();
    let mut config = PracticeConfig::new(150.0);
    config.max_passes = Some(2);
    let mut clock = clock(config);
    clock.start(base, &anchors()).expect("start");
    assert_eq!(clock.timeline().map(|t| t.index_range()), Some(0..8));

    let early = clock.tick(ms(base, 9_000));
    assert!(!early.finished);
    assert!(early.teleports.is_empty());

    let done = clock.tick(ms(base, 9_151));
    assert!(done.finished);
    assert_eq!(clock.state(), ClockState::Stopped);
    assert_eq!(clock.loop_count(), 0);
}

#[test]
fn tempo_change_preserves_position_and_states() {
    let base = Instant::now();
    let mut clock = clock(PracticeConfig::new(150.0));
    clock.start(base, &anchors()).expect("start");
    clock.tick(ms(base, 3_000));
    assert_eq!(state_of(&clock, 0), BeatState::Missed);

    let offset_before = clock.scroll_offset_px(clock.elapsed_at(ms(base, 3_000)));
    clock.set_tempo(120.0, ms(base, 3_000)).expect("tempo");

    let elapsed = clock.elapsed_at(ms(base, 3_000));
    assert_eq!(elapsed, 1_500.0);
    assert_eq!(clock.musical_position_at(elapsed), Some(1.0));
    assert!((clock.scroll_offset_px(elapsed) - offset_before).abs() < 1e-9);
    assert_eq!(state_of(&clock, 0), BeatState::Missed);
    let beat = clock.timeline().and_then(|t| t.get(1)).expect("beat");
    assert_eq!(beat.target_time_ms, 1_500.0);
    assert_eq!(clock.elapsed_at(ms(base, 3_500)), 2_000.0);
}

#[test]
fn metronome_cues_ride_on_the_tick() {
    let base = Instant::now();
    let mut config = PracticeConfig::new(150.0);
    config.metronome = Subdivision::Beat;
    let mut clock = clock(config);
    clock.start(base, &anchors()).expect("start");

    let report = clock.tick(base);
    assert_eq!(report.cues.len(), 1);
    assert_eq!(report.cues[0].at_ms, 0.0);
    assert_eq!(report.cues[0].kind, CueKind::Beat);
    assert!(clock.tick(ms(base, 16)).cues.is_empty());
}

#[test]
fn invalid_inputs_are_rejected_up_front() {
    let mut flat = geometry();
    flat.px_per_beat = 0.0;
    assert!(matches!(
        ScrollClock::new(score(), &PracticeConfig::new(150.0), flat),
        Err(ClockError::InvalidGeometry(_))
    ));

    assert!(matches!(
        ScrollClock::new(score(), &PracticeConfig::new(0.0), geometry()),
        Err(ClockError::Config(_))
    ));

    let mut empty = score();
    empty.slots.clear();
    assert_eq!(
        ScrollClock::new(empty, &PracticeConfig::new(150.0), geometry()).err(),
        Some(ClockError::Timeline(TimelineError::EmptyScore))
    );
}
