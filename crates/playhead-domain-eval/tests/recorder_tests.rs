mod common;

use playhead_domain_eval::{
    Chord, MatchConfig, Matcher, MissConfig, MissScanner, ScrollSnapshot, SessionRecorder,
};
use playhead_ports::types::{BeatState, Generation};
use pretty_assertions::assert_eq;

fn snapshot(elapsed_ms: f64) -> ScrollSnapshot {
    ScrollSnapshot {
        elapsed_ms,
        px_per_ms: 0.1,
        target_x_px: 200.0,
    }
}

#[test]
fn summary_tracks_counts_streaks_and_timing() {
    let mut timeline = common::timeline(60.0, 1000.0, &[&[60], &[62], &[64, 67], &[65]]);
    let matcher = Matcher::new(MatchConfig {
        timing_window_ms: 300.0,
    });
    let mut scanner = MissScanner::new(MissConfig { grace_ms: 150.0 });
    let mut recorder = SessionRecorder::new(Generation(7));

    let hit = matcher.match_chord(&mut timeline, &snapshot(1015.0), &Chord::new([60]));
    let record = recorder.record_match(&hit).expect("consumed");
    assert_eq!(record.state, BeatState::Hit);
    assert_eq!(record.generation, Generation(7));

    let hit = matcher.match_chord(&mut timeline, &snapshot(1990.0), &Chord::new([62]));
    recorder.record_match(&hit);

    let stray = matcher.match_chord(&mut timeline, &snapshot(3000.0), &Chord::new([50]));
    assert!(recorder.record_match(&stray).is_none());

    let partial = matcher.match_chord(&mut timeline, &snapshot(2995.0), &Chord::new([64]));
    recorder.record_match(&partial);

    for change in scanner.scan(&mut timeline, 4200.0) {
        recorder.record_change(&change);
    }

    let summary = recorder.summary();
    assert_eq!(summary.hit, 2);
    assert_eq!(summary.partial, 1);
    assert_eq!(summary.missed, 1);
    assert_eq!(summary.stray, 1);
    assert_eq!(summary.best_streak, 2);
    assert_eq!(summary.streak, 0);
    assert_eq!(summary.score, 250);
    assert_eq!(summary.accuracy, 0.5);
    assert_eq!(summary.mean_timing_error_ms, Some(0.0));
    assert_eq!(summary.mean_abs_timing_error_ms, Some(10.0));
}

#[test]
fn empty_session_has_no_timing() {
    let recorder = SessionRecorder::new(Generation(1));
    let summary = recorder.summary();

    assert_eq!(summary.accuracy, 0.0);
    assert_eq!(summary.mean_timing_error_ms, None);
}
