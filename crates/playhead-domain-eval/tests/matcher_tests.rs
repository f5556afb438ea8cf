mod common;

use playhead_domain_eval::{classify, Chord, MatchConfig, MatchResult, Matcher, ScrollSnapshot};
use playhead_ports::types::BeatState;
use pretty_assertions::assert_eq;

fn matcher() -> Matcher {
    Matcher::new(MatchConfig {
        timing_window_ms: 300.0,
    })
}

fn at(elapsed_ms: f64) -> ScrollSnapshot {
    ScrollSnapshot {
        elapsed_ms,
        px_per_ms: 0.1,
        target_x_px: 200.0,
    }
}

#[test]
fn exact_set_in_any_order_is_a_hit() {
    let mut timeline = common::timeline(60.0, 1000.0, &[&[60, 64]]);
    let outcome = matcher().match_chord(&mut timeline, &at(1000.0), &Chord::new([64, 60]));

    assert_eq!(outcome.result, MatchResult::Hit);
    assert_eq!(timeline.get(0).unwrap().state(), BeatState::Hit);
}

#[test]
fn subset_without_extras_is_partial() {
    let mut timeline = common::timeline(60.0, 1000.0, &[&[60, 64, 67]]);
    let outcome = matcher().match_chord(&mut timeline, &at(1000.0), &Chord::new([60, 64]));

    assert_eq!(outcome.result, MatchResult::Partial);
    assert_eq!(timeline.get(0).unwrap().state(), BeatState::Partial);
}

#[test]
fn overlap_with_extras_is_wrong() {
    let mut timeline = common::timeline(60.0, 1000.0, &[&[60, 64, 67]]);
    let outcome = matcher().match_chord(&mut timeline, &at(1000.0), &Chord::new([60, 65]));

    assert_eq!(outcome.result, MatchResult::Wrong);
    assert_eq!(timeline.get(0).unwrap().state(), BeatState::Wrong);
}

#[test]
fn zero_overlap_leaves_beat_pending() {
    let mut timeline = common::timeline(60.0, 1000.0, &[&[60, 64, 67]]);
    let outcome = matcher().match_chord(&mut timeline, &at(1010.0), &Chord::new([61, 63]));

    assert_eq!(outcome.result, MatchResult::None);
    assert!(!outcome.consumed());
    assert_eq!(outcome.beat.map(|b| b.global_index), Some(0));
    assert_eq!(timeline.get(0).unwrap().state(), BeatState::Pending);

    let retry = matcher().match_chord(&mut timeline, &at(1020.0), &Chord::new([60, 64, 67]));
    assert_eq!(retry.result, MatchResult::Hit);
}

#[test]
fn resolved_beats_are_never_matched_again() {
    let mut timeline = common::timeline(60.0, 1000.0, &[&[60]]);
    matcher().match_chord(&mut timeline, &at(1000.0), &Chord::new([60, 61]));
    let second = matcher().match_chord(&mut timeline, &at(1001.0), &Chord::new([60]));

    assert_eq!(second.result, MatchResult::None);
    assert_eq!(second.beat, None);
    assert_eq!(timeline.get(0).unwrap().state(), BeatState::Wrong);
}

#[test]
fn second_beat_hit_five_ms_late() {
    let mut timeline = common::timeline(60.0, 2000.0, &[&[60], &[62, 65], &[64], &[67]]);
    let outcome = matcher().match_chord(&mut timeline, &at(3005.0), &Chord::new([62, 65]));

    assert_eq!(outcome.result, MatchResult::Hit);
    assert_eq!(outcome.beat.as_ref().map(|b| b.global_index), Some(1));
    let error = outcome.timing_error_ms.expect("timed");
    assert!((error - -5.0).abs() < 1e-9, "error {error}");
}

#[test]
fn early_chords_have_positive_error() {
    let mut timeline = common::timeline(60.0, 2000.0, &[&[60]]);
    let outcome = matcher().match_chord(&mut timeline, &at(1800.0), &Chord::new([60]));

    assert_eq!(outcome.result, MatchResult::Hit);
    assert_eq!(outcome.timing_error_ms, Some(200.0));
}

#[test]
fn chords_outside_the_window_consume_nothing() {
    let mut timeline = common::timeline(60.0, 2000.0, &[&[60], &[62]]);
    let outcome = matcher().match_chord(&mut timeline, &at(2500.0), &Chord::new([60]));

    assert_eq!(outcome.result, MatchResult::None);
    assert_eq!(outcome.beat, None);
    assert_eq!(outcome.timing_error_ms, None);
    assert_eq!(timeline.get(0).unwrap().state(), BeatState::Pending);
}

#[test]
fn nearest_beat_wins_and_ties_go_to_the_earlier_one() {
    // 240 bpm: beats every 250 ms, both neighbours of 2125 are 125 ms away.
    let mut timeline = common::timeline(240.0, 2000.0, &[&[60], &[60], &[60]]);

    let tie = matcher().match_chord(&mut timeline, &at(2125.0), &Chord::new([60]));
    assert_eq!(tie.beat.map(|b| b.global_index), Some(0));

    let near = matcher().match_chord(&mut timeline, &at(2480.0), &Chord::new([60]));
    assert_eq!(near.beat.map(|b| b.global_index), Some(2));
}

#[test]
fn rests_are_never_candidates() {
    let mut timeline = common::timeline(60.0, 2000.0, &[&[], &[60]]);
    let outcome = matcher().match_chord(&mut timeline, &at(2000.0), &Chord::new([60]));

    assert_eq!(outcome.result, MatchResult::None);
    assert_eq!(timeline.get(0).unwrap().state(), BeatState::Skipped);
}

#[test]
fn classify_covers_every_branch() {
    assert_eq!(classify(&[60, 64], &[60, 64]), MatchResult::Hit);
    assert_eq!(classify(&[60, 64, 67], &[64]), MatchResult::Partial);
    assert_eq!(classify(&[60], &[60, 72]), MatchResult::Wrong);
    assert_eq!(classify(&[60], &[72]), MatchResult::None);
    assert_eq!(classify(&[60], &[]), MatchResult::None);
}
