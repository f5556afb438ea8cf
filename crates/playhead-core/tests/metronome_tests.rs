use playhead_core::{Cue, CueKind, MetronomeScheduler, Subdivision};
use pretty_assertions::assert_eq;

fn times(cues: &[Cue]) -> Vec<f64> {
    cues.iter().map(|cue| cue.at_ms).collect()
}

#[test]
fn beat_clicks_land_on_musical_beats() {
    let mut metronome = MetronomeScheduler::new(Subdivision::Beat, 100.0);
    metronome.configure(500.0, 2000.0);
    metronome.seek(0.0);

    let first = metronome.schedule(0.0);
    assert_eq!(
        first,
        vec![Cue {
            index: 0,
            at_ms: 0.0,
            kind: CueKind::Beat
        }]
    );
    assert!(metronome.schedule(50.0).is_empty());
    assert_eq!(times(&metronome.schedule(450.0)), vec![500.0]);
}

#[test]
fn half_subdivision_follows_approach_phase() {
    let mut metronome = MetronomeScheduler::new(Subdivision::Half, 100.0);
    metronome.configure(500.0, 2100.0);
    metronome.seek(0.0);

    let mut cues = Vec::new();
    for step in 0..=10 {
        cues.extend(metronome.schedule(step as f64 * 100.0));
    }

    assert_eq!(times(&cues), vec![100.0, 350.0, 600.0, 850.0, 1100.0]);
    let kinds: Vec<CueKind> = cues.iter().map(|cue| cue.kind).collect();
    assert_eq!(
        kinds,
        vec![
            CueKind::Beat,
            CueKind::Subdivision,
            CueKind::Beat,
            CueKind::Subdivision,
            CueKind::Beat
        ]
    );
}

#[test]
fn quarter_subdivision_has_four_clicks_per_beat() {
    let mut metronome = MetronomeScheduler::new(Subdivision::Quarter, 1000.0);
    metronome.configure(1000.0, 0.0);
    metronome.seek(0.0);

    let cues = metronome.schedule(0.0);
    assert_eq!(times(&cues), vec![0.0, 250.0, 500.0, 750.0, 1000.0]);
    let beats = cues.iter().filter(|cue| cue.kind == CueKind::Beat).count();
    assert_eq!(beats, 2);
}

#[test]
fn off_never_schedules() {
    let mut metronome = MetronomeScheduler::new(Subdivision::Off, 100.0);
    metronome.configure(500.0, 0.0);
    metronome.seek(0.0);
    assert!(metronome.schedule(10_000.0).is_empty());
}

#[test]
fn past_clicks_are_dropped_and_never_repeated() {
    let mut metronome = MetronomeScheduler::new(Subdivision::Beat, 100.0);
    metronome.configure(500.0, 0.0);
    metronome.seek(0.0);

    let cues = metronome.schedule(1000.0);
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].index, 2);
    assert_eq!(cues[0].at_ms, 1000.0);
    assert!(metronome.schedule(1000.0).is_empty());
}

#[test]
fn seek_restarts_from_the_next_click() {
    let mut metronome = MetronomeScheduler::new(Subdivision::Beat, 100.0);
    metronome.configure(500.0, 0.0);
    metronome.seek(0.0);
    metronome.schedule(0.0);

    metronome.seek(1_240.0);
    assert_eq!(times(&metronome.schedule(1_450.0)), vec![1_500.0]);
}
