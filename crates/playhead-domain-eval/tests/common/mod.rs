use playhead_domain_score::{BeatTimeline, PracticeScore, ScoreSlot, Tempo};

pub fn timeline(bpm: f64, approach_ms: f64, chords: &[&[u8]]) -> BeatTimeline {
    let score = PracticeScore {
        title: None,
        bpm,
        beats_per_pass: chords.len() as f64,
        slots: chords
            .iter()
            .enumerate()
            .map(|(index, pitches)| ScoreSlot {
                measure: 1 + index as u32 / 4,
                position_beats: index as f64,
                duration_beats: 1.0,
                pitches: pitches.to_vec(),
                element: index as u64,
            })
            .collect(),
    };
    let mut timeline =
        BeatTimeline::new(&score, Tempo::new(bpm).expect("tempo"), approach_ms, 3).expect("score");
    timeline.materialize(0, 1);
    timeline
}
