use playhead_domain_score::{BeatEvent, BeatTimeline};
use playhead_ports::types::{BeatState, ElapsedMs, Pitch, VisualHandle};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug)]
pub struct MatchConfig {
    pub timing_window_ms: f64,
}

/// A set of pitches meant to sound together. Always deduplicated and ascending.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    pitches: Vec<Pitch>,
}

impl Chord {
    pub fn new(pitches: impl IntoIterator<Item = Pitch>) -> Self {
        let mut pitches: Vec<Pitch> = pitches.into_iter().collect();
        pitches.sort_unstable();
        pitches.dedup();
        Self { pitches }
    }

    pub fn pitches(&self) -> &[Pitch] {
        &self.pitches
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    Hit,
    Partial,
    Wrong,
    None,
}

impl MatchResult {
    fn beat_state(self) -> Option<BeatState> {
        match self {
            MatchResult::Hit => Some(BeatState::Hit),
            MatchResult::Partial => Some(BeatState::Partial),
            MatchResult::Wrong => Some(BeatState::Wrong),
            MatchResult::None => None,
        }
    }
}

/// Read-only view of the scroll state at the moment a chord was played.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollSnapshot {
    pub elapsed_ms: ElapsedMs,
    pub px_per_ms: f64,
    pub target_x_px: f64,
}

impl ScrollSnapshot {
    pub fn screen_x(&self, beat: &BeatEvent) -> f64 {
        self.target_x_px + (beat.target_time_ms - self.elapsed_ms) * self.px_per_ms
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchedBeat {
    pub global_index: u64,
    pub pass_index: u32,
    pub measure: u32,
    pub beat_ordinal: u32,
    pub expected: Vec<Pitch>,
    pub visual: VisualHandle,
}

impl From<&BeatEvent> for MatchedBeat {
    fn from(beat: &BeatEvent) -> Self {
        Self {
            global_index: beat.global_index,
            pass_index: beat.pass_index,
            measure: beat.measure,
            beat_ordinal: beat.beat_ordinal,
            expected: beat.expected.clone(),
            visual: beat.visual,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchOutcome {
    /// Nearest candidate in the window. Present with `MatchResult::None` when the chord
    /// shared no pitch with it, in which case the beat stays pending.
    pub beat: Option<MatchedBeat>,
    pub played: Vec<Pitch>,
    /// Positive when the chord came early, negative when late.
    pub timing_error_ms: Option<f64>,
    pub result: MatchResult,
}

impl MatchOutcome {
    fn unmatched(played: Vec<Pitch>) -> Self {
        Self {
            beat: None,
            played,
            timing_error_ms: None,
            result: MatchResult::None,
        }
    }

    pub fn consumed(&self) -> bool {
        self.result != MatchResult::None
    }
}

pub struct Matcher {
    cfg: MatchConfig,
}

impl Matcher {
    pub fn new(cfg: MatchConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> MatchConfig {
        self.cfg
    }

    pub fn match_chord(
        &self,
        timeline: &mut BeatTimeline,
        snapshot: &ScrollSnapshot,
        chord: &Chord,
    ) -> MatchOutcome {
        let played = chord.pitches().to_vec();
        let candidate = match self.nearest_pending(timeline, snapshot) {
            Some(index) => timeline.get_mut(index),
            None => None,
        };
        let Some(beat) = candidate else {
            return MatchOutcome::unmatched(played);
        };

        let result = classify(&beat.expected, chord.pitches());
        if let Some(state) = result.beat_state() {
            beat.resolve(state);
        }

        MatchOutcome {
            beat: Some(MatchedBeat::from(&*beat)),
            played,
            timing_error_ms: Some(beat.target_time_ms - snapshot.elapsed_ms),
            result,
        }
    }

    /// Pending, non-rest beat closest to the target line, if it lies inside the window.
    /// Equal distances resolve to the earlier beat.
    fn nearest_pending(&self, timeline: &BeatTimeline, snapshot: &ScrollSnapshot) -> Option<u64> {
        let window_px = self.cfg.timing_window_ms * snapshot.px_per_ms;
        let mut best: Option<(f64, u64)> = None;

        for beat in timeline.beats() {
            if !beat.state().is_pending() || beat.is_rest() {
                continue;
            }
            let distance = (snapshot.screen_x(beat) - snapshot.target_x_px).abs();
            if distance > window_px {
                continue;
            }
            match best {
                Some((best_distance, _)) if best_distance <= distance => {}
                _ => best = Some((distance, beat.global_index)),
            }
        }

        best.map(|(_, index)| index)
    }
}

/// Compares sorted, deduplicated pitch sets.
pub fn classify(expected: &[Pitch], played: &[Pitch]) -> MatchResult {
    let overlap = played.iter().filter(|p| expected.contains(p)).count();
    let extra = played.len() - overlap;

    if overlap == 0 {
        MatchResult::None
    } else if extra > 0 {
        MatchResult::Wrong
    } else if overlap == expected.len() {
        MatchResult::Hit
    } else {
        MatchResult::Partial
    }
}
