use playhead_ports::types::Pitch;
use serde::{Deserialize, Serialize};

const MAX_PITCH: Pitch = 127;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    #[error("score has no beats")]
    EmptyScore,
    #[error("invalid tempo: {0} bpm")]
    InvalidTempo(f64),
    #[error("invalid pass length: {0} beats")]
    InvalidPassLength(f64),
    #[error("slot {index}: position {position} does not follow {previous}")]
    NonMonotonicPosition {
        index: usize,
        position: f64,
        previous: f64,
    },
    #[error("slot {index}: position {position} outside the pass")]
    PositionOutOfRange { index: usize, position: f64 },
    #[error("slot {index}: invalid duration {duration}")]
    InvalidDuration { index: usize, duration: f64 },
    #[error("slot {index}: pitch {pitch} out of range")]
    PitchOutOfRange { index: usize, pitch: Pitch },
    #[error("measure {0} not in score")]
    UnknownMeasure(u32),
}

/// Beats per minute, guaranteed finite and positive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub fn new(bpm: f64) -> Result<Self, TimelineError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(TimelineError::InvalidTempo(bpm));
        }
        Ok(Self { bpm })
    }

    pub fn bpm(self) -> f64 {
        self.bpm
    }

    pub fn ms_per_beat(self) -> f64 {
        60_000.0 / self.bpm
    }
}

/// One chordal time-position as delivered by the score compiler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreSlot {
    pub measure: u32,
    /// Offset from the start of the pass, in quarter notes.
    pub position_beats: f64,
    #[serde(default)]
    pub duration_beats: f64,
    /// Empty for rests.
    #[serde(default)]
    pub pitches: Vec<Pitch>,
    /// Renderer element id used to highlight this slot.
    #[serde(default)]
    pub element: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PracticeScore {
    #[serde(default)]
    pub title: Option<String>,
    pub bpm: f64,
    /// Total musical length of one pass, in quarter notes.
    pub beats_per_pass: f64,
    pub slots: Vec<ScoreSlot>,
}

impl PracticeScore {
    pub fn validate(&self) -> Result<(), TimelineError> {
        if self.slots.is_empty() {
            return Err(TimelineError::EmptyScore);
        }
        if !self.beats_per_pass.is_finite() || self.beats_per_pass <= 0.0 {
            return Err(TimelineError::InvalidPassLength(self.beats_per_pass));
        }

        let mut previous: Option<f64> = None;
        for (index, slot) in self.slots.iter().enumerate() {
            let position = slot.position_beats;
            if !position.is_finite() || position < 0.0 || position >= self.beats_per_pass {
                return Err(TimelineError::PositionOutOfRange { index, position });
            }
            if let Some(previous) = previous {
                if position <= previous {
                    return Err(TimelineError::NonMonotonicPosition {
                        index,
                        position,
                        previous,
                    });
                }
            }
            if !slot.duration_beats.is_finite() || slot.duration_beats < 0.0 {
                return Err(TimelineError::InvalidDuration {
                    index,
                    duration: slot.duration_beats,
                });
            }
            if let Some(&pitch) = slot.pitches.iter().find(|&&p| p > MAX_PITCH) {
                return Err(TimelineError::PitchOutOfRange { index, pitch });
            }
            previous = Some(position);
        }
        Ok(())
    }

    /// Position of the first slot belonging to `measure`.
    pub fn measure_start(&self, measure: u32) -> Result<f64, TimelineError> {
        self.slots
            .iter()
            .find(|slot| slot.measure == measure)
            .map(|slot| slot.position_beats)
            .ok_or(TimelineError::UnknownMeasure(measure))
    }

    /// First slot that actually expects something to be played.
    pub fn first_sounding_slot(&self) -> Option<(usize, &ScoreSlot)> {
        self.slots
            .iter()
            .enumerate()
            .find(|(_, slot)| !slot.pitches.is_empty())
    }

    /// Measure containing the given pass-local position.
    pub fn measure_at(&self, position_beats: f64) -> Option<u32> {
        self.slots
            .iter()
            .take_while(|slot| slot.position_beats <= position_beats)
            .last()
            .map(|slot| slot.measure)
    }
}
