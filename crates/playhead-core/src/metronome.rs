use crate::config::Subdivision;
use playhead_ports::types::ElapsedMs;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    /// Lands on a musical beat.
    Beat,
    /// Lands between beats.
    Subdivision,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cue {
    pub index: i64,
    pub at_ms: ElapsedMs,
    pub kind: CueKind,
}

/// Quantized click grid sharing the timeline's time base.
pub struct MetronomeScheduler {
    subdivision: Subdivision,
    lookahead_ms: f64,
    ms_per_beat: f64,
    approach_ms: f64,
    next_index: i64,
}

impl MetronomeScheduler {
    pub fn new(subdivision: Subdivision, lookahead_ms: f64) -> Self {
        Self {
            subdivision,
            lookahead_ms,
            ms_per_beat: 0.0,
            approach_ms: 0.0,
            next_index: 0,
        }
    }

    pub fn subdivision(&self) -> Subdivision {
        self.subdivision
    }

    /// Changing the subdivision re-anchors the grid at `elapsed`.
    pub fn set_subdivision(&mut self, subdivision: Subdivision, elapsed: ElapsedMs) {
        self.subdivision = subdivision;
        self.seek(elapsed);
    }

    pub fn configure(&mut self, ms_per_beat: f64, approach_ms: f64) {
        self.ms_per_beat = ms_per_beat;
        self.approach_ms = approach_ms;
    }

    /// First click not earlier than `elapsed` becomes the next one scheduled.
    pub fn seek(&mut self, elapsed: ElapsedMs) {
        let Some(interval) = self.interval_ms() else {
            self.next_index = 0;
            return;
        };
        self.next_index = ((elapsed - self.phase_ms(interval)) / interval).ceil() as i64;
    }

    /// Clicks due before `elapsed + lookahead`, each returned exactly once. Clicks whose
    /// time already passed are dropped instead of sounding late.
    pub fn schedule(&mut self, elapsed: ElapsedMs) -> Vec<Cue> {
        let Some(interval) = self.interval_ms() else {
            return Vec::new();
        };
        let phase = self.phase_ms(interval);
        let window_end = elapsed + self.lookahead_ms;
        let clicks_per_beat = self.subdivision.clicks_per_beat() as i64;
        let beat_offset = ((self.approach_ms - phase) / interval).round() as i64;

        let mut cues = Vec::new();
        loop {
            let at_ms = phase + self.next_index as f64 * interval;
            if at_ms > window_end {
                break;
            }
            if at_ms >= elapsed {
                let kind = if (self.next_index - beat_offset).rem_euclid(clicks_per_beat) == 0 {
                    CueKind::Beat
                } else {
                    CueKind::Subdivision
                };
                cues.push(Cue {
                    index: self.next_index,
                    at_ms,
                    kind,
                });
            }
            self.next_index += 1;
        }
        cues
    }

    fn interval_ms(&self) -> Option<f64> {
        let clicks = self.subdivision.clicks_per_beat();
        if clicks == 0 || self.ms_per_beat <= 0.0 {
            return None;
        }
        Some(self.ms_per_beat / clicks as f64)
    }

    fn phase_ms(&self, interval: f64) -> f64 {
        self.approach_ms.rem_euclid(interval)
    }
}
