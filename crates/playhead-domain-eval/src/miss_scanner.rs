use playhead_domain_score::{BeatEvent, BeatTimeline};
use playhead_ports::types::{BeatState, ElapsedMs, Pitch, VisualHandle};
use serde::Serialize;

#[derive(Clone, Copy, Debug)]
pub struct MissConfig {
    pub grace_ms: f64,
}

/// A state transition the renderer and the recorder need to hear about.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BeatChange {
    pub global_index: u64,
    pub pass_index: u32,
    pub measure: u32,
    pub beat_ordinal: u32,
    pub expected: Vec<Pitch>,
    pub visual: VisualHandle,
    pub state: BeatState,
}

impl BeatChange {
    pub fn of(beat: &BeatEvent) -> Self {
        Self {
            global_index: beat.global_index,
            pass_index: beat.pass_index,
            measure: beat.measure,
            beat_ordinal: beat.beat_ordinal,
            expected: beat.expected.clone(),
            visual: beat.visual,
            state: beat.state(),
        }
    }
}

/// Forward-only cursor that turns expired pending beats into misses.
pub struct MissScanner {
    cfg: MissConfig,
    cursor: u64,
}

impl MissScanner {
    pub fn new(cfg: MissConfig) -> Self {
        Self { cfg, cursor: 0 }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn reset(&mut self, cursor: u64) {
        self.cursor = cursor;
    }

    pub fn grace_ms(&self) -> f64 {
        self.cfg.grace_ms
    }

    pub fn scan(&mut self, timeline: &mut BeatTimeline, elapsed: ElapsedMs) -> Vec<BeatChange> {
        let mut changes = Vec::new();
        let range = timeline.index_range();
        self.cursor = self.cursor.max(range.start);

        while self.cursor < range.end {
            let Some(beat) = timeline.get_mut(self.cursor) else {
                break;
            };

            if beat.state().is_pending() {
                if beat.is_rest() {
                    beat.resolve(BeatState::Skipped);
                } else if beat.target_time_ms + self.cfg.grace_ms < elapsed {
                    beat.resolve(BeatState::Missed);
                } else {
                    break;
                }
                changes.push(BeatChange::of(beat));
            }

            self.cursor += 1;
        }

        changes
    }

    /// True once every materialized beat has been passed.
    pub fn is_exhausted(&self, timeline: &BeatTimeline) -> bool {
        self.cursor >= timeline.index_range().end
    }
}
