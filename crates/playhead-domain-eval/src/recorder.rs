use crate::matcher::{MatchOutcome, MatchResult};
use crate::miss_scanner::BeatChange;
use playhead_ports::storage::{OutcomeRecord, SessionSummary};
use playhead_ports::types::{BeatState, Generation};

const SCORE_HIT: i64 = 100;
const SCORE_PARTIAL: i64 = 50;
const SCORE_WRONG: i64 = 10;

#[derive(Default, Debug)]
struct Stats {
    hit: u32,
    partial: u32,
    wrong: u32,
    missed: u32,
    stray: u32,
    streak: u32,
    best_streak: u32,
    score: i64,
    timing_sum: f64,
    timing_abs_sum: f64,
    timed: u32,
}

/// Running statistics for one session generation.
pub struct SessionRecorder {
    generation: Generation,
    stats: Stats,
    loops_completed: u32,
}

impl SessionRecorder {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            stats: Stats::default(),
            loops_completed: 0,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn set_loops_completed(&mut self, loops: u32) {
        self.loops_completed = loops;
    }

    /// Folds a match into the stats. Returns a store record for consumed beats only.
    pub fn record_match(&mut self, outcome: &MatchOutcome) -> Option<OutcomeRecord> {
        let stats = &mut self.stats;
        let state = match outcome.result {
            MatchResult::Hit => {
                stats.hit += 1;
                stats.streak += 1;
                stats.best_streak = stats.best_streak.max(stats.streak);
                stats.score += SCORE_HIT;
                BeatState::Hit
            }
            MatchResult::Partial => {
                stats.partial += 1;
                stats.streak = 0;
                stats.score += SCORE_PARTIAL;
                BeatState::Partial
            }
            MatchResult::Wrong => {
                stats.wrong += 1;
                stats.streak = 0;
                stats.score += SCORE_WRONG;
                BeatState::Wrong
            }
            MatchResult::None => {
                stats.stray += 1;
                return None;
            }
        };

        if let Some(error) = outcome.timing_error_ms {
            stats.timing_sum += error;
            stats.timing_abs_sum += error.abs();
            stats.timed += 1;
        }

        let beat = outcome.beat.as_ref()?;
        Some(OutcomeRecord {
            generation: self.generation,
            global_index: beat.global_index,
            pass_index: beat.pass_index,
            measure: beat.measure,
            beat_ordinal: beat.beat_ordinal,
            expected: beat.expected.clone(),
            played: outcome.played.clone(),
            state,
            timing_error_ms: outcome.timing_error_ms,
        })
    }

    /// Folds a scanner transition into the stats. Skips produce no record.
    pub fn record_change(&mut self, change: &BeatChange) -> Option<OutcomeRecord> {
        if change.state != BeatState::Missed {
            return None;
        }
        self.stats.missed += 1;
        self.stats.streak = 0;

        Some(OutcomeRecord {
            generation: self.generation,
            global_index: change.global_index,
            pass_index: change.pass_index,
            measure: change.measure,
            beat_ordinal: change.beat_ordinal,
            expected: change.expected.clone(),
            played: Vec::new(),
            state: BeatState::Missed,
            timing_error_ms: None,
        })
    }

    pub fn summary(&self) -> SessionSummary {
        let stats = &self.stats;
        let judged = stats.hit + stats.partial + stats.wrong + stats.missed;
        let accuracy = if judged == 0 {
            0.0
        } else {
            stats.hit as f32 / judged as f32
        };
        let (mean, mean_abs) = if stats.timed == 0 {
            (None, None)
        } else {
            let n = stats.timed as f64;
            (Some(stats.timing_sum / n), Some(stats.timing_abs_sum / n))
        };

        SessionSummary {
            generation: self.generation,
            hit: stats.hit,
            partial: stats.partial,
            wrong: stats.wrong,
            missed: stats.missed,
            stray: stats.stray,
            streak: stats.streak,
            best_streak: stats.best_streak,
            score: stats.score,
            accuracy,
            mean_timing_error_ms: mean,
            mean_abs_timing_error_ms: mean_abs,
            loops_completed: self.loops_completed,
        }
    }
}
