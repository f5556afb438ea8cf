use crate::model::{PracticeScore, Tempo, TimelineError};
use playhead_ports::types::{BeatState, ElapsedMs, Pitch, VisualHandle};
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BeatEvent {
    pub global_index: u64,
    pub pass_index: u32,
    pub measure: u32,
    pub beat_ordinal: u32,
    /// Deduplicated, ascending. Empty means rest.
    pub expected: Vec<Pitch>,
    /// Quarter notes from the start of pass 0.
    pub musical_position: f64,
    pub target_time_ms: ElapsedMs,
    pub visual: VisualHandle,
    state: BeatState,
}

impl BeatEvent {
    pub fn state(&self) -> BeatState {
        self.state
    }

    pub fn is_rest(&self) -> bool {
        self.expected.is_empty()
    }

    /// Moves a pending beat into a terminal state. Returns false, leaving the beat
    /// untouched, if it was already resolved.
    pub fn resolve(&mut self, next: BeatState) -> bool {
        if !self.state.is_pending() || next.is_pending() {
            return false;
        }
        self.state = next;
        true
    }
}

/// All beats of one loop pass. Replaced wholesale, never reset in place.
#[derive(Clone, Debug)]
pub struct PassBatch {
    pub pass_index: u32,
    pub beats: Vec<BeatEvent>,
}

impl PassBatch {
    /// True once no beat in the pass can still be matched or missed.
    pub fn is_settled(&self) -> bool {
        self.beats.iter().all(|beat| !beat.state().is_pending())
    }
}

#[derive(Clone, Debug)]
struct PreparedSlot {
    measure: u32,
    beat_ordinal: u32,
    position_beats: f64,
    expected: Vec<Pitch>,
    element: u64,
}

/// Flat, time-addressable view over a bounded window of consecutive passes.
#[derive(Clone, Debug)]
pub struct BeatTimeline {
    slots: Vec<PreparedSlot>,
    beats_per_pass: f64,
    tempo: Tempo,
    approach_ms: f64,
    copies: u32,
    batches: VecDeque<PassBatch>,
}

impl BeatTimeline {
    pub fn new(
        score: &PracticeScore,
        tempo: Tempo,
        approach_ms: f64,
        copies: u32,
    ) -> Result<Self, TimelineError> {
        score.validate()?;

        let mut slots = Vec::with_capacity(score.slots.len());
        let mut ordinal = 0u32;
        let mut current_measure = None;
        for slot in &score.slots {
            if current_measure != Some(slot.measure) {
                current_measure = Some(slot.measure);
                ordinal = 0;
            }
            ordinal += 1;

            let mut expected = slot.pitches.clone();
            expected.sort_unstable();
            expected.dedup();

            slots.push(PreparedSlot {
                measure: slot.measure,
                beat_ordinal: ordinal,
                position_beats: slot.position_beats,
                expected,
                element: slot.element,
            });
        }

        Ok(Self {
            slots,
            beats_per_pass: score.beats_per_pass,
            tempo,
            approach_ms,
            copies: copies.max(1),
            batches: VecDeque::new(),
        })
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn ms_per_beat(&self) -> f64 {
        self.tempo.ms_per_beat()
    }

    pub fn approach_ms(&self) -> f64 {
        self.approach_ms
    }

    pub fn beats_per_pass(&self) -> f64 {
        self.beats_per_pass
    }

    pub fn pass_len(&self) -> usize {
        self.slots.len()
    }

    pub fn pass_duration_ms(&self) -> f64 {
        self.beats_per_pass * self.ms_per_beat()
    }

    /// Elapsed time at which `pass_index` starts crossing the target line.
    pub fn pass_start_ms(&self, pass_index: u32) -> ElapsedMs {
        self.target_time_ms(pass_index as f64 * self.beats_per_pass)
    }

    pub fn target_time_ms(&self, musical_position: f64) -> ElapsedMs {
        self.approach_ms + musical_position * self.ms_per_beat()
    }

    pub fn musical_position_at(&self, elapsed: ElapsedMs) -> f64 {
        (elapsed - self.approach_ms) / self.ms_per_beat()
    }

    pub fn build_pass(&self, pass_index: u32) -> PassBatch {
        let pass_offset = pass_index as f64 * self.beats_per_pass;
        let base_index = pass_index as u64 * self.slots.len() as u64;
        let copy = pass_index % self.copies;

        let beats = self
            .slots
            .iter()
            .enumerate()
            .map(|(local, slot)| {
                let musical_position = pass_offset + slot.position_beats;
                BeatEvent {
                    global_index: base_index + local as u64,
                    pass_index,
                    measure: slot.measure,
                    beat_ordinal: slot.beat_ordinal,
                    expected: slot.expected.clone(),
                    musical_position,
                    target_time_ms: self.target_time_ms(musical_position),
                    visual: VisualHandle {
                        copy,
                        element: slot.element,
                    },
                    state: if slot.expected.is_empty() {
                        BeatState::Skipped
                    } else {
                        BeatState::Pending
                    },
                }
            })
            .collect();

        PassBatch { pass_index, beats }
    }

    /// Discards every batch and materializes `count` passes starting at `first_pass`.
    pub fn materialize(&mut self, first_pass: u32, count: u32) {
        self.batches.clear();
        for pass_index in first_pass..first_pass.saturating_add(count.max(1)) {
            let batch = self.build_pass(pass_index);
            self.batches.push_back(batch);
        }
    }

    /// Appends a fresh, unevaluated batch for the pass after the newest one.
    pub fn push_next_pass(&mut self) -> u32 {
        let pass_index = self
            .batches
            .back()
            .map(|batch| batch.pass_index + 1)
            .unwrap_or(0);
        let batch = self.build_pass(pass_index);
        self.batches.push_back(batch);
        pass_index
    }

    pub fn retire_oldest(&mut self) -> Option<PassBatch> {
        self.batches.pop_front()
    }

    /// Retires settled batches from the front while more than `keep` are materialized.
    /// A batch with a pending beat stays, and so does everything behind it.
    pub fn retire_settled(&mut self, keep: usize) -> Vec<u32> {
        let mut retired = Vec::new();
        while self.batches.len() > keep {
            match self.batches.front() {
                Some(batch) if batch.is_settled() => {
                    retired.push(batch.pass_index);
                    self.batches.pop_front();
                }
                _ => break,
            }
        }
        retired
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }

    pub fn batches(&self) -> impl Iterator<Item = &PassBatch> {
        self.batches.iter()
    }

    pub fn first_pass(&self) -> Option<u32> {
        self.batches.front().map(|batch| batch.pass_index)
    }

    pub fn last_pass(&self) -> Option<u32> {
        self.batches.back().map(|batch| batch.pass_index)
    }

    /// Global index range currently materialized.
    pub fn index_range(&self) -> std::ops::Range<u64> {
        let len = self.slots.len() as u64;
        match (self.first_pass(), self.last_pass()) {
            (Some(first), Some(last)) => first as u64 * len..(last as u64 + 1) * len,
            _ => 0..0,
        }
    }

    pub fn beats(&self) -> impl Iterator<Item = &BeatEvent> {
        self.batches.iter().flat_map(|batch| batch.beats.iter())
    }

    pub fn beats_mut(&mut self) -> impl Iterator<Item = &mut BeatEvent> {
        self.batches.iter_mut().flat_map(|batch| batch.beats.iter_mut())
    }

    pub fn get(&self, global_index: u64) -> Option<&BeatEvent> {
        let (slot, local) = self.locate(global_index)?;
        self.batches.get(slot)?.beats.get(local)
    }

    pub fn get_mut(&mut self, global_index: u64) -> Option<&mut BeatEvent> {
        let (slot, local) = self.locate(global_index)?;
        self.batches.get_mut(slot)?.beats.get_mut(local)
    }

    fn locate(&self, global_index: u64) -> Option<(usize, usize)> {
        let len = self.slots.len() as u64;
        let first = self.first_pass()? as u64;
        if len == 0 {
            return None;
        }
        let pass = global_index / len;
        let slot = pass.checked_sub(first)? as usize;
        Some((slot, (global_index % len) as usize))
    }

    /// Marks every pending pass-0 beat before `position_beats` as skipped. Later passes
    /// are untouched. Returns the global indices that changed.
    pub fn skip_before(&mut self, position_beats: f64) -> Vec<u64> {
        let mut changed = Vec::new();
        let Some(batch) = self.batches.iter_mut().find(|batch| batch.pass_index == 0) else {
            return changed;
        };
        for beat in batch.beats.iter_mut() {
            if beat.musical_position >= position_beats {
                break;
            }
            if beat.resolve(BeatState::Skipped) {
                changed.push(beat.global_index);
            }
        }
        changed
    }

    /// Recomputes target times for a new tempo and approach, keeping every beat state.
    pub fn retime(&mut self, tempo: Tempo, approach_ms: f64) {
        self.tempo = tempo;
        self.approach_ms = approach_ms;
        let ms_per_beat = tempo.ms_per_beat();
        for beat in self.batches.iter_mut().flat_map(|batch| batch.beats.iter_mut()) {
            beat.target_time_ms = approach_ms + beat.musical_position * ms_per_beat;
        }
    }
}
