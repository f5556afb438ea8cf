use crate::audio_params::AudioParams;
use crate::metronome::CueKind;
use playhead_ports::audio::AudioRenderCallback;
use playhead_ports::types::{Generation, SampleTime};
use rtrb::Consumer;
use std::f32::consts::TAU;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

const BEAT_FREQ_HZ: f32 = 1760.0;
const SUBDIVISION_FREQ_HZ: f32 = 1320.0;
const SUBDIVISION_GAIN: f32 = 0.6;
const CLICK_MS: f32 = 30.0;

/// A metronome click placed on the output device's sample clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduledCue {
    pub sample_time: SampleTime,
    pub kind: CueKind,
    pub generation: Generation,
}

/// Last sample time rendered by the output stream.
pub struct AudioClock {
    sample_time: AtomicU64,
}

impl AudioClock {
    pub fn new() -> Self {
        Self {
            sample_time: AtomicU64::new(0),
        }
    }

    pub fn set(&self, sample_time: SampleTime) {
        self.sample_time.store(sample_time, Ordering::Relaxed);
    }

    pub fn get(&self) -> SampleTime {
        self.sample_time.load(Ordering::Relaxed)
    }
}

impl Default for AudioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug)]
struct Voice {
    phase: f32,
    step: f32,
    gain: f32,
    remaining: u32,
    decay: f32,
}

/// Synthesizes decaying sine clicks for queued cues.
pub struct ClickGraph {
    params: Arc<AudioParams>,
    clock: Arc<AudioClock>,
    consumer: Consumer<ScheduledCue>,
    sample_rate_hz: u32,
    pending: Option<ScheduledCue>,
    voice: Option<Voice>,
}

impl ClickGraph {
    pub fn new(
        params: Arc<AudioParams>,
        consumer: Consumer<ScheduledCue>,
        clock: Arc<AudioClock>,
        sample_rate_hz: u32,
    ) -> Self {
        Self {
            params,
            clock,
            consumer,
            sample_rate_hz: sample_rate_hz.max(1),
            pending: None,
            voice: None,
        }
    }

    /// Next cue of the live generation that starts before `sample_time_end`.
    fn next_cue(&mut self, sample_time_end: SampleTime) -> Option<ScheduledCue> {
        let live = self.params.generation();
        loop {
            let cue = match self.pending.take() {
                Some(cue) => cue,
                None => self.consumer.pop().ok()?,
            };
            if cue.generation != live {
                continue;
            }
            if cue.sample_time >= sample_time_end {
                self.pending = Some(cue);
                return None;
            }
            return Some(cue);
        }
    }

    fn trigger(&mut self, kind: CueKind) {
        let (freq, gain) = match kind {
            CueKind::Beat => (BEAT_FREQ_HZ, 1.0),
            CueKind::Subdivision => (SUBDIVISION_FREQ_HZ, SUBDIVISION_GAIN),
        };
        let sr = self.sample_rate_hz as f32;
        let length = (CLICK_MS * sr / 1000.0).max(1.0) as u32;
        self.voice = Some(Voice {
            phase: 0.0,
            step: TAU * freq / sr,
            gain,
            remaining: length,
            decay: (-6.0 / length as f32).exp(),
        });
    }

    fn render_segment(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        let volume = self.params.metronome_volume();
        for (l, r) in out_l.iter_mut().zip(out_r.iter_mut()) {
            let Some(voice) = self.voice.as_mut() else {
                *l = 0.0;
                *r = 0.0;
                continue;
            };
            let sample = voice.phase.sin() * voice.gain * volume;
            *l = sample;
            *r = sample;
            voice.phase = (voice.phase + voice.step) % TAU;
            voice.gain *= voice.decay;
            voice.remaining -= 1;
            if voice.remaining == 0 {
                self.voice = None;
            }
        }
    }
}

impl AudioRenderCallback for ClickGraph {
    fn render(&mut self, sample_time_start: SampleTime, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = out_l.len().min(out_r.len());
        let sample_time_end = sample_time_start.saturating_add(frames as u64);

        let mut cursor_frame = 0usize;
        while let Some(cue) = self.next_cue(sample_time_end) {
            let cue_frame = cue.sample_time.saturating_sub(sample_time_start) as usize;
            if cue_frame > cursor_frame {
                self.render_segment(
                    &mut out_l[cursor_frame..cue_frame],
                    &mut out_r[cursor_frame..cue_frame],
                );
                cursor_frame = cue_frame;
            }
            self.trigger(cue.kind);
        }

        if cursor_frame < frames {
            self.render_segment(
                &mut out_l[cursor_frame..frames],
                &mut out_r[cursor_frame..frames],
            );
        }

        self.clock.set(sample_time_end);
    }
}
