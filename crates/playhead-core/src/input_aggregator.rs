use playhead_domain_eval::Chord;
use playhead_ports::midi::PlayerEvent;
use playhead_ports::types::{Generation, Pitch};
use std::time::{Duration, Instant};

/// A chord closed by the debounce window.
#[derive(Clone, Debug, PartialEq)]
pub struct FlushedChord {
    pub chord: Chord,
    /// Arrival of the first note of the burst.
    pub onset: Instant,
    pub generation: Generation,
}

/// Collects note-ons that arrive within `chord_group_ms` of the first one into a chord.
pub struct InputAggregator {
    window: Duration,
    buffer: Vec<Pitch>,
    onset: Option<Instant>,
    generation: Generation,
}

impl InputAggregator {
    pub fn new(chord_group_ms: f64) -> Self {
        Self {
            window: ms_to_duration(chord_group_ms),
            buffer: Vec::with_capacity(16),
            onset: None,
            generation: Generation::default(),
        }
    }

    pub fn set_window_ms(&mut self, chord_group_ms: f64) {
        self.window = ms_to_duration(chord_group_ms);
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Arrival of the first note of the open burst, if any.
    pub fn onset(&self) -> Option<Instant> {
        self.onset
    }

    /// When the open burst, if any, will be flushed.
    pub fn deadline(&self) -> Option<Instant> {
        self.onset.map(|onset| onset + self.window)
    }

    /// Buffers a device event. Anything but a sounding note-on is ignored. If the event
    /// arrives after the open window has expired, that window is closed and returned first.
    pub fn push(&mut self, event: &PlayerEvent) -> Option<FlushedChord> {
        let pitch = event.message.note_on_pitch()?;

        let closed = match self.deadline() {
            Some(deadline) if event.at >= deadline => self.flush(),
            _ => None,
        };

        if self.onset.is_none() {
            self.onset = Some(event.at);
        }
        self.buffer.push(pitch);
        closed
    }

    /// Flushes the open burst once its window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<FlushedChord> {
        match self.deadline() {
            Some(deadline) if now >= deadline => self.flush(),
            _ => None,
        }
    }

    /// Drops any open burst and tags future chords with `generation`.
    pub fn cancel(&mut self, generation: Generation) {
        self.buffer.clear();
        self.onset = None;
        self.generation = generation;
    }

    fn flush(&mut self) -> Option<FlushedChord> {
        let onset = self.onset.take()?;
        let chord = Chord::new(self.buffer.drain(..));
        if chord.is_empty() {
            return None;
        }
        Some(FlushedChord {
            chord,
            onset,
            generation: self.generation,
        })
    }
}

fn ms_to_duration(ms: f64) -> Duration {
    Duration::from_secs_f64(ms.max(0.0) / 1000.0)
}
