use playhead_ports::storage::SettingsDto;
use playhead_ports::types::{Generation, Volume01};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Values shared with the audio thread.
#[derive(Debug)]
pub struct AudioParams {
    metronome_volume: AtomicU32,
    generation: AtomicU64,
}

impl AudioParams {
    pub fn new(settings: &SettingsDto) -> Self {
        Self {
            metronome_volume: AtomicU32::new(settings.metronome_volume.get().to_bits()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn set_metronome_volume(&self, volume: Volume01) {
        self.metronome_volume
            .store(volume.get().to_bits(), Ordering::Relaxed);
    }

    pub fn metronome_volume(&self) -> f32 {
        f32::from_bits(self.metronome_volume.load(Ordering::Relaxed))
    }

    /// Cues tagged with any other generation are dropped by the renderer.
    pub fn set_generation(&self, generation: Generation) {
        self.generation.store(generation.0, Ordering::Release);
    }

    pub fn generation(&self) -> Generation {
        Generation(self.generation.load(Ordering::Acquire))
    }
}
