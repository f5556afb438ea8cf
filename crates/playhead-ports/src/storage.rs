use crate::types::*;
use serde::{Deserialize, Serialize};

fn default_metronome_volume() -> Volume01 {
    Volume01::new(0.6)
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDto {
    pub selected_midi_in: Option<DeviceId>,
    pub selected_audio_out: Option<DeviceId>,
    pub audio_buffer_size_frames: Option<u32>,
    #[serde(default = "default_metronome_volume")]
    pub metronome_volume: Volume01,
    pub input_offset_ms: i32,
}

impl Default for SettingsDto {
    fn default() -> Self {
        Self {
            selected_midi_in: None,
            selected_audio_out: None,
            audio_buffer_size_frames: None,
            metronome_volume: default_metronome_volume(),
            input_offset_ms: 0,
        }
    }
}

/// One judged beat, as handed to the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub generation: Generation,
    pub global_index: u64,
    pub pass_index: u32,
    pub measure: u32,
    pub beat_ordinal: u32,
    pub expected: Vec<Pitch>,
    pub played: Vec<Pitch>,
    pub state: BeatState,
    pub timing_error_ms: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub generation: Generation,
    pub hit: u32,
    pub partial: u32,
    pub wrong: u32,
    pub missed: u32,
    pub stray: u32,
    pub streak: u32,
    pub best_streak: u32,
    pub score: i64,
    pub accuracy: f32,
    pub mean_timing_error_ms: Option<f64>,
    pub mean_abs_timing_error_ms: Option<f64>,
    pub loops_completed: u32,
}

pub trait StoragePort: Send + Sync {
    fn load_settings(&self) -> Result<SettingsDto, StorageError>;
    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError>;

    fn append_outcomes(&self, records: &[OutcomeRecord]) -> Result<(), StorageError>;
    fn save_summary(&self, summary: &SessionSummary) -> Result<(), StorageError>;
}
