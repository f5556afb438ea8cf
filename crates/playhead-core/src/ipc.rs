use crate::config::{PracticeConfig, Subdivision};
use playhead_domain_eval::MatchResult;
use playhead_domain_score::PracticeScore;
use playhead_ports::storage::{SessionSummary, SettingsDto};
use playhead_ports::types::{
    AudioConfig, AudioOutputDevice, BeatState, DeviceId, MidiInputDevice, Pitch, VisualHandle,
    Volume01,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ScoreSource {
    /// Compiled practice score on disk, as JSON.
    JsonFile(String),
    Inline(PracticeScore),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    ListMidiInputs,
    SelectMidiInput { device_id: DeviceId },
    ListAudioOutputs,
    SelectAudioOutput { device_id: DeviceId, config: Option<AudioConfig> },
    LoadScore { source: ScoreSource },
    Configure { config: PracticeConfig },
    StartPractice,
    StartFromMeasure { measure: u32 },
    PausePractice,
    ResumePractice,
    StopPractice,
    SetTempo { bpm: f64 },
    SetMetronome { subdivision: Subdivision },
    SetMetronomeVolume { volume: Volume01 },
    SetInputOffsetMs { ms: i32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Ready,
    Running,
    Paused,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    MidiInputsUpdated { devices: Vec<MidiInputDevice> },
    AudioOutputsUpdated { devices: Vec<AudioOutputDevice> },
    SessionStateUpdated { state: SessionState, settings: SettingsDto },
    PositionUpdated {
        elapsed_ms: f64,
        scroll_offset_px: f64,
        musical_position: f64,
        /// Measure under the playhead, `None` during the lead-in.
        measure: Option<u32>,
        loop_count: u32,
        playing: bool,
    },
    BeatStateChanged {
        global_index: u64,
        visual: VisualHandle,
        state: BeatState,
    },
    HideRegionBefore { measure: u32 },
    Teleported {
        loop_count: u32,
        origin_px: f64,
        copy: u32,
        new_pass: u32,
    },
    MatchFeedback {
        global_index: Option<u64>,
        result: MatchResult,
        timing_error_ms: Option<f64>,
        expected: Vec<Pitch>,
        played: Vec<Pitch>,
    },
    StatsUpdated { summary: SessionSummary },
    SessionFinished { summary: SessionSummary },
}
