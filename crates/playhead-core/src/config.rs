use serde::{Deserialize, Serialize};

fn default_timing_window_ms() -> f64 {
    300.0
}

fn default_chord_group_ms() -> f64 {
    80.0
}

fn default_lookahead_ms() -> f64 {
    100.0
}

fn default_loop_copies() -> u32 {
    3
}

/// Clicks per beat of the metronome.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subdivision {
    #[default]
    Off,
    Beat,
    Half,
    Quarter,
}

impl Subdivision {
    pub fn clicks_per_beat(self) -> u32 {
        match self {
            Subdivision::Off => 0,
            Subdivision::Beat => 1,
            Subdivision::Half => 2,
            Subdivision::Quarter => 4,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("loop_copies must be at least 3, got {0}")]
    TooFewCopies(u32),
    #[error("max_passes must be at least 1")]
    NoPasses,
}

/// Per-session engine settings. `grace_ms` has no default and must be given.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PracticeConfig {
    /// Overrides the score's own tempo when set.
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default = "default_timing_window_ms")]
    pub timing_window_ms: f64,
    #[serde(default = "default_chord_group_ms")]
    pub chord_group_ms: f64,
    pub grace_ms: f64,
    #[serde(default)]
    pub metronome: Subdivision,
    #[serde(default = "default_lookahead_ms")]
    pub lookahead_ms: f64,
    #[serde(default = "default_loop_copies")]
    pub loop_copies: u32,
    /// `None` loops until stopped.
    #[serde(default)]
    pub max_passes: Option<u32>,
}

impl PracticeConfig {
    pub fn new(grace_ms: f64) -> Self {
        Self {
            bpm: None,
            timing_window_ms: default_timing_window_ms(),
            chord_group_ms: default_chord_group_ms(),
            grace_ms,
            metronome: Subdivision::Off,
            lookahead_ms: default_lookahead_ms(),
            loop_copies: default_loop_copies(),
            max_passes: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(bpm) = self.bpm {
            positive("bpm", bpm)?;
        }
        positive("timing_window_ms", self.timing_window_ms)?;
        positive("grace_ms", self.grace_ms)?;
        non_negative("chord_group_ms", self.chord_group_ms)?;
        non_negative("lookahead_ms", self.lookahead_ms)?;
        if self.loop_copies < 3 {
            return Err(ConfigError::TooFewCopies(self.loop_copies));
        }
        if self.max_passes == Some(0) {
            return Err(ConfigError::NoPasses);
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { name, value })
    }
}
