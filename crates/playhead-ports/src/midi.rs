use crate::types::*;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};

const STATUS_NOTE_ON: u8 = 0x90;

/// One raw channel message as delivered by the device: `(status, pitch, velocity)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMidiMessage {
    pub status: u8,
    pub pitch: u8,
    pub velocity: u8,
}

impl RawMidiMessage {
    pub fn new(status: u8, pitch: u8, velocity: u8) -> Self {
        Self {
            status,
            pitch,
            velocity,
        }
    }

    pub fn from_bytes(message: &[u8]) -> Option<Self> {
        match message {
            [status, pitch, velocity, ..] => Some(Self::new(*status, *pitch, *velocity)),
            [status, pitch] => Some(Self::new(*status, *pitch, 0)),
            _ => None,
        }
    }

    /// Pitch of a note-on with non-zero velocity on any channel. Everything else,
    /// including running-status note-offs and system messages, yields `None`.
    pub fn note_on_pitch(&self) -> Option<Pitch> {
        if self.status & 0xF0 != STATUS_NOTE_ON {
            return None;
        }
        if self.velocity == 0 || self.pitch > 127 {
            return None;
        }
        Some(self.pitch)
    }
}

/// Raw input from MIDI devices, stamped on arrival.
#[derive(Clone, Copy, Debug)]
pub struct PlayerEvent {
    pub at: Instant,
    pub message: RawMidiMessage,
}

#[derive(thiserror::Error, Debug)]
pub enum MidiError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// MIDI input stream handle: drop closes it.
pub trait MidiInputStream: Send {
    fn close(self: Box<Self>);
}

pub type PlayerEventCallback = Arc<dyn Fn(PlayerEvent) + Send + Sync + 'static>;

pub trait MidiInputPort: Send + Sync {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError>;

    /// Open input stream: implementation should invoke cb from a background thread/callback.
    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: PlayerEventCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError>;
}
