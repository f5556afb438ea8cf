use playhead_ports::midi::{
    MidiError, MidiInputPort, MidiInputStream, PlayerEvent, PlayerEventCallback, RawMidiMessage,
};
use playhead_ports::types::{DeviceId, MidiInputDevice};
use midir::{Ignore, MidiInput};
use std::time::Instant;

pub struct MidirMidiInputPort {
    client_name: String,
}

impl MidirMidiInputPort {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn create_midi_in(&self) -> Result<MidiInput, MidiError> {
        let midi_in = MidiInput::new(&self.client_name)
            .map_err(|e| MidiError::Backend(e.to_string()))?;
        Ok(midi_in)
    }

    fn device_id(index: usize, name: &str) -> DeviceId {
        DeviceId(format!("midir:{}:{}", index, name))
    }
}

/// Channel voice messages pass through untouched. System messages are dropped here.
pub fn decode_message(message: &[u8]) -> Option<RawMidiMessage> {
    let status = *message.first()?;
    if status < 0x80 || status >= 0xF0 {
        return None;
    }
    RawMidiMessage::from_bytes(message)
}

impl Default for MidirMidiInputPort {
    fn default() -> Self {
        Self::new("Playhead")
    }
}

pub struct MidirMidiInputStream {
    connection: Option<midir::MidiInputConnection<PlayerEventCallback>>,
}

impl MidiInputStream for MidirMidiInputStream {
    fn close(mut self: Box<Self>) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
    }
}

impl MidiInputPort for MidirMidiInputPort {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError> {
        let midi_in = self.create_midi_in()?;
        let ports = midi_in.ports();
        let mut devices = Vec::new();

        for (index, port) in ports.iter().enumerate() {
            let name = midi_in
                .port_name(port)
                .unwrap_or_else(|_| "Unknown Input".to_string());
            devices.push(MidiInputDevice {
                id: Self::device_id(index, &name),
                name,
                is_available: true,
            });
        }

        Ok(devices)
    }

    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: PlayerEventCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError> {
        let mut midi_in = self.create_midi_in()?;
        midi_in.ignore(Ignore::All);

        let ports = midi_in.ports();
        let mut selected = None;
        for (index, port) in ports.iter().enumerate() {
            let name = midi_in
                .port_name(port)
                .unwrap_or_else(|_| "Unknown Input".to_string());
            if &Self::device_id(index, &name) == device_id {
                selected = Some(port.clone());
                break;
            }
        }

        let port = selected.ok_or_else(|| MidiError::DeviceNotFound(device_id.to_string()))?;

        let connection = midi_in
            .connect(
                &port,
                "playhead-midi-input",
                move |_stamp, message, callback| {
                    if let Some(message) = decode_message(message) {
                        (callback)(PlayerEvent {
                            at: Instant::now(),
                            message,
                        });
                    }
                },
                cb,
            )
            .map_err(|e| MidiError::Backend(e.to_string()))?;

        log::debug!("midir connected to {}", device_id);
        Ok(Box::new(MidirMidiInputStream {
            connection: Some(connection),
        }))
    }
}
