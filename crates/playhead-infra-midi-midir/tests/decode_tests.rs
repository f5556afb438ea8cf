use playhead_infra_midi_midir::decode_message;
use playhead_ports::midi::RawMidiMessage;
use pretty_assertions::assert_eq;

#[test]
fn channel_messages_become_raw_triples() {
    assert_eq!(
        decode_message(&[0x91, 60, 100]),
        Some(RawMidiMessage::new(0x91, 60, 100))
    );
    assert_eq!(
        decode_message(&[0x80, 60, 0]).and_then(|m| m.note_on_pitch()),
        None
    );
    assert_eq!(
        decode_message(&[0x90, 64, 0]).and_then(|m| m.note_on_pitch()),
        None
    );
}

#[test]
fn system_and_truncated_messages_are_dropped() {
    assert_eq!(decode_message(&[0xF8]), None);
    assert_eq!(decode_message(&[0xF0, 0x7E, 0x7F, 0xF7]), None);
    assert_eq!(decode_message(&[]), None);
    assert_eq!(decode_message(&[0x90]), None);
    assert_eq!(decode_message(&[0x3C, 0x40]), None);
}
