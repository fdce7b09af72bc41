//! MIDI input for midiecho.
//!
//! Decodes raw bytes from a MIDI input port into control events and forwards
//! them to the session.

use anyhow::{anyhow, Result};
use log::{debug, info};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};
use tokio::sync::mpsc::UnboundedSender;

use super::ControlEvent;

/// Controller number for "all notes off"
const CC_ALL_NOTES_OFF: u8 = 123;

/// MIDI message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note on: channel (0-15), note (0-127), velocity (1-127)
    NoteOn(u8, u8, u8),
    /// Note off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff(u8, u8, u8),
    /// Control change: channel (0-15), controller (0-127), value (0-127)
    ControlChange(u8, u8, u8),
}

impl MidiMessage {
    /// Decode raw MIDI bytes. A note-on with velocity 0 is a note-off.
    ///
    /// Anything other than note and controller messages yields `None`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let ch = status & 0x0F;

        match (status & 0xF0, data) {
            (0x80, [note, vel, ..]) => Some(MidiMessage::NoteOff(ch, note & 0x7F, vel & 0x7F)),
            (0x90, [note, 0, ..]) => Some(MidiMessage::NoteOff(ch, note & 0x7F, 0)),
            (0x90, [note, vel, ..]) => Some(MidiMessage::NoteOn(ch, note & 0x7F, vel & 0x7F)),
            (0xB0, [ctrl, val, ..]) => Some(MidiMessage::ControlChange(ch, ctrl & 0x7F, val & 0x7F)),
            _ => None,
        }
    }

    /// Channel the message was sent on
    pub fn channel(&self) -> u8 {
        match *self {
            MidiMessage::NoteOn(ch, ..)
            | MidiMessage::NoteOff(ch, ..)
            | MidiMessage::ControlChange(ch, ..) => ch,
        }
    }

    /// The engine event this message maps to, if any
    pub fn to_event(&self) -> Option<ControlEvent> {
        match *self {
            MidiMessage::NoteOn(_, note, vel) => Some(ControlEvent::NoteOn {
                note,
                attack: vel as f64 / 127.0,
            }),
            MidiMessage::NoteOff(_, note, _) => Some(ControlEvent::NoteOff { note }),
            MidiMessage::ControlChange(_, CC_ALL_NOTES_OFF, _) => Some(ControlEvent::AllNotesOff),
            MidiMessage::ControlChange(..) => None,
        }
    }
}

/// Decode `bytes` into an event, honouring an optional channel filter
pub fn decode(bytes: &[u8], channel: Option<u8>) -> Option<ControlEvent> {
    let msg = MidiMessage::parse(bytes)?;
    if channel.is_some_and(|ch| ch != msg.channel()) {
        return None;
    }
    msg.to_event()
}

/// Live connection to a MIDI input port; dropping it disconnects
pub struct MidiListener {
    _connection: MidiInputConnection<()>,
    port_name: String,
}

impl MidiListener {
    /// Connect to the port whose name contains `port_name` (or the first port)
    /// and forward decoded events to `sender`.
    pub fn connect(
        port_name: Option<&str>,
        channel: Option<u8>,
        sender: UnboundedSender<ControlEvent>,
    ) -> Result<Self> {
        let mut midi_in = MidiInput::new("midiecho input")?;
        midi_in.ignore(Ignore::All);

        let port = find_port(&midi_in, port_name)?;
        let name = midi_in.port_name(&port)?;

        let connection = midi_in
            .connect(
                &port,
                "midiecho-input",
                move |_stamp, bytes, _| {
                    if let Some(event) = decode(bytes, channel) {
                        debug!("midi {:02X?} -> {:?}", bytes, event);
                        let _ = sender.send(event);
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("failed to connect to MIDI port '{}': {}", name, e))?;

        info!("MIDI input connected to: {}", name);

        Ok(Self {
            _connection: connection,
            port_name: name,
        })
    }

    /// Name of the connected port
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

fn find_port(midi_in: &MidiInput, port_name: Option<&str>) -> Result<MidiInputPort> {
    let ports = midi_in.ports();

    if ports.is_empty() {
        return Err(anyhow!("No MIDI input ports available"));
    }

    match port_name {
        Some(name) => ports
            .iter()
            .find(|p| {
                midi_in
                    .port_name(p)
                    .map(|n| n.contains(name))
                    .unwrap_or(false)
            })
            .cloned()
            .ok_or_else(|| anyhow!("MIDI port '{}' not found", name)),
        None => Ok(ports[0].clone()),
    }
}

/// List available MIDI input ports.
pub fn list_input_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new("midiecho list")?;
    let ports = midi_in.ports();

    let names: Vec<String> = ports
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect();

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_on() {
        assert_eq!(MidiMessage::parse(&[0x90, 60, 100]), Some(MidiMessage::NoteOn(0, 60, 100)));
    }

    #[test]
    fn test_parse_note_on_channel() {
        let msg = MidiMessage::parse(&[0x95, 72, 80]).unwrap();
        assert_eq!(msg, MidiMessage::NoteOn(5, 72, 80));
        assert_eq!(msg.channel(), 5);
    }

    #[test]
    fn test_parse_note_off() {
        assert_eq!(MidiMessage::parse(&[0x80, 60, 64]), Some(MidiMessage::NoteOff(0, 60, 64)));
    }

    #[test]
    fn test_zero_velocity_note_on_is_note_off() {
        assert_eq!(MidiMessage::parse(&[0x90, 60, 0]), Some(MidiMessage::NoteOff(0, 60, 0)));
    }

    #[test]
    fn test_parse_control_change() {
        assert_eq!(MidiMessage::parse(&[0xB0, 1, 64]), Some(MidiMessage::ControlChange(0, 1, 64)));
    }

    #[test]
    fn test_program_change_and_pitch_bend_ignored() {
        assert_eq!(MidiMessage::parse(&[0xC3, 42]), None);
        assert_eq!(MidiMessage::parse(&[0xE0, 0x00, 0x40]), None);
        assert_eq!(decode(&[0xE0, 0x00, 0x40], None), None);
    }

    #[test]
    fn test_parse_rejects_short_and_unknown() {
        assert_eq!(MidiMessage::parse(&[]), None);
        assert_eq!(MidiMessage::parse(&[0x90, 60]), None);
        assert_eq!(MidiMessage::parse(&[0xF8]), None);
    }

    #[test]
    fn test_note_on_event_scales_velocity() {
        let event = MidiMessage::NoteOn(0, 60, 127).to_event();
        assert_eq!(event, Some(ControlEvent::NoteOn { note: 60, attack: 1.0 }));
    }

    #[test]
    fn test_all_notes_off_event() {
        assert_eq!(decode(&[0xB0, 123, 0], None), Some(ControlEvent::AllNotesOff));
        assert_eq!(decode(&[0xB0, 7, 100], None), None);
    }

    #[test]
    fn test_channel_filter() {
        assert_eq!(decode(&[0x91, 60, 100], Some(0)), None);
        assert_eq!(
            decode(&[0x91, 60, 0], Some(1)),
            Some(ControlEvent::NoteOff { note: 60 })
        );
        assert!(decode(&[0x9F, 60, 100], None).is_some());
    }

    #[test]
    fn test_list_input_ports() {
        // Just verify it doesn't panic
        let _ = list_input_ports();
    }
}
