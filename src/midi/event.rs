use std::fmt;

/// A MIDI channel, 0..=15 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel(u8);

impl Channel {
    /// Panics if `channel` is outside 0..=15.
    pub fn new(channel: u8) -> Self {
        assert!(channel <= 0x0F, "MIDI channel out of range: {}", channel);
        Channel(channel)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// A 7-bit MIDI data byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct U7(u8);

impl U7 {
    /// Panics if `value` has the high bit set.
    pub fn new(value: u8) -> Self {
        assert!(value <= 0x7F, "MIDI data byte out of range: {}", value);
        U7(value)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// The internal event representation shared by the local clock path and the
/// remote ingest path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn {
        channel: Channel,
        note: U7,
        velocity: U7,
    },
    NoteOff {
        channel: Channel,
        note: U7,
        velocity: U7,
    },
    ControlChange {
        channel: Channel,
        controller: U7,
        value: U7,
    },
    Clock,
    Start,
    Stop,
    Continue,
}

/// Message type tag, used for dispatch and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    NoteOn,
    NoteOff,
    ControlChange,
    Clock,
    Start,
    Stop,
    Continue,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::NoteOn => "Note On",
            MessageKind::NoteOff => "Note Off",
            MessageKind::ControlChange => "CC",
            MessageKind::Clock => "Clock",
            MessageKind::Start => "Start",
            MessageKind::Stop => "Stop",
            MessageKind::Continue => "Continue",
        };
        f.write_str(name)
    }
}

pub const STATUS_NOTE_OFF: u8 = 0x80;
pub const STATUS_NOTE_ON: u8 = 0x90;
pub const STATUS_CONTROL_CHANGE: u8 = 0xB0;
pub const STATUS_CLOCK: u8 = 0xF8;
pub const STATUS_START: u8 = 0xFA;
pub const STATUS_CONTINUE: u8 = 0xFB;
pub const STATUS_STOP: u8 = 0xFC;

impl MidiEvent {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        MidiEvent::NoteOn {
            channel: Channel::new(channel),
            note: U7::new(note),
            velocity: U7::new(velocity),
        }
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        MidiEvent::NoteOff {
            channel: Channel::new(channel),
            note: U7::new(note),
            velocity: U7::new(velocity),
        }
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        MidiEvent::ControlChange {
            channel: Channel::new(channel),
            controller: U7::new(controller),
            value: U7::new(value),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            MidiEvent::NoteOn { .. } => MessageKind::NoteOn,
            MidiEvent::NoteOff { .. } => MessageKind::NoteOff,
            MidiEvent::ControlChange { .. } => MessageKind::ControlChange,
            MidiEvent::Clock => MessageKind::Clock,
            MidiEvent::Start => MessageKind::Start,
            MidiEvent::Stop => MessageKind::Stop,
            MidiEvent::Continue => MessageKind::Continue,
        }
    }

    /// True for the single-byte system realtime messages.
    pub fn is_realtime(&self) -> bool {
        matches!(
            self,
            MidiEvent::Clock | MidiEvent::Start | MidiEvent::Stop | MidiEvent::Continue
        )
    }

    /// Standard 1-3 byte MIDI encoding.
    pub fn to_wire(&self) -> WireMessage {
        match *self {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => WireMessage::channel_voice(STATUS_NOTE_ON, channel, note, velocity),
            MidiEvent::NoteOff {
                channel,
                note,
                velocity,
            } => WireMessage::channel_voice(STATUS_NOTE_OFF, channel, note, velocity),
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => WireMessage::channel_voice(STATUS_CONTROL_CHANGE, channel, controller, value),
            MidiEvent::Clock => WireMessage::realtime(STATUS_CLOCK),
            MidiEvent::Start => WireMessage::realtime(STATUS_START),
            MidiEvent::Stop => WireMessage::realtime(STATUS_STOP),
            MidiEvent::Continue => WireMessage::realtime(STATUS_CONTINUE),
        }
    }

    fn from_realtime(status: u8) -> Option<Self> {
        match status {
            STATUS_CLOCK => Some(MidiEvent::Clock),
            STATUS_START => Some(MidiEvent::Start),
            STATUS_CONTINUE => Some(MidiEvent::Continue),
            STATUS_STOP => Some(MidiEvent::Stop),
            _ => None,
        }
    }

    fn from_channel_voice(status: u8, data1: u8, data2: u8) -> Option<Self> {
        let channel = Channel::new(status & 0x0F);
        let data1 = U7::new(data1 & 0x7F);
        let data2 = U7::new(data2 & 0x7F);
        match status & 0xF0 {
            STATUS_NOTE_ON => Some(MidiEvent::NoteOn {
                channel,
                note: data1,
                velocity: data2,
            }),
            STATUS_NOTE_OFF => Some(MidiEvent::NoteOff {
                channel,
                note: data1,
                velocity: data2,
            }),
            STATUS_CONTROL_CHANGE => Some(MidiEvent::ControlChange {
                channel,
                controller: data1,
                value: data2,
            }),
            _ => None,
        }
    }
}

/// An encoded MIDI message: status byte plus zero, one or two data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireMessage {
    bytes: [u8; 3],
    len: u8,
}

impl WireMessage {
    fn channel_voice(status: u8, channel: Channel, data1: U7, data2: U7) -> Self {
        WireMessage {
            bytes: [status | channel.get(), data1.get(), data2.get()],
            len: 3,
        }
    }

    fn realtime(status: u8) -> Self {
        WireMessage {
            bytes: [status, 0, 0],
            len: 1,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// The three message bytes, zero padded for realtime messages.
    pub fn padded(&self) -> [u8; 3] {
        self.bytes
    }

    pub fn status(&self) -> u8 {
        self.bytes[0]
    }
}

/// Decodes a received byte buffer into events.
///
/// Realtime bytes may appear anywhere, including between the data bytes of a
/// channel message. Running status is honored. Data bytes with no status,
/// unsupported status bytes and a truncated trailing message are skipped.
pub struct FrameDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    status: Option<u8>,
    data: [u8; 2],
    filled: usize,
}

impl<'a> FrameDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        FrameDecoder {
            bytes,
            pos: 0,
            status: None,
            data: [0; 2],
            filled: 0,
        }
    }
}

impl<'a> Iterator for FrameDecoder<'a> {
    type Item = MidiEvent;

    fn next(&mut self) -> Option<MidiEvent> {
        while let Some(&byte) = self.bytes.get(self.pos) {
            self.pos += 1;

            if byte >= 0xF8 {
                match MidiEvent::from_realtime(byte) {
                    Some(event) => return Some(event),
                    None => continue,
                }
            }

            if byte & 0x80 != 0 {
                self.status = match byte & 0xF0 {
                    STATUS_NOTE_ON | STATUS_NOTE_OFF | STATUS_CONTROL_CHANGE => Some(byte),
                    _ => None,
                };
                self.filled = 0;
                continue;
            }

            let Some(status) = self.status else {
                continue;
            };
            self.data[self.filled] = byte;
            self.filled += 1;
            if self.filled == 2 {
                self.filled = 0;
                return MidiEvent::from_channel_voice(status, self.data[0], self.data[1]);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_voice_encoding() {
        let wire = MidiEvent::note_on(3, 60, 100).to_wire();
        assert_eq!(wire.as_slice(), &[0x93, 60, 100]);

        let wire = MidiEvent::note_off(0, 60, 0).to_wire();
        assert_eq!(wire.as_slice(), &[0x80, 60, 0]);

        let wire = MidiEvent::control_change(15, 7, 127).to_wire();
        assert_eq!(wire.as_slice(), &[0xBF, 7, 127]);
    }

    #[test]
    fn test_realtime_encoding_is_single_byte() {
        assert_eq!(MidiEvent::Clock.to_wire().as_slice(), &[0xF8]);
        assert_eq!(MidiEvent::Start.to_wire().as_slice(), &[0xFA]);
        assert_eq!(MidiEvent::Continue.to_wire().as_slice(), &[0xFB]);
        assert_eq!(MidiEvent::Stop.to_wire().as_slice(), &[0xFC]);
        assert_eq!(MidiEvent::Stop.to_wire().padded(), [0xFC, 0, 0]);
    }

    #[test]
    #[should_panic(expected = "MIDI channel out of range")]
    fn test_channel_out_of_range_panics() {
        let _ = MidiEvent::note_on(16, 60, 100);
    }

    #[test]
    #[should_panic(expected = "MIDI data byte out of range")]
    fn test_data_byte_out_of_range_panics() {
        let _ = MidiEvent::control_change(0, 128, 0);
    }

    #[test]
    fn test_decoder_handles_interleaved_realtime() {
        let bytes = [0x91, 0xF8, 64, 0xFA, 90];
        let events: Vec<_> = FrameDecoder::new(&bytes).collect();
        assert_eq!(
            events,
            vec![MidiEvent::Clock, MidiEvent::Start, MidiEvent::note_on(1, 64, 90)]
        );
    }

    #[test]
    fn test_decoder_running_status_and_junk() {
        // Orphan data byte, pitch bend (unsupported), then running-status CCs.
        let bytes = [0x10, 0xE0, 0x00, 0x40, 0xB2, 1, 2, 3, 4, 0x90, 60];
        let events: Vec<_> = FrameDecoder::new(&bytes).collect();
        assert_eq!(
            events,
            vec![
                MidiEvent::control_change(2, 1, 2),
                MidiEvent::control_change(2, 3, 4),
            ]
        );
    }

    #[test]
    fn test_kind_and_realtime_flags() {
        assert_eq!(MidiEvent::note_off(0, 1, 2).kind(), MessageKind::NoteOff);
        assert!(MidiEvent::Continue.is_realtime());
        assert!(!MidiEvent::control_change(0, 1, 2).is_realtime());
        assert_eq!(MessageKind::ControlChange.to_string(), "CC");
    }
}
