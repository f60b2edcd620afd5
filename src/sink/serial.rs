use super::{ByteStream, Packet, Sink, SinkError, SinkHandle, SinkId};
use crate::midi::MidiEvent;
use log::{info, trace};
use std::sync::Mutex;

/// MIDI 1.0 DIN baud rate.
pub const MIDI_BAUD_RATE: u32 = 31250;

/// Serial MIDI output. Writes standard 1-3 byte messages to the stream.
pub struct WiredSerialSink {
    handle: SinkHandle,
    stream: Mutex<Option<Box<dyn ByteStream>>>,
}

impl Default for WiredSerialSink {
    fn default() -> Self {
        Self::new()
    }
}

impl WiredSerialSink {
    pub fn new() -> Self {
        Self {
            handle: SinkHandle::new(SinkId::Wired),
            stream: Mutex::new(None),
        }
    }

    /// Attaches the serial port. A serial link has no peer detection, so the
    /// sink counts as connected from here on.
    pub fn initialize(&self, stream: Box<dyn ByteStream>) {
        if let Ok(mut slot) = self.stream.lock() {
            *slot = Some(stream);
            self.handle.set_connected(true);
            info!("Wired serial sink initialized ({} baud)", MIDI_BAUD_RATE);
        }
    }

    pub fn detach(&self) {
        if let Ok(mut slot) = self.stream.lock() {
            *slot = None;
        }
        self.handle.set_connected(false);
        info!("Wired serial sink detached");
    }
}

impl Sink for WiredSerialSink {
    fn id(&self) -> SinkId {
        self.handle.id()
    }

    fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    fn send(&self, event: &MidiEvent, packet: &Packet) -> Result<(), SinkError> {
        let mut slot = self
            .stream
            .lock()
            .map_err(|_| SinkError::WriteFailed("serial stream poisoned".into()))?;
        let stream = slot.as_mut().ok_or(SinkError::NotInitialized)?;
        trace!("wired <- {:?} {:02X?}", event.kind(), packet.as_slice());
        stream.write_all(packet.as_slice())
    }
}
