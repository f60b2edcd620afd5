use super::{ByteStream, Packet, Sink, SinkError, SinkHandle, SinkId};
use crate::midi::{FrameDecoder, MidiEvent};
use crossbeam::channel::Receiver;
use log::{debug, info, trace};
use std::sync::Mutex;

/// USB MIDI class device output, plus the inbound side the host writes to.
pub struct UsbDeviceSink {
    handle: SinkHandle,
    stream: Mutex<Option<Box<dyn ByteStream>>>,
    inbound: Mutex<Option<Receiver<Vec<u8>>>>,
}

impl Default for UsbDeviceSink {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbDeviceSink {
    pub fn new() -> Self {
        Self {
            handle: SinkHandle::new(SinkId::Usb),
            stream: Mutex::new(None),
            inbound: Mutex::new(None),
        }
    }

    pub fn initialize(&self, stream: Box<dyn ByteStream>, inbound: Option<Receiver<Vec<u8>>>) {
        if let Ok(mut slot) = self.stream.lock() {
            *slot = Some(stream);
        }
        if let Ok(mut slot) = self.inbound.lock() {
            *slot = inbound;
        }
        self.handle.set_connected(true);
        info!("USB MIDI device sink initialized");
    }

    /// Host port opened or closed.
    pub fn set_host_connected(&self, connected: bool) {
        if self.handle.set_connected(connected) != connected {
            info!(
                "USB host {}",
                if connected { "connected" } else { "disconnected" }
            );
        }
    }

    /// Drains messages received from the host without blocking, handing each
    /// decoded event to `f`. Returns the number of events decoded.
    pub fn poll_inbound<F>(&self, mut f: F) -> usize
    where
        F: FnMut(MidiEvent),
    {
        let Ok(slot) = self.inbound.lock() else {
            return 0;
        };
        let Some(rx) = slot.as_ref() else {
            return 0;
        };

        let mut count = 0;
        for bytes in rx.try_iter() {
            for event in FrameDecoder::new(&bytes) {
                debug!("USB inbound: {:?}", event);
                f(event);
                count += 1;
            }
        }
        count
    }
}

impl Sink for UsbDeviceSink {
    fn id(&self) -> SinkId {
        self.handle.id()
    }

    fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    fn send(&self, event: &MidiEvent, packet: &Packet) -> Result<(), SinkError> {
        if !self.handle.is_connected() {
            return Err(SinkError::NotConnected);
        }
        let mut slot = self
            .stream
            .lock()
            .map_err(|_| SinkError::WriteFailed("usb stream poisoned".into()))?;
        let stream = slot.as_mut().ok_or(SinkError::NotInitialized)?;
        trace!("usb <- {:?} {:02X?}", event.kind(), packet.as_slice());
        stream.write_all(packet.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;

    struct Discard;

    impl ByteStream for Discard {
        fn write_all(&mut self, _bytes: &[u8]) -> Result<(), SinkError> {
            Ok(())
        }
    }

    #[test]
    fn test_poll_inbound_decodes_host_messages() {
        let (tx, rx) = channel::unbounded();
        let sink = UsbDeviceSink::new();
        sink.initialize(Box::new(Discard), Some(rx));

        tx.send(vec![0xB0, 74, 10]).unwrap();
        tx.send(vec![0x80, 60, 0, 0xFC]).unwrap();

        let mut events = Vec::new();
        assert_eq!(sink.poll_inbound(|e| events.push(e)), 3);
        assert_eq!(
            events,
            vec![
                MidiEvent::control_change(0, 74, 10),
                MidiEvent::note_off(0, 60, 0),
                MidiEvent::Stop
            ]
        );
        assert_eq!(sink.poll_inbound(|_| panic!("queue should be empty")), 0);
    }

    #[test]
    fn test_host_disconnect_rejects_sends() {
        let sink = UsbDeviceSink::new();
        sink.initialize(Box::new(Discard), None);
        sink.set_host_connected(false);
        let event = MidiEvent::Clock;
        assert_eq!(
            sink.send(&event, &sink.encode(&event)),
            Err(SinkError::NotConnected)
        );
    }
}
