//! Transport sinks
//!
//! Every output channel implements [`Sink`]: a connectivity flag that the
//! router checks before each send, a per-sink wire encoding and a
//! best-effort, bounded-time send. The four sinks are:
//! - [`MeshSink`] for the point-to-multipoint wireless link
//! - [`WirelessSink`] for the short-range GATT link
//! - [`WiredSerialSink`] for serial MIDI
//! - [`UsbDeviceSink`] for the USB MIDI class device
//!
//! Connectivity lives in a [`SinkHandle`] and is only ever changed by the
//! sink's own lifecycle callbacks.

mod bounded;
mod mesh;
mod serial;
mod udp;
mod usb;
mod wireless;

pub use bounded::BoundedWriter;
pub use mesh::{MeshConfig, MeshLink, MeshMode, MeshSink};
pub use serial::{WiredSerialSink, MIDI_BAUD_RATE};
pub use udp::{UdpMeshLink, DEFAULT_MESH_PORT};
pub use usb::UsbDeviceSink;
pub use wireless::{
    GattConfig, GattPeripheral, HeadlessPeripheral, WirelessSink, BLE_MIDI_CHARACTERISTIC_UUID,
    BLE_MIDI_SERVICE_UUID, BLE_PACKET_MARKER,
};

use crate::midi::{MidiEvent, WireMessage};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Identifies one of the four output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkId {
    Mesh,
    Wireless,
    Wired,
    Usb,
}

impl SinkId {
    pub const ALL: [SinkId; 4] = [SinkId::Mesh, SinkId::Wireless, SinkId::Wired, SinkId::Usb];

    pub fn index(self) -> usize {
        match self {
            SinkId::Mesh => 0,
            SinkId::Wireless => 1,
            SinkId::Wired => 2,
            SinkId::Usb => 3,
        }
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SinkId::Mesh => "mesh",
            SinkId::Wireless => "wireless",
            SinkId::Wired => "wired",
            SinkId::Usb => "usb",
        };
        f.write_str(name)
    }
}

/// Why a single send was dropped. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("sink not connected")]
    NotConnected,

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("sink not initialized")]
    NotInitialized,
}

/// Opaque identifier plus connectivity flag for one sink.
#[derive(Debug)]
pub struct SinkHandle {
    id: SinkId,
    connected: AtomicBool,
}

impl SinkHandle {
    pub fn new(id: SinkId) -> Self {
        Self {
            id,
            connected: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SinkId {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Returns the previous value.
    pub fn set_connected(&self, connected: bool) -> bool {
        self.connected.swap(connected, Ordering::AcqRel)
    }
}

/// A fully encoded sink packet. Five bytes covers the largest framing in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    bytes: [u8; 5],
    len: u8,
}

impl Packet {
    pub fn from_slice(bytes: &[u8]) -> Self {
        assert!(bytes.len() <= 5, "packet too large: {} bytes", bytes.len());
        let mut buf = [0u8; 5];
        buf[..bytes.len()].copy_from_slice(bytes);
        Packet {
            bytes: buf,
            len: bytes.len() as u8,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl From<WireMessage> for Packet {
    fn from(wire: WireMessage) -> Self {
        Packet::from_slice(wire.as_slice())
    }
}

/// Raw byte output provided by the hardware layer.
pub trait ByteStream: Send {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SinkError>;
}

impl<S: ByteStream + ?Sized> ByteStream for Box<S> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        (**self).write_all(bytes)
    }
}

/// Uniform "send one MIDI event" contract shared by all output channels.
pub trait Sink: Send + Sync {
    fn id(&self) -> SinkId;

    fn is_connected(&self) -> bool;

    /// Maps the event to this sink's wire representation.
    fn encode(&self, event: &MidiEvent) -> Packet {
        Packet::from(event.to_wire())
    }

    fn send(&self, event: &MidiEvent, packet: &Packet) -> Result<(), SinkError>;
}
