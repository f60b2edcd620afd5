//! Host MIDI ports via midir
//!
//! These back the wired and USB sinks when running on a desktop host: a
//! USB-to-DIN interface shows up as a named output port, and the USB device
//! role is played by a virtual port pair where the platform supports it.

use crate::sink::{ByteStream, SinkError};
use crossbeam::channel::{Sender, TrySendError};
use log::{debug, info, warn};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Failed to initialize MIDI: {0}")]
    InitFailed(String),

    #[error("MIDI port not found: {0}")]
    NotFound(String),

    #[error("MIDI connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Virtual MIDI ports are not supported on this platform")]
    VirtualUnsupported,
}

/// An open midir output connection used as a sink byte stream.
pub struct MidirOutputStream {
    port_name: String,
    connection: MidiOutputConnection,
}

impl MidirOutputStream {
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl ByteStream for MidirOutputStream {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.connection
            .send(bytes)
            .map_err(|e| SinkError::WriteFailed(format!("{}: {}", self.port_name, e)))
    }
}

/// Hands an inbound message to the clock loop without blocking the midir
/// callback. A full queue drops the message.
pub(crate) fn forward_inbound(tx: &Sender<Vec<u8>>, message: &[u8]) -> bool {
    match tx.try_send(message.to_vec()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("Inbound MIDI queue full, dropping {} bytes", message.len());
            false
        }
        Err(TrySendError::Disconnected(_)) => {
            debug!("Inbound MIDI queue closed");
            false
        }
    }
}

pub fn list_output_ports() -> Result<Vec<String>, PortError> {
    let midi_out = MidiOutput::new("clockcast-port-lister")
        .map_err(|e| PortError::InitFailed(e.to_string()))?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect())
}

pub fn list_input_ports() -> Result<Vec<String>, PortError> {
    let midi_in = MidiInput::new("clockcast-port-lister")
        .map_err(|e| PortError::InitFailed(e.to_string()))?;
    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect())
}

/// Opens the first output port whose name contains `device_name`.
pub fn open_output(device_name: &str) -> Result<MidirOutputStream, PortError> {
    let midi_out =
        MidiOutput::new("clockcast-out").map_err(|e| PortError::InitFailed(e.to_string()))?;

    let ports = midi_out.ports();
    let port = ports
        .iter()
        .find(|p| {
            midi_out
                .port_name(p)
                .unwrap_or_default()
                .contains(device_name)
        })
        .ok_or_else(|| PortError::NotFound(device_name.to_string()))?;

    let port_name = midi_out
        .port_name(port)
        .map_err(|e| PortError::ConnectionFailed(e.to_string()))?;
    info!("Connecting to MIDI output port: {}", port_name);

    let connection = midi_out
        .connect(port, "clockcast-output")
        .map_err(|e| PortError::ConnectionFailed(e.to_string()))?;
    Ok(MidirOutputStream {
        port_name,
        connection,
    })
}

/// Opens the first input port whose name contains `device_name` and forwards
/// raw messages to `tx`. The connection stays open while the handle lives.
pub fn open_input(
    device_name: &str,
    tx: Sender<Vec<u8>>,
) -> Result<MidiInputConnection<()>, PortError> {
    let mut midi_in =
        MidiInput::new("clockcast-in").map_err(|e| PortError::InitFailed(e.to_string()))?;
    midi_in.ignore(Ignore::None);

    let ports = midi_in.ports();
    let port = ports
        .iter()
        .find(|p| midi_in.port_name(p).unwrap_or_default().contains(device_name))
        .ok_or_else(|| PortError::NotFound(device_name.to_string()))?;

    info!("Listening on MIDI input port: {}", device_name);
    midi_in
        .connect(
            port,
            "clockcast-input",
            move |_stamp, message, _| {
                forward_inbound(&tx, message);
            },
            (),
        )
        .map_err(|e| PortError::ConnectionFailed(e.to_string()))
}

/// Creates a virtual output port other applications can subscribe to.
#[cfg(unix)]
pub fn open_virtual_output(name: &str) -> Result<MidirOutputStream, PortError> {
    use midir::os::unix::VirtualOutput;

    let midi_out =
        MidiOutput::new("clockcast-out").map_err(|e| PortError::InitFailed(e.to_string()))?;
    let connection = midi_out
        .create_virtual(name)
        .map_err(|e| PortError::ConnectionFailed(e.to_string()))?;
    info!("Created virtual MIDI output: {}", name);
    Ok(MidirOutputStream {
        port_name: name.to_string(),
        connection,
    })
}

#[cfg(not(unix))]
pub fn open_virtual_output(_name: &str) -> Result<MidirOutputStream, PortError> {
    Err(PortError::VirtualUnsupported)
}

/// Creates a virtual input port; messages written to it are forwarded to `tx`.
#[cfg(unix)]
pub fn open_virtual_input(
    name: &str,
    tx: Sender<Vec<u8>>,
) -> Result<MidiInputConnection<()>, PortError> {
    use midir::os::unix::VirtualInput;

    let mut midi_in =
        MidiInput::new("clockcast-in").map_err(|e| PortError::InitFailed(e.to_string()))?;
    midi_in.ignore(Ignore::None);
    let connection = midi_in
        .create_virtual(
            name,
            move |_stamp, message, _| {
                debug!("virtual input received {} bytes", message.len());
                forward_inbound(&tx, message);
            },
            (),
        )
        .map_err(|e| PortError::ConnectionFailed(e.to_string()))?;
    info!("Created virtual MIDI input: {}", name);
    Ok(connection)
}

#[cfg(not(unix))]
pub fn open_virtual_input(
    _name: &str,
    _tx: Sender<Vec<u8>>,
) -> Result<MidiInputConnection<()>, PortError> {
    Err(PortError::VirtualUnsupported)
}
