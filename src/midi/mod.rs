//! MIDI functionality for clockcast
//!
//! This module provides:
//! - [`MidiEvent`], the fixed-shape event routed to every sink
//! - Wire encoding ([`WireMessage`]) and decoding ([`FrameDecoder`])
//! - Host MIDI ports via midir, used as the byte streams behind the
//!   wired and USB sinks
//!
mod event;
pub mod ports;

pub use event::{
    Channel, FrameDecoder, MessageKind, MidiEvent, WireMessage, U7, STATUS_CLOCK,
    STATUS_CONTINUE, STATUS_CONTROL_CHANGE, STATUS_NOTE_OFF, STATUS_NOTE_ON, STATUS_START,
    STATUS_STOP,
};

/// MIDI standard PPQ (Pulses Per Quarter Note)
pub const TICKS_PER_BEAT: u32 = 24;
pub const BEATS_PER_BAR: u32 = 4;
