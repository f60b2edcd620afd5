//! Remote ingest
//!
//! Turns messages arriving from the mesh into [`MidiEvent`]s and routes them
//! to the local sinks. While the local clock is master, Start, Stop and
//! Continue go to the event loop instead so the local transport follows them.
//! Runs on the mesh receive thread, concurrently with the clock loop.

use crate::config::ClockSource;
use crate::event_loop::EngineMessage;
use crate::midi::{FrameDecoder, MessageKind, MidiEvent};
use crate::router::FanOutRouter;
use crate::sink::SinkId;
use crate::transport::TransportCommand;
use crossbeam::channel::Sender;
use log::{debug, info, trace, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct RemoteIngest {
    router: Arc<FanOutRouter>,
    clock_source: ClockSource,
    transport_tx: Sender<EngineMessage>,
    received: AtomicU64,
    relayed: AtomicU64,
    dropped_clock: AtomicU64,
}

impl RemoteIngest {
    pub fn new(
        router: Arc<FanOutRouter>,
        clock_source: ClockSource,
        transport_tx: Sender<EngineMessage>,
    ) -> Self {
        Self {
            router,
            clock_source,
            transport_tx,
            received: AtomicU64::new(0),
            relayed: AtomicU64::new(0),
            dropped_clock: AtomicU64::new(0),
        }
    }

    /// Entry point for one received event.
    pub fn handle(&self, event: MidiEvent) {
        self.received.fetch_add(1, Ordering::Relaxed);

        match event.kind() {
            MessageKind::Clock => {
                // Only one clock master: a remote clock is relayed only when
                // the mesh is the configured source.
                if self.clock_source != ClockSource::Mesh {
                    self.dropped_clock.fetch_add(1, Ordering::Relaxed);
                    trace!("Remote clock ignored, local clock is master");
                    return;
                }
            }
            MessageKind::Start | MessageKind::Stop | MessageKind::Continue => {
                info!("[mesh rx] {}", event.kind());
                // Following a mesh master, its transport is relayed as is.
                if self.clock_source == ClockSource::Internal {
                    self.forward_transport(event);
                    return;
                }
            }
            MessageKind::NoteOn | MessageKind::NoteOff | MessageKind::ControlChange => {
                debug!("[mesh rx] {}: {:?}", event.kind(), event);
            }
        }

        self.router.route(event, Some(SinkId::Mesh));
        self.relayed.fetch_add(1, Ordering::Relaxed);
    }

    /// The event loop applies the command and routes the outcome to every
    /// sink except the mesh.
    fn forward_transport(&self, event: MidiEvent) {
        let command = match event {
            MidiEvent::Start => TransportCommand::Start,
            MidiEvent::Stop => TransportCommand::Stop,
            _ => TransportCommand::Continue,
        };
        let message = EngineMessage::Remote(command, SinkId::Mesh);
        if self.transport_tx.send(message).is_err() {
            warn!("Event loop gone, dropping remote {:?}", command);
            return;
        }
        self.relayed.fetch_add(1, Ordering::Relaxed);
    }

    /// Decodes a raw mesh frame and handles every event in it.
    pub fn on_frame(&self, bytes: &[u8]) {
        for event in FrameDecoder::new(bytes) {
            self.handle(event);
        }
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn relayed(&self) -> u64 {
        self.relayed.load(Ordering::Relaxed)
    }

    pub fn dropped_clock(&self) -> u64 {
        self.dropped_clock.load(Ordering::Relaxed)
    }
}
