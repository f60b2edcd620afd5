use super::{Packet, Sink, SinkError, SinkHandle, SinkId};
use crate::midi::MidiEvent;
use log::{info, trace, warn};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Mesh operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshMode {
    Off,
    /// Auto-discovery: every frame goes to all reachable peers.
    #[default]
    Broadcast,
    /// Frames go only to explicitly added peers.
    Peer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshConfig {
    pub mode: MeshMode,
    pub port: u16,
    /// Link-layer encryption; off by default.
    pub encrypt: bool,
    pub low_latency: bool,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            mode: MeshMode::Broadcast,
            port: super::DEFAULT_MESH_PORT,
            encrypt: false,
            low_latency: true,
        }
    }
}

/// The mesh radio's send side and peer table.
pub trait MeshLink: Send + Sync {
    fn initialize(&self, config: &MeshConfig) -> Result<(), SinkError>;
    fn send(&self, frame: &[u8]) -> Result<(), SinkError>;
    fn add_peer(&self, peer: SocketAddr) -> Result<(), SinkError>;
    fn clear_peers(&self);
    fn peer_count(&self) -> usize;
}

/// Point-to-multipoint wireless output. Frames carry standard MIDI bytes.
pub struct MeshSink {
    handle: SinkHandle,
    config: Mutex<MeshConfig>,
    link: Mutex<Option<Arc<dyn MeshLink>>>,
    messages_sent: AtomicU64,
}

impl MeshSink {
    pub fn new(config: MeshConfig) -> Self {
        Self {
            handle: SinkHandle::new(SinkId::Mesh),
            config: Mutex::new(config),
            link: Mutex::new(None),
            messages_sent: AtomicU64::new(0),
        }
    }

    pub fn initialize(&self, link: Arc<dyn MeshLink>) -> Result<(), SinkError> {
        let config = self.config();
        link.initialize(&config)?;
        if let Ok(mut slot) = self.link.lock() {
            *slot = Some(link);
        }
        self.handle.set_connected(config.mode != MeshMode::Off);
        self.messages_sent.store(0, Ordering::Relaxed);
        info!(
            "Mesh sink initialized: mode={:?}, port={}, encrypt={}, low_latency={}",
            config.mode, config.port, config.encrypt, config.low_latency
        );
        Ok(())
    }

    pub fn config(&self) -> MeshConfig {
        self.config
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Pushes the new mode down to the link. Switching to `Off` disconnects
    /// the sink and clears the peer table.
    pub fn set_mode(&self, mode: MeshMode) -> Result<(), SinkError> {
        let config = {
            let mut config = self
                .config
                .lock()
                .map_err(|_| SinkError::WriteFailed("mesh config poisoned".into()))?;
            config.mode = mode;
            config.clone()
        };
        let link = self.current_link();
        if let Some(link) = &link {
            if mode == MeshMode::Off {
                link.clear_peers();
            }
            if let Err(e) = link.initialize(&config) {
                self.handle.set_connected(false);
                warn!("Mesh link rejected mode {:?}: {}", mode, e);
                return Err(e);
            }
        }
        self.handle
            .set_connected(mode != MeshMode::Off && link.is_some());
        info!("Mesh mode changed to {:?}", mode);
        Ok(())
    }

    pub fn add_peer(&self, peer: SocketAddr) -> Result<(), SinkError> {
        let link = self.current_link().ok_or(SinkError::NotInitialized)?;
        link.add_peer(peer)?;
        info!("Mesh peer added: {}", peer);
        Ok(())
    }

    pub fn clear_peers(&self) {
        if let Some(link) = self.current_link() {
            link.clear_peers();
            info!("Mesh peers cleared");
        }
    }

    pub fn peer_count(&self) -> usize {
        self.current_link().map(|l| l.peer_count()).unwrap_or(0)
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    fn current_link(&self) -> Option<Arc<dyn MeshLink>> {
        self.link.lock().ok().and_then(|slot| slot.clone())
    }
}

impl Sink for MeshSink {
    fn id(&self) -> SinkId {
        self.handle.id()
    }

    fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    fn send(&self, event: &MidiEvent, packet: &Packet) -> Result<(), SinkError> {
        let link = self.current_link().ok_or(SinkError::NotInitialized)?;
        if !self.handle.is_connected() {
            return Err(SinkError::NotConnected);
        }
        trace!("mesh <- {:?} {:02X?}", event.kind(), packet.as_slice());
        match link.send(packet.as_slice()) {
            Ok(()) => {
                self.messages_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                warn!("Mesh send failed: {}", e);
                Err(e)
            }
        }
    }
}
