use super::{MeshConfig, MeshLink, MeshMode, SinkError};
use log::{debug, error, info, trace, warn};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DEFAULT_MESH_PORT: u16 = 5004;

const NODE_ID_LEN: usize = 4;
const MAX_DATAGRAM: usize = 256;
const RECV_POLL: Duration = Duration::from_millis(100);
const SEND_TIMEOUT: Duration = Duration::from_millis(2);

/// Mesh link over UDP broadcast, for hosts without the mesh radio.
///
/// Each datagram is a 4-byte sender node id followed by MIDI bytes. The node
/// id lets a receiver discard its own broadcasts.
pub struct UdpMeshLink {
    socket: UdpSocket,
    port: u16,
    node_id: u32,
    mode: Mutex<MeshMode>,
    peers: Mutex<Vec<SocketAddr>>,
    running: Arc<AtomicBool>,
}

impl UdpMeshLink {
    pub fn bind(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))?;
        socket.set_broadcast(true)?;
        socket.set_write_timeout(Some(SEND_TIMEOUT))?;
        let port = socket.local_addr()?.port();
        let node_id = make_node_id();
        info!("UDP mesh link bound to port {} (node {:08X})", port, node_id);
        Ok(Self {
            socket,
            port,
            node_id,
            mode: Mutex::new(MeshMode::Broadcast),
            peers: Mutex::new(Vec::new()),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_port(&self) -> u16 {
        self.port
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    /// Spawns the receive thread. `handler` gets the MIDI payload of every
    /// datagram sent by another node, on the receive thread.
    pub fn start_receiver<F>(&self, handler: F) -> io::Result<JoinHandle<()>>
    where
        F: Fn(&[u8]) + Send + 'static,
    {
        let socket = self.socket.try_clone()?;
        socket.set_read_timeout(Some(RECV_POLL))?;
        let running = self.running.clone();
        let own_id = self.node_id;

        thread::Builder::new()
            .name("mesh-rx".to_string())
            .spawn(move || {
                info!("Mesh receive thread started");
                let mut buf = [0u8; MAX_DATAGRAM];
                while running.load(Ordering::SeqCst) {
                    match socket.recv_from(&mut buf) {
                        Ok((len, from)) => {
                            if let Some(payload) = strip_header(&buf[..len], own_id) {
                                trace!("mesh rx {} bytes from {}", payload.len(), from);
                                handler(payload);
                            }
                        }
                        Err(e)
                            if e.kind() == io::ErrorKind::WouldBlock
                                || e.kind() == io::ErrorKind::TimedOut =>
                        {
                            continue
                        }
                        Err(e) => {
                            error!("Mesh receive error: {}", e);
                            break;
                        }
                    }
                }
                info!("Mesh receive thread stopping");
            })
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn targets(&self) -> Vec<SocketAddr> {
        let mode = self.mode.lock().map(|m| *m).unwrap_or(MeshMode::Off);
        match mode {
            MeshMode::Off => Vec::new(),
            MeshMode::Broadcast => vec![SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::BROADCAST,
                self.port,
            ))],
            MeshMode::Peer => self.peers.lock().map(|p| p.clone()).unwrap_or_default(),
        }
    }
}

impl MeshLink for UdpMeshLink {
    fn initialize(&self, config: &MeshConfig) -> Result<(), SinkError> {
        if config.encrypt {
            warn!("UDP mesh link has no link-layer encryption; sending in the clear");
        }
        if let Ok(mut mode) = self.mode.lock() {
            *mode = config.mode;
        }
        debug!(
            "UDP mesh link configured: mode={:?}, low_latency={}",
            config.mode, config.low_latency
        );
        Ok(())
    }

    fn send(&self, frame: &[u8]) -> Result<(), SinkError> {
        let mut datagram = [0u8; NODE_ID_LEN + 3];
        let len = NODE_ID_LEN + frame.len().min(3);
        datagram[..NODE_ID_LEN].copy_from_slice(&self.node_id.to_be_bytes());
        datagram[NODE_ID_LEN..len].copy_from_slice(&frame[..len - NODE_ID_LEN]);

        let targets = self.targets();
        if targets.is_empty() {
            return Err(SinkError::NotConnected);
        }
        for target in targets {
            self.socket
                .send_to(&datagram[..len], target)
                .map_err(|e| SinkError::WriteFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn add_peer(&self, peer: SocketAddr) -> Result<(), SinkError> {
        let mut peers = self
            .peers
            .lock()
            .map_err(|_| SinkError::WriteFailed("peer table poisoned".into()))?;
        if !peers.contains(&peer) {
            peers.push(peer);
        }
        Ok(())
    }

    fn clear_peers(&self) {
        if let Ok(mut peers) = self.peers.lock() {
            peers.clear();
        }
    }

    fn peer_count(&self) -> usize {
        self.peers.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl Drop for UdpMeshLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn make_node_id() -> u32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    process::id().rotate_left(16) ^ nanos
}

fn strip_header(datagram: &[u8], own_id: u32) -> Option<&[u8]> {
    if datagram.len() <= NODE_ID_LEN {
        return None;
    }
    let (header, payload) = datagram.split_at(NODE_ID_LEN);
    let sender = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    if sender == own_id {
        return None;
    }
    Some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_header_drops_own_and_short_datagrams() {
        let own = 0x0102_0304;
        assert_eq!(strip_header(&[1, 2, 3, 4, 0xF8], own), None);
        assert_eq!(strip_header(&[9, 9, 9, 9], own), None);
        assert_eq!(strip_header(&[9, 9, 9, 9, 0xF8], own), Some(&[0xF8][..]));
    }

    #[test]
    fn test_peer_mode_delivers_to_added_peers() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(1)))
            .unwrap();
        let link = UdpMeshLink::bind(0).unwrap();
        link.initialize(&MeshConfig {
            mode: MeshMode::Peer,
            ..MeshConfig::default()
        })
        .unwrap();

        assert_eq!(link.send(&[0xF8]), Err(SinkError::NotConnected));

        link.add_peer(receiver.local_addr().unwrap()).unwrap();
        link.add_peer(receiver.local_addr().unwrap()).unwrap();
        assert_eq!(link.peer_count(), 1);

        link.send(&[0x93, 60, 100]).unwrap();
        let mut buf = [0u8; 16];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..NODE_ID_LEN], &link.node_id().to_be_bytes());
        assert_eq!(&buf[NODE_ID_LEN..len], &[0x93, 60, 100]);
    }
}
