#![allow(dead_code)]

use clockcast::router::FanOutRouter;
use clockcast::sink::{
    ByteStream, GattConfig, GattPeripheral, MeshConfig, MeshLink, MeshSink, Sink, SinkError,
    UsbDeviceSink, WiredSerialSink, WirelessSink,
};
use crossbeam::channel::{self, Sender};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub type Recorder = Arc<Mutex<Vec<Vec<u8>>>>;

pub fn recorded(recorder: &Recorder) -> Vec<Vec<u8>> {
    recorder.lock().unwrap().clone()
}

/// Byte stream that keeps every write as one entry.
#[derive(Clone, Default)]
pub struct RecordingStream {
    pub writes: Recorder,
}

impl ByteStream for RecordingStream {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.writes.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }
}

/// Byte stream that takes `delay` per write, like a stalled serial line.
pub struct SlowStream {
    pub delay: Duration,
    pub writes: Recorder,
}

impl ByteStream for SlowStream {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        thread::sleep(self.delay);
        self.writes.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePeripheral {
    pub advertised: AtomicUsize,
    pub notified: Recorder,
}

impl GattPeripheral for FakePeripheral {
    fn initialize(&self, _config: &GattConfig) -> Result<(), SinkError> {
        Ok(())
    }

    fn notify(&self, value: &[u8]) -> Result<(), SinkError> {
        self.notified.lock().unwrap().push(value.to_vec());
        Ok(())
    }

    fn start_advertising(&self) -> Result<(), SinkError> {
        self.advertised.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMeshLink {
    pub frames: Recorder,
    pub peers: Mutex<Vec<SocketAddr>>,
}

impl MeshLink for FakeMeshLink {
    fn initialize(&self, _config: &MeshConfig) -> Result<(), SinkError> {
        Ok(())
    }

    fn send(&self, frame: &[u8]) -> Result<(), SinkError> {
        self.frames.lock().unwrap().push(frame.to_vec());
        Ok(())
    }

    fn add_peer(&self, peer: SocketAddr) -> Result<(), SinkError> {
        self.peers.lock().unwrap().push(peer);
        Ok(())
    }

    fn clear_peers(&self) {
        self.peers.lock().unwrap().clear();
    }

    fn peer_count(&self) -> usize {
        self.peers.lock().unwrap().len()
    }
}

/// All four sinks over in-memory fakes, every one connected, behind one
/// router.
pub struct Rig {
    pub mesh: Arc<MeshSink>,
    pub wireless: Arc<WirelessSink>,
    pub wired: Arc<WiredSerialSink>,
    pub usb: Arc<UsbDeviceSink>,
    pub mesh_link: Arc<FakeMeshLink>,
    pub peripheral: Arc<FakePeripheral>,
    pub wired_writes: Recorder,
    pub usb_writes: Recorder,
    pub usb_host: Sender<Vec<u8>>,
    pub router: Arc<FanOutRouter>,
}

impl Rig {
    pub fn new() -> Self {
        let mesh_link = Arc::new(FakeMeshLink::default());
        let mesh = Arc::new(MeshSink::new(MeshConfig::default()));
        mesh.initialize(mesh_link.clone()).unwrap();

        let peripheral = Arc::new(FakePeripheral::default());
        let wireless = Arc::new(WirelessSink::new(GattConfig::default()));
        wireless.initialize(peripheral.clone()).unwrap();
        wireless.on_connect();

        let wired_stream = RecordingStream::default();
        let wired_writes = wired_stream.writes.clone();
        let wired = Arc::new(WiredSerialSink::new());
        wired.initialize(Box::new(wired_stream));

        let usb_stream = RecordingStream::default();
        let usb_writes = usb_stream.writes.clone();
        let (usb_host, inbound) = channel::unbounded();
        let usb = Arc::new(UsbDeviceSink::new());
        usb.initialize(Box::new(usb_stream), Some(inbound));

        let router = Arc::new(FanOutRouter::new(vec![
            mesh.clone() as Arc<dyn Sink>,
            wireless.clone(),
            wired.clone(),
            usb.clone(),
        ]));

        Rig {
            mesh,
            wireless,
            wired,
            usb,
            mesh_link,
            peripheral,
            wired_writes,
            usb_writes,
            usb_host,
            router,
        }
    }
}
