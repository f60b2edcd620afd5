use super::{Packet, Sink, SinkError, SinkHandle, SinkId};
use crate::midi::MidiEvent;
use log::{debug, info, trace, warn};
use std::sync::{Arc, Mutex};

/// Standard BLE-MIDI service.
pub const BLE_MIDI_SERVICE_UUID: &str = "03b80e5a-ede8-4b33-a751-6ce34ec4c700";
/// Standard BLE-MIDI I/O characteristic.
pub const BLE_MIDI_CHARACTERISTIC_UUID: &str = "7772e5db-3868-4112-a1a9-f2669d106bf3";
/// Header and timestamp marker bytes leading every notification.
pub const BLE_PACKET_MARKER: [u8; 2] = [0x80, 0x80];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattConfig {
    pub device_name: String,
    pub service_uuid: String,
    pub characteristic_uuid: String,
    /// Fixed numeric pairing code.
    pub passkey: u32,
}

impl Default for GattConfig {
    fn default() -> Self {
        Self {
            device_name: "clockcast".to_string(),
            service_uuid: BLE_MIDI_SERVICE_UUID.to_string(),
            characteristic_uuid: BLE_MIDI_CHARACTERISTIC_UUID.to_string(),
            passkey: 123456,
        }
    }
}

/// The radio stack's GATT server, as seen by the sink.
pub trait GattPeripheral: Send + Sync {
    fn initialize(&self, config: &GattConfig) -> Result<(), SinkError>;
    fn notify(&self, value: &[u8]) -> Result<(), SinkError>;
    fn start_advertising(&self) -> Result<(), SinkError>;
}

/// Stand-in used when no radio is available: logs instead of transmitting.
/// No central ever connects, so the sink stays disconnected.
#[derive(Debug, Default)]
pub struct HeadlessPeripheral;

impl GattPeripheral for HeadlessPeripheral {
    fn initialize(&self, config: &GattConfig) -> Result<(), SinkError> {
        info!(
            "No GATT radio available; '{}' will not be advertised (service {})",
            config.device_name, config.service_uuid
        );
        Ok(())
    }

    fn notify(&self, value: &[u8]) -> Result<(), SinkError> {
        trace!("headless notify {:02X?}", value);
        Ok(())
    }

    fn start_advertising(&self) -> Result<(), SinkError> {
        debug!("headless advertising request ignored");
        Ok(())
    }
}

/// Short-range wireless output. Each event goes out as a 5-byte notification.
pub struct WirelessSink {
    handle: SinkHandle,
    config: GattConfig,
    peripheral: Mutex<Option<Arc<dyn GattPeripheral>>>,
}

impl WirelessSink {
    pub fn new(config: GattConfig) -> Self {
        Self {
            handle: SinkHandle::new(SinkId::Wireless),
            config,
            peripheral: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &GattConfig {
        &self.config
    }

    /// Brings up the GATT service and starts advertising.
    pub fn initialize(&self, peripheral: Arc<dyn GattPeripheral>) -> Result<(), SinkError> {
        peripheral.initialize(&self.config)?;
        peripheral.start_advertising()?;
        if let Ok(mut slot) = self.peripheral.lock() {
            *slot = Some(peripheral);
        }
        info!("Wireless sink advertising as '{}'", self.config.device_name);
        Ok(())
    }

    /// Central connected. Called from the radio stack's context.
    pub fn on_connect(&self) {
        self.handle.set_connected(true);
        info!("Wireless peer connected");
    }

    /// Central went away: drop the flag and advertise again so a future
    /// connection needs no restart.
    pub fn on_disconnect(&self) {
        self.handle.set_connected(false);
        info!("Wireless peer disconnected, restarting advertising");
        let peripheral = self.peripheral.lock().ok().and_then(|slot| slot.clone());
        if let Some(peripheral) = peripheral {
            if let Err(e) = peripheral.start_advertising() {
                warn!("Failed to restart advertising: {}", e);
            }
        }
    }
}

impl Sink for WirelessSink {
    fn id(&self) -> SinkId {
        self.handle.id()
    }

    fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    fn encode(&self, event: &MidiEvent) -> Packet {
        let [status, data1, data2] = event.to_wire().padded();
        Packet::from_slice(&[
            BLE_PACKET_MARKER[0],
            BLE_PACKET_MARKER[1],
            status,
            data1,
            data2,
        ])
    }

    fn send(&self, event: &MidiEvent, packet: &Packet) -> Result<(), SinkError> {
        if !self.handle.is_connected() {
            return Err(SinkError::NotConnected);
        }
        // Holding the lock across notify keeps notifications whole when the
        // ingest thread and the clock loop send at the same time.
        let slot = self
            .peripheral
            .lock()
            .map_err(|_| SinkError::WriteFailed("peripheral poisoned".into()))?;
        let peripheral = slot.as_ref().ok_or(SinkError::NotInitialized)?;
        trace!("wireless <- {:?} {:02X?}", event.kind(), packet.as_slice());
        peripheral.notify(packet.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakePeripheral {
        advertised: AtomicUsize,
        notified: Mutex<Vec<Vec<u8>>>,
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

    #[test]
    fn test_packet_framing() {
        let sink = WirelessSink::new(GattConfig::default());
        assert_eq!(
            sink.encode(&MidiEvent::note_on(3, 60, 100)).as_slice(),
            &[0x80, 0x80, 0x93, 60, 100]
        );
        assert_eq!(
            sink.encode(&MidiEvent::Clock).as_slice(),
            &[0x80, 0x80, 0xF8, 0, 0]
        );
    }

    #[test]
    fn test_connection_lifecycle_restarts_advertising() {
        let peripheral = Arc::new(FakePeripheral::default());
        let sink = WirelessSink::new(GattConfig::default());
        sink.initialize(peripheral.clone()).unwrap();
        assert_eq!(peripheral.advertised.load(Ordering::SeqCst), 1);
        assert!(!sink.is_connected());

        sink.on_connect();
        assert!(sink.is_connected());
        let event = MidiEvent::Start;
        sink.send(&event, &sink.encode(&event)).unwrap();

        sink.on_disconnect();
        assert!(!sink.is_connected());
        assert_eq!(peripheral.advertised.load(Ordering::SeqCst), 2);
        assert_eq!(
            sink.send(&event, &sink.encode(&event)),
            Err(SinkError::NotConnected)
        );
        assert_eq!(
            *peripheral.notified.lock().unwrap(),
            vec![vec![0x80, 0x80, 0xFA, 0, 0]]
        );
    }

    #[test]
    fn test_default_security_settings() {
        let config = GattConfig::default();
        assert_eq!(config.passkey, 123456);
        assert_eq!(config.service_uuid, BLE_MIDI_SERVICE_UUID);
    }
}
