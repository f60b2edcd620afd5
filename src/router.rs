//! Fan-out router
//!
//! Delivers one event to every connected sink except the one it came from.
//! Disconnected sinks are skipped, failed sends are logged and dropped. Safe
//! to call from the clock loop and the ingest thread at the same time.

use crate::midi::MidiEvent;
use crate::sink::{Sink, SinkId};
use log::{trace, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of one `route` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delivery {
    pub delivered: u8,
    pub skipped: u8,
    pub failed: u8,
}

#[derive(Debug, Default)]
struct SinkCounters {
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Per-sink delivery counters.
#[derive(Debug, Default)]
pub struct RouteStats {
    counters: [SinkCounters; 4],
}

impl RouteStats {
    pub fn delivered(&self, id: SinkId) -> u64 {
        self.counters[id.index()].delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self, id: SinkId) -> u64 {
        self.counters[id.index()].failed.load(Ordering::Relaxed)
    }
}

pub struct FanOutRouter {
    sinks: Vec<Arc<dyn Sink>>,
    stats: RouteStats,
    slow_send_warning: Duration,
}

impl FanOutRouter {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self {
            sinks,
            stats: RouteStats::default(),
            slow_send_warning: Duration::from_millis(2),
        }
    }

    /// Sends slower than this are logged at warn.
    pub fn with_slow_send_warning(mut self, threshold: Duration) -> Self {
        self.slow_send_warning = threshold;
        self
    }

    pub fn route(&self, event: MidiEvent, origin: Option<SinkId>) -> Delivery {
        let mut delivery = Delivery::default();

        for sink in &self.sinks {
            let id = sink.id();
            if Some(id) == origin || !sink.is_connected() {
                delivery.skipped += 1;
                continue;
            }

            let packet = sink.encode(&event);
            let started = Instant::now();
            let result = sink.send(&event, &packet);
            let elapsed = started.elapsed();
            if elapsed > self.slow_send_warning {
                warn!("{} send took {:?} for {:?}", id, elapsed, event.kind());
            }

            let counters = &self.stats.counters[id.index()];
            match result {
                Ok(()) => {
                    counters.delivered.fetch_add(1, Ordering::Relaxed);
                    delivery.delivered += 1;
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    delivery.failed += 1;
                    warn!("Dropped {:?} for {}: {}", event.kind(), id, e);
                }
            }
        }

        trace!(
            "routed {:?} from {:?}: {:?}",
            event.kind(),
            origin,
            delivery
        );
        delivery
    }

    pub fn stats(&self) -> &RouteStats {
        &self.stats
    }

    /// Connectivity of every registered sink, in registration order.
    pub fn connectivity(&self) -> Vec<(SinkId, bool)> {
        self.sinks
            .iter()
            .map(|s| (s.id(), s.is_connected()))
            .collect()
    }

    pub fn sink(&self, id: SinkId) -> Option<&Arc<dyn Sink>> {
        self.sinks.iter().find(|s| s.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{Packet, SinkError};
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;

    struct StubSink {
        id: SinkId,
        connected: AtomicBool,
        fail: bool,
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl StubSink {
        fn new(id: SinkId, connected: bool, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                id,
                connected: AtomicBool::new(connected),
                fail,
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    impl Sink for StubSink {
        fn id(&self) -> SinkId {
            self.id
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn send(&self, _event: &MidiEvent, packet: &Packet) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::WriteFailed("stub".into()));
            }
            self.sent.lock().unwrap().push(packet.as_slice().to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_failure_does_not_stop_other_sinks() {
        let failing = StubSink::new(SinkId::Wired, true, true);
        let healthy = StubSink::new(SinkId::Usb, true, false);
        let router = FanOutRouter::new(vec![failing.clone() as Arc<dyn Sink>, healthy.clone()]);

        let delivery = router.route(MidiEvent::Clock, None);
        assert_eq!(
            delivery,
            Delivery {
                delivered: 1,
                skipped: 0,
                failed: 1
            }
        );
        assert_eq!(*healthy.sent.lock().unwrap(), vec![vec![0xF8]]);
        assert_eq!(router.stats().failed(SinkId::Wired), 1);
        assert_eq!(router.stats().delivered(SinkId::Usb), 1);
    }

    #[test]
    fn test_disconnected_and_origin_are_skipped() {
        let mesh = StubSink::new(SinkId::Mesh, true, false);
        let wireless = StubSink::new(SinkId::Wireless, false, false);
        let router = FanOutRouter::new(vec![mesh.clone() as Arc<dyn Sink>, wireless.clone()]);

        let delivery = router.route(MidiEvent::Start, Some(SinkId::Mesh));
        assert_eq!(delivery.skipped, 2);
        assert!(mesh.sent.lock().unwrap().is_empty());
        assert!(wireless.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_connectivity_snapshot() {
        let router = FanOutRouter::new(vec![
            StubSink::new(SinkId::Mesh, true, false) as Arc<dyn Sink>,
            StubSink::new(SinkId::Wired, false, false),
        ]);
        assert_eq!(
            router.connectivity(),
            vec![(SinkId::Mesh, true), (SinkId::Wired, false)]
        );
        assert!(router.sink(SinkId::Usb).is_none());
    }
}
