// event_loop.rs

use crate::clock::{ClockGenerator, ClockSchedule};
use crate::config::ClockSource;
use crate::midi::MidiEvent;
use crate::router::FanOutRouter;
use crate::sink::{SinkId, UsbDeviceSink};
use crate::state::SharedStatus;
use crate::transport::{TransportCommand, TransportStateMachine};
use crossbeam::channel::Receiver;
use log::{debug, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const MAX_IDLE_SLEEP: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMessage {
    /// Local control (console).
    Transport(TransportCommand),
    /// Command that arrived through a sink; the resulting event is not sent
    /// back to it.
    Remote(TransportCommand, SinkId),
    Shutdown,
}

/// The main-loop context: owns the clock generator and the transport state
/// machine, and shares the router with the ingest thread.
pub struct EventLoop {
    clock: ClockGenerator,
    transport: TransportStateMachine,
    clock_source: ClockSource,
    router: Arc<FanOutRouter>,
    usb: Option<Arc<UsbDeviceSink>>,
    status: SharedStatus,
    message_rx: Receiver<EngineMessage>,
    shutdown: bool,
}

impl EventLoop {
    pub fn new(
        schedule: ClockSchedule,
        clock_source: ClockSource,
        router: Arc<FanOutRouter>,
        status: SharedStatus,
        message_rx: Receiver<EngineMessage>,
    ) -> Self {
        EventLoop {
            clock: ClockGenerator::new(schedule),
            transport: TransportStateMachine::new(),
            clock_source,
            router,
            usb: None,
            status,
            message_rx,
            shutdown: false,
        }
    }

    /// Polls the USB sink's inbound queue on every iteration.
    pub fn with_usb_inbound(mut self, usb: Arc<UsbDeviceSink>) -> Self {
        self.usb = Some(usb);
        self
    }

    pub fn transport(&self) -> &TransportStateMachine {
        &self.transport
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// One iteration against the monotonic clock. Returns the number of
    /// events routed.
    pub fn poll(&mut self) -> usize {
        let ticked = self.uses_local_clock() && self.clock.tick();
        self.step(ticked)
    }

    /// One iteration at an explicit time, in microseconds since start.
    pub fn poll_at(&mut self, now_us: u64) -> usize {
        let ticked = self.uses_local_clock() && self.clock.tick_at(now_us);
        self.step(ticked)
    }

    pub fn run(&mut self, running: &AtomicBool) {
        info!(
            "Event loop running at {} BPM, clock source {:?}",
            self.clock.schedule().tempo_bpm(),
            self.clock_source
        );
        while running.load(Ordering::SeqCst) && !self.shutdown {
            self.poll();
            let idle = if self.uses_local_clock() {
                self.clock.until_next().min(MAX_IDLE_SLEEP)
            } else {
                MAX_IDLE_SLEEP
            };
            if !idle.is_zero() {
                thread::sleep(idle);
            }
        }
        info!("Event loop stopped");
    }

    fn uses_local_clock(&self) -> bool {
        self.clock_source == ClockSource::Internal
    }

    fn step(&mut self, ticked: bool) -> usize {
        let mut routed = self.drain_messages();
        if ticked {
            routed += self.handle_tick();
        }
        routed + self.drain_usb_inbound()
    }

    fn drain_messages(&mut self) -> usize {
        let mut routed = 0;
        while let Ok(message) = self.message_rx.try_recv() {
            match message {
                EngineMessage::Transport(command) => {
                    routed += self.apply_command(command, None);
                }
                EngineMessage::Remote(command, origin) => {
                    routed += self.apply_command(command, Some(origin));
                }
                EngineMessage::Shutdown => {
                    info!("Shutdown requested");
                    self.shutdown = true;
                }
            }
        }
        routed
    }

    fn handle_tick(&mut self) -> usize {
        let emission = self.transport.on_clock();
        for event in emission.iter() {
            match event {
                MidiEvent::Start => {
                    self.status.reset_position();
                    self.status.set_running(true);
                }
                MidiEvent::Clock => self.status.record_tick(),
                _ => {}
            }
            self.dispatch(event, None);
        }
        emission.len()
    }

    fn apply_command(&mut self, command: TransportCommand, origin: Option<SinkId>) -> usize {
        debug!("Transport command {:?} from {:?}", command, origin);
        let event = self.transport.command(command);
        self.status.set_running(self.transport.is_running());
        match event {
            Some(event) => {
                self.dispatch(event, origin);
                1
            }
            None => 0,
        }
    }

    /// Host messages: transport bytes become commands, notes and CCs are
    /// relayed. A host clock is ignored; there is a single clock master.
    fn drain_usb_inbound(&mut self) -> usize {
        let Some(usb) = self.usb.clone() else {
            return 0;
        };
        let mut inbound = Vec::new();
        usb.poll_inbound(|event| inbound.push(event));

        let mut routed = 0;
        for event in inbound {
            routed += match event {
                MidiEvent::Start => self.apply_command(TransportCommand::Start, Some(SinkId::Usb)),
                MidiEvent::Stop => self.apply_command(TransportCommand::Stop, Some(SinkId::Usb)),
                MidiEvent::Continue => {
                    self.apply_command(TransportCommand::Continue, Some(SinkId::Usb))
                }
                MidiEvent::Clock => {
                    trace!("Ignoring clock from USB host");
                    0
                }
                _ => {
                    self.dispatch(event, Some(SinkId::Usb));
                    1
                }
            };
        }
        routed
    }

    fn dispatch(&self, event: MidiEvent, origin: Option<SinkId>) {
        self.router.route(event, origin);
        self.status.record_routed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::EngineStatus;
    use crossbeam::channel;

    fn make_loop(source: ClockSource) -> (EventLoop, channel::Sender<EngineMessage>) {
        let (tx, rx) = channel::unbounded();
        let router = Arc::new(FanOutRouter::new(Vec::new()));
        let status = Arc::new(EngineStatus::new(120));
        let event_loop = EventLoop::new(ClockSchedule::new(120), source, router, status, rx);
        (event_loop, tx)
    }

    #[test]
    fn test_first_tick_routes_start_and_clock() {
        let (mut event_loop, _tx) = make_loop(ClockSource::Internal);
        assert_eq!(event_loop.poll_at(0), 0);
        assert_eq!(event_loop.poll_at(20_833), 2);
        assert_eq!(event_loop.poll_at(41_666), 1);
        assert!(event_loop.transport().is_running());
    }

    #[test]
    fn test_mesh_source_never_ticks_locally() {
        let (mut event_loop, _tx) = make_loop(ClockSource::Mesh);
        assert_eq!(event_loop.poll_at(1_000_000), 0);
        assert!(!event_loop.transport().is_running());
    }

    #[test]
    fn test_shutdown_message() {
        let (mut event_loop, tx) = make_loop(ClockSource::Internal);
        tx.send(EngineMessage::Shutdown).unwrap();
        event_loop.poll_at(0);
        assert!(event_loop.is_shutdown());

        let running = AtomicBool::new(true);
        event_loop.run(&running);
    }
}
