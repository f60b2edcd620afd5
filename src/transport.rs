//! Transport state machine
//!
//! Tracks Running/Stopped and decides when Start, Stop and Continue go out.
//! `Start` always precedes the first `Clock` of a run: receivers reset their
//! tick counters on it.

use crate::midi::MidiEvent;
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Running,
}

/// Explicit transport request from a local control or a remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    Start,
    Stop,
    Continue,
}

/// Up to two events produced by one clock tick. Stack allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Emission {
    events: [Option<MidiEvent>; 2],
}

impl Emission {
    fn none() -> Self {
        Self::default()
    }

    fn one(event: MidiEvent) -> Self {
        Self {
            events: [Some(event), None],
        }
    }

    fn two(first: MidiEvent, second: MidiEvent) -> Self {
        Self {
            events: [Some(first), Some(second)],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = MidiEvent> + '_ {
        self.events.iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.events.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.events[0].is_none()
    }
}

/// Starts `Stopped` and armed, so the first tick after boot starts the run.
///
/// An explicit Stop disarms: ticks are held back until Start re-arms (next
/// tick emits Start then Clock) or Continue resumes (no Start).
#[derive(Debug)]
pub struct TransportStateMachine {
    state: TransportState,
    armed: bool,
}

impl Default for TransportStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportStateMachine {
    pub fn new() -> Self {
        Self {
            state: TransportState::Stopped,
            armed: true,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TransportState::Running
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn on_clock(&mut self) -> Emission {
        match self.state {
            TransportState::Running => Emission::one(MidiEvent::Clock),
            TransportState::Stopped if self.armed => {
                self.state = TransportState::Running;
                info!("Transport started");
                Emission::two(MidiEvent::Start, MidiEvent::Clock)
            }
            TransportState::Stopped => Emission::none(),
        }
    }

    /// Applies a command, returning the event to broadcast, if any.
    pub fn command(&mut self, command: TransportCommand) -> Option<MidiEvent> {
        match (command, self.state) {
            (TransportCommand::Stop, TransportState::Running) => {
                self.state = TransportState::Stopped;
                self.armed = false;
                info!("Transport stopped");
                Some(MidiEvent::Stop)
            }
            (TransportCommand::Stop, TransportState::Stopped) => {
                self.armed = false;
                debug!("Stop while stopped: transport held");
                None
            }
            (TransportCommand::Start, TransportState::Stopped) => {
                self.armed = true;
                debug!("Transport armed, Start goes out with the next tick");
                None
            }
            (TransportCommand::Continue, TransportState::Stopped) => {
                self.state = TransportState::Running;
                self.armed = true;
                info!("Transport resumed");
                Some(MidiEvent::Continue)
            }
            (TransportCommand::Start | TransportCommand::Continue, TransportState::Running) => {
                debug!("{:?} ignored, transport already running", command);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_emits_start_then_clock() {
        let mut transport = TransportStateMachine::new();
        assert_eq!(transport.state(), TransportState::Stopped);

        let first: Vec<_> = transport.on_clock().iter().collect();
        assert_eq!(first, vec![MidiEvent::Start, MidiEvent::Clock]);
        assert!(transport.is_running());

        let second: Vec<_> = transport.on_clock().iter().collect();
        assert_eq!(second, vec![MidiEvent::Clock]);
    }

    #[test]
    fn test_stop_holds_ticks_until_rearmed() {
        let mut transport = TransportStateMachine::new();
        transport.on_clock();

        assert_eq!(
            transport.command(TransportCommand::Stop),
            Some(MidiEvent::Stop)
        );
        assert!(transport.on_clock().is_empty());
        assert_eq!(transport.command(TransportCommand::Stop), None);

        assert_eq!(transport.command(TransportCommand::Start), None);
        let restarted: Vec<_> = transport.on_clock().iter().collect();
        assert_eq!(restarted, vec![MidiEvent::Start, MidiEvent::Clock]);
    }

    #[test]
    fn test_continue_resumes_without_start() {
        let mut transport = TransportStateMachine::new();
        transport.on_clock();
        transport.command(TransportCommand::Stop);

        assert_eq!(
            transport.command(TransportCommand::Continue),
            Some(MidiEvent::Continue)
        );
        let resumed: Vec<_> = transport.on_clock().iter().collect();
        assert_eq!(resumed, vec![MidiEvent::Clock]);
    }

    #[test]
    fn test_commands_while_running_are_ignored() {
        let mut transport = TransportStateMachine::new();
        transport.on_clock();
        assert_eq!(transport.command(TransportCommand::Start), None);
        assert_eq!(transport.command(TransportCommand::Continue), None);
        assert!(transport.is_running());
    }

    #[test]
    fn test_emission_len() {
        let mut transport = TransportStateMachine::new();
        assert_eq!(transport.on_clock().len(), 2);
        assert_eq!(transport.on_clock().len(), 1);
    }
}
