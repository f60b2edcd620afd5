pub mod cli;
pub mod clock;
pub mod config;
pub mod event_loop;
pub mod ingest;
pub mod logging;
pub mod midi;
pub mod router;
pub mod scheduler;
pub mod sink;
pub mod state;
pub mod transport;
pub mod ui;

pub use scheduler::{Scheduler, ThreadScheduler};
pub use state::{EngineStatus, SharedStatus};

use std::sync::Arc;

pub fn create_scheduler() -> ThreadScheduler {
    ThreadScheduler::new()
}

pub fn create_shared_status(tempo_bpm: u32) -> SharedStatus {
    Arc::new(EngineStatus::new(tempo_bpm))
}

/// Names of every MIDI output port, empty when the MIDI backend is
/// unavailable.
pub fn handle_device_list() -> Vec<String> {
    midi::ports::list_output_ports().unwrap_or_else(|e| {
        log::warn!("Could not list MIDI ports: {}", e);
        Vec::new()
    })
}
