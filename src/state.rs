use crate::midi::{BEATS_PER_BAR, TICKS_PER_BEAT};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Status the engine publishes for the display and other observers.
///
/// Written only by the engine loop; everything else reads.
#[derive(Debug)]
pub struct EngineStatus {
    tempo_bpm: AtomicU32,
    tick_count: AtomicU64,
    is_running: AtomicBool,
    events_routed: AtomicU64,
}

pub type SharedStatus = Arc<EngineStatus>;

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            tempo_bpm: AtomicU32::new(120),
            tick_count: AtomicU64::new(0),
            is_running: AtomicBool::new(false),
            events_routed: AtomicU64::new(0),
        }
    }
}

impl EngineStatus {
    pub fn new(tempo_bpm: u32) -> Self {
        let status = Self::default();
        status.tempo_bpm.store(tempo_bpm, Ordering::Relaxed);
        status
    }

    pub fn tempo(&self) -> u32 {
        self.tempo_bpm.load(Ordering::Relaxed)
    }

    pub fn set_running(&self, running: bool) {
        self.is_running.store(running, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Called when a Start goes out: receivers reset to zero, so do we.
    pub fn reset_position(&self) {
        self.tick_count.store(0, Ordering::SeqCst);
    }

    pub fn record_tick(&self) {
        self.tick_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_routed(&self) {
        self.events_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::SeqCst)
    }

    pub fn events_routed(&self) -> u64 {
        self.events_routed.load(Ordering::Relaxed)
    }

    /// Tick within the current beat, 0..24.
    pub fn tick_in_beat(&self) -> u32 {
        (self.tick_count() % u64::from(TICKS_PER_BEAT)) as u32
    }

    /// 1-based beat within the bar (4/4).
    pub fn beat(&self) -> u32 {
        ((self.tick_count() / u64::from(TICKS_PER_BEAT)) % u64::from(BEATS_PER_BAR)) as u32 + 1
    }

    /// 1-based bar number.
    pub fn bar(&self) -> u64 {
        self.tick_count() / u64::from(TICKS_PER_BEAT * BEATS_PER_BAR) + 1
    }
}
